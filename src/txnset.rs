//! Txnset (C4) — the in-memory aggregate and 2PC driver
//!
//! Owns the ordered list of remote sites, the current phase, and the open
//! txnset log. Phase transitions are the only way `phase` changes, and
//! every transition is journaled before the in-memory field is updated.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::{GxactError, Result};
use crate::log::{ActionStatus, TxnsetLog};
use crate::phase::Phase;
use crate::remote::RemoteSite;

/// Generate a fresh txnset identifier: a version-4 UUID in canonical
/// 36-character hyphenated hex form. The crate sets the RFC 4122 §4.4 bit
/// pattern via `Uuid::new_v4`, so identity collisions are astronomically
/// unlikely — a colliding log filename is treated as a state violation,
/// not retried.
pub fn new_txnset_id() -> String {
    Uuid::new_v4().to_string()
}

/// The in-memory aggregate for one global transaction.
pub struct Txnset {
    id: String,
    phase: Phase,
    sites: Vec<Option<RemoteSite>>,
    log: Option<TxnsetLog>,
    counter: u64,
}

impl Txnset {
    /// Create a fresh txnset in phase `Begin`, opening its log.
    ///
    /// Writes a `phase begin` line immediately: the source material
    /// disagrees with itself on whether this line is written, and this
    /// crate takes the more defensive position that it is, so a crash
    /// between file creation and the first real transition still leaves
    /// an unambiguous trace behind.
    pub fn create(data_dir: &Path) -> Result<Txnset> {
        let id = new_txnset_id();
        let mut log = TxnsetLog::create(data_dir, &id)?;
        log.write_phase(Phase::Begin)?;
        Ok(Txnset {
            id,
            phase: Phase::Begin,
            sites: Vec::new(),
            log: Some(log),
            counter: 0,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn log_path(&self) -> Option<&Path> {
        self.log.as_ref().map(|l| l.path())
    }

    /// Number of sites still registered (tombstoned entries excluded).
    pub fn site_count(&self) -> usize {
        self.sites.iter().filter(|s| s.is_some()).count()
    }

    /// Register a new remote site, preserving insertion order. Does not
    /// issue any SQL — the first meaningful SQL is PREPARE.
    pub fn register_site(&mut self, site: RemoteSite) {
        self.sites.push(Some(site));
        self.counter += 1;
    }

    fn transition(&mut self, target: Phase) -> Result<()> {
        if !Phase::is_valid_transition(self.phase, target) {
            return Err(GxactError::InvalidPhase(format!(
                "illegal txnset phase transition {} -> {}",
                self.phase.label(),
                target.label()
            )));
        }
        if let Some(log) = self.log.as_mut() {
            log.write_phase(target)?;
        }
        self.phase = target;
        Ok(())
    }

    /// Callable only from `Begin`. Transitions to `Prepare` and issues
    /// `PREPARE TRANSACTION '<id>'` to each site in insertion order, logging
    /// a `todo` action line (flushed) before each attempt.
    ///
    /// If any PREPARE fails, fails fast with `PrepareFailed`: the caller's
    /// host transaction will abort and drive `rollback_all` over the sites
    /// that were successfully prepared. The failing site is not retained
    /// as prepared.
    pub fn prepare_all(&mut self) -> Result<()> {
        self.transition(Phase::Prepare)?;

        for slot in self.sites.iter_mut() {
            let site = match slot {
                Some(s) => s,
                None => continue,
            };
            let identity = site.identity();
            if let Some(log) = self.log.as_mut() {
                log.write_action(&identity, &self.id, ActionStatus::Todo)?;
            }
            let sql = format!("PREPARE TRANSACTION '{}'", self.id);
            let ok = site.exec(&sql);
            if !ok {
                log::warn!(
                    "PREPARE TRANSACTION failed for {} in txnset {}",
                    identity.to_url(),
                    self.id
                );
                *slot = None;
                return Err(GxactError::PrepareFailed(format!(
                    "PREPARE TRANSACTION '{}' failed at {}",
                    self.id,
                    identity.to_url()
                )));
            }
        }
        Ok(())
    }

    /// Callable only from `Prepare`. Issues `COMMIT PREPARED '<id>'` to
    /// each site in order; a `BAD` result never raises, it only prevents
    /// the txnset from reaching `Complete`.
    ///
    /// Returns [`Resolution::Complete`] once the log's directory entry has
    /// been removed, or [`Resolution::Incomplete`] with the path to hand
    /// to a [`crate::recovery::RecoveryWorker`] on partial failure.
    pub fn commit_all(&mut self) -> Result<Resolution> {
        self.drive(Phase::Commit, "COMMIT PREPARED")
    }

    /// Symmetric to [`Txnset::commit_all`]; issues `ROLLBACK PREPARED`.
    /// Callable from `Prepare` only. If called from `Begin` (no site was
    /// ever prepared, e.g. an abort fired before any PREPARE), it is a
    /// no-op: no site ever received PREPARE TRANSACTION, so none can
    /// receive ROLLBACK PREPARED either, and the txnset transitions
    /// directly to `Complete`.
    pub fn rollback_all(&mut self) -> Result<Resolution> {
        if self.phase == Phase::Begin {
            if let Some(log) = self.log.as_mut() {
                log.write_phase(Phase::Complete)?;
            }
            self.phase = Phase::Complete;
            if let Some(log) = self.log.take() {
                log.close_complete()?;
            }
            return Ok(Resolution::Complete);
        }
        self.drive(Phase::Rollback, "ROLLBACK PREPARED")
    }

    fn drive(&mut self, target: Phase, verb: &str) -> Result<Resolution> {
        self.transition(target)?;

        let mut can_complete = true;
        for slot in self.sites.iter_mut() {
            let site = match slot {
                Some(s) => s,
                None => continue,
            };
            let identity = site.identity();
            let sql = format!("{} '{}'", verb, self.id);
            let ok = site.exec(&sql);
            let status = if ok { ActionStatus::Ok } else { ActionStatus::Bad };
            if let Some(log) = self.log.as_mut() {
                log.write_action(&identity, &self.id, status)?;
            }
            if !ok {
                log::warn!("{} failed for {} in txnset {}", verb, identity.to_url(), self.id);
                can_complete = false;
            }
        }

        if can_complete {
            self.transition(Phase::Complete)?;
            if let Some(log) = self.log.take() {
                log.close_complete()?;
            }
            Ok(Resolution::Complete)
        } else {
            self.transition(Phase::Incomplete)?;
            let path = match self.log.take() {
                Some(log) => log.close_incomplete()?,
                None => return Err(GxactError::InvalidPhase(
                    "txnset reached Incomplete with no open log".to_string(),
                )),
            };
            Ok(Resolution::Incomplete(path))
        }
    }
}

/// Outcome of driving a txnset through `commit_all`/`rollback_all`.
pub enum Resolution {
    /// Every site acknowledged; the log has been removed.
    Complete,
    /// At least one site did not acknowledge; this is the log path to hand
    /// to a [`crate::recovery::RecoveryWorker`].
    Incomplete(PathBuf),
}
