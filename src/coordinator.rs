//! Coordinator (C5) — the process-wide current-txnset pointer
//!
//! Registers remote sites into the current txnset and drives it to
//! resolution from the host's commit/abort notification. The host
//! database's own transaction-event mechanism is an external collaborator:
//! this module defines the shape of the callback ([`HostEvent`],
//! [`HostTransactionEvents`]) but does not implement the host backend that
//! fires it.
//!
//! Exactly one [`Coordinator`] is meant to exist per backend process at a
//! time — it mirrors the "single owner cell bound to the host's
//! per-transaction arena" described for the source system: created lazily
//! on the first [`Coordinator::register_site`] call, torn down in
//! [`Coordinator::on_host_event`].

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::remote::RemoteSite;
use crate::recovery::{RecoveryConfig, RecoveryWorker};
use crate::txnset::{Resolution, Txnset};

/// The event kinds a host database backend can fire at the coordinator's
/// registered callback. This is the external-collaborator interface named
/// in spec.md §4.5 and §6; the host backend itself is out of scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    Prepare,
    PrePrepare,
    /// The host transaction has already committed locally.
    Commit,
    PreCommit,
    ParallelPreCommit,
    Abort,
    ParallelAbort,
    Other,
}

/// A host backend fires this at well-defined points around a local
/// transaction's lifetime. Implementations install/uninstall a single
/// instance of this trait around a [`Coordinator`]'s lifetime.
pub trait HostTransactionEvents {
    fn on_event(&mut self, event: HostEvent) -> Result<()>;
}

/// Process-wide current-txnset pointer and host-callback integration.
pub struct Coordinator {
    data_dir: PathBuf,
    recovery_config: RecoveryConfig,
    current: Option<Txnset>,
}

impl Coordinator {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            recovery_config: RecoveryConfig::default(),
            current: None,
        }
    }

    pub fn with_recovery_config(mut self, config: RecoveryConfig) -> Self {
        self.recovery_config = config;
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Is there a txnset currently in flight on this backend?
    pub fn has_current(&self) -> bool {
        self.current.is_some()
    }

    pub fn current_phase(&self) -> Option<crate::phase::Phase> {
        self.current.as_ref().map(|t| t.phase())
    }

    /// If `current` is none, create a new Txnset (phase `Begin`, freshly
    /// generated id, open log). Append `site` to `current.sites` in
    /// insertion order. Does not issue any SQL.
    pub fn register_site(&mut self, site: RemoteSite) -> Result<()> {
        if self.current.is_none() {
            self.current = Some(Txnset::create(&self.data_dir)?);
        }
        self.current.as_mut().unwrap().register_site(site);
        Ok(())
    }
}

impl HostTransactionEvents for Coordinator {
    /// The sole driver of COMMIT/ROLLBACK; application code never calls
    /// `Txnset::commit_all`/`rollback_all` directly. See spec.md §4.5's
    /// event-kind policy table.
    fn on_event(&mut self, event: HostEvent) -> Result<()> {
        match event {
            HostEvent::Prepare | HostEvent::PrePrepare => Err(crate::error::GxactError::NotSupported(
                "cannot nest a global txnset inside a host-level 2PC".to_string(),
            )),
            HostEvent::Commit => {
                log::warn!("host transaction already committed locally; committing remote work implicitly is unsafe");
                self.drive_commit()
            }
            HostEvent::PreCommit | HostEvent::ParallelPreCommit => self.drive_commit(),
            HostEvent::Abort | HostEvent::ParallelAbort => self.drive_rollback(),
            HostEvent::Other => Ok(()),
        }
    }
}

impl Coordinator {
    /// Drives `current` through `prepare_all` then `commit_all`, clearing
    /// `current` only once both steps succeed.
    ///
    /// `current` is deliberately *not* taken up front: if `prepare_all`
    /// fails partway through, the txnset (with its already-prepared sites
    /// still registered) must remain in `current` so that the host's
    /// subsequent abort callback can roll those sites back via
    /// `drive_rollback` (see spec.md S2). Only a successful resolution
    /// clears the pointer.
    fn drive_commit(&mut self) -> Result<()> {
        if self.current.is_none() {
            return Ok(());
        }
        self.current.as_mut().unwrap().prepare_all()?;
        let resolution = self.current.as_mut().unwrap().commit_all()?;
        self.current = None;
        self.resolve(resolution);
        Ok(())
    }

    fn drive_rollback(&mut self) -> Result<()> {
        if self.current.is_none() {
            return Ok(());
        }
        let resolution = self.current.as_mut().unwrap().rollback_all()?;
        self.current = None;
        self.resolve(resolution);
        Ok(())
    }

    fn resolve(&self, resolution: Resolution) {
        if let Resolution::Incomplete(path) = resolution {
            log::warn!("txnset log {} incomplete, handing off to recovery", path.display());
            RecoveryWorker::spawn(path, self.recovery_config.clone());
        }
    }
}
