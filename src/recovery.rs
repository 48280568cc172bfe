//! RecoveryWorker (C6) — asynchronous resolution of an incomplete txnset
//!
//! Launched whenever a txnset reaches `Incomplete`, and also on demand by
//! the administrative entry point given a log filename (see `main.rs`).
//! Runs on its own OS thread, since the work here is pure blocking I/O and
//! this crate carries no async runtime dependency.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use crate::log::TxnsetLog;
use crate::phase::Phase;
use crate::remote::{PgRemoteConnection, RemoteSite};

/// Tunables for the recovery retry loop.
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Back-off between passes over the site list once the txnset has
    /// settled into `Incomplete`. Unbounded retry with this back-off is
    /// intentional: permanent site loss is an operator problem.
    pub retry_interval: Duration,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            retry_interval: Duration::from_secs(1),
        }
    }
}

/// One unresolved site being tracked by a recovery pass.
struct Pending {
    site: RemoteSite,
}

/// Drives one incomplete txnset log to resolution, then unlinks it.
pub struct RecoveryWorker {
    id: String,
    log_path: PathBuf,
    rollback_mode: bool,
    pending: Vec<Pending>,
    config: RecoveryConfig,
}

impl RecoveryWorker {
    /// Parse `log_path` and build a worker ready to run its retry loop.
    /// Sites whose logged connection string can't be reopened are kept
    /// pending anyway (`ensure_alive` will retry the reconnect each pass).
    pub fn from_log(log_path: PathBuf, config: RecoveryConfig) -> std::io::Result<RecoveryWorker> {
        let parsed = TxnsetLog::parse(&log_path).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;

        let id = parsed.id.clone().unwrap_or_default();
        // The decision (commit or rollback) is fixed once the corresponding
        // phase line is written; a trailing `incomplete` line only means
        // some sites are unresolved, not that the decision has flipped.
        let rollback_mode = !matches!(parsed.decision_phase, Some(Phase::Commit));

        // Keep only the most recent action per connection URL, preserving
        // first-seen (i.e. original PREPARE/insertion) order: a site that
        // later shows OK/BAD after an earlier `todo` is resolved or
        // recorded, not double-counted, and COMMIT/ROLLBACK PREPARED must
        // still be reissued in the same order the sites were prepared in.
        use std::collections::HashMap;
        let mut order: Vec<String> = Vec::new();
        let mut latest: HashMap<String, &crate::log::ParsedAction> = HashMap::new();
        for action in &parsed.actions {
            if !latest.contains_key(&action.connection_url) {
                order.push(action.connection_url.clone());
            }
            latest.insert(action.connection_url.clone(), action);
        }

        let mut pending = Vec::new();
        for url in &order {
            let action = latest[url];
            if action.status == crate::log::ActionStatus::Ok {
                continue;
            }
            if let Ok(conn) = PgRemoteConnection::connect_url(&action.connection_url) {
                pending.push(Pending {
                    site: RemoteSite::new(Box::new(conn)),
                });
            } else {
                log::warn!(
                    "recovery for txnset {} could not reopen session to {}; will keep retrying",
                    id,
                    action.connection_url
                );
            }
        }

        Ok(RecoveryWorker {
            id,
            log_path,
            rollback_mode,
            pending,
            config,
        })
    }

    /// Spawn a recovery worker as a detached background thread for the
    /// given log file. This is the administrative entry point named in
    /// spec.md §6: operators and the `commit_all`/`rollback_all` hand-off
    /// path both funnel through here.
    pub fn spawn(log_path: PathBuf, config: RecoveryConfig) {
        thread::spawn(move || match RecoveryWorker::from_log(log_path.clone(), config) {
            Ok(worker) => worker.run(),
            Err(e) => {
                log::error!("recovery worker could not parse {}: {}", log_path.display(), e);
            }
        });
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn verb(&self) -> &'static str {
        if self.rollback_mode {
            "ROLLBACK PREPARED"
        } else {
            "COMMIT PREPARED"
        }
    }

    fn check_query(&self) -> String {
        format!("SELECT * FROM pg_prepared_xacts WHERE gid = '{}'", self.id)
    }

    /// Run one pass over the pending site list, removing every site that
    /// is resolved (either by us, or found already absent). Returns
    /// whether the pass made progress (always true if any site was
    /// touched; the caller decides how to back off).
    fn run_pass(&mut self) {
        let id = self.id.clone();
        let verb = self.verb();
        let check_query = self.check_query();

        let mut still_pending = Vec::with_capacity(self.pending.len());
        for mut entry in self.pending.drain(..) {
            entry.site.ensure_alive();

            match entry.site.query_has_rows(&check_query) {
                Some(false) => {
                    // Absent: someone else resolved it already.
                    log::info!("txnset {} site already resolved remotely, removing", id);
                    entry.site.close();
                    continue;
                }
                Some(true) => {
                    // Still present, proceed to resolve it below.
                }
                None => {
                    // Query failed: treat as present, retry later.
                    still_pending.push(entry);
                    continue;
                }
            }

            let sql = format!("{} '{}'", verb, id);
            if entry.site.exec(&sql) {
                log::info!("recovery resolved {} site via {}", id, verb);
                entry.site.close();
            } else {
                still_pending.push(entry);
            }
        }
        self.pending = still_pending;
    }

    /// Repeatedly revisit each unresolved site until all are resolved or
    /// proved absent, then unlink the log. Terminates only when the site
    /// list is empty.
    pub fn run(mut self) {
        log::info!(
            "recovery worker starting for txnset {} ({})",
            self.id(),
            if self.rollback_mode { "rollback" } else { "commit" }
        );

        while !self.pending.is_empty() {
            self.run_pass();
            if !self.pending.is_empty() {
                thread::sleep(self.config.retry_interval);
            }
        }

        match TxnsetLog::reopen(self.log_path.clone()) {
            Ok(log) => match log.close_complete() {
                Ok(()) => log::info!("recovery worker resolved txnset {}, log removed", self.id()),
                Err(e) => log::error!(
                    "recovery worker could not close out {}: {}",
                    self.log_path.display(),
                    e
                ),
            },
            Err(e) => {
                log::error!(
                    "recovery worker could not reopen {} to record completion, unlinking directly: {}",
                    self.log_path.display(),
                    e
                );
                if let Err(e) = std::fs::remove_file(&self.log_path) {
                    log::error!("recovery worker could not unlink {}: {}", self.log_path.display(), e);
                }
            }
        }
    }
}
