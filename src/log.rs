//! TxnsetLog (C2) — the write-ahead journal for one txnset
//!
//! One append-only file per active txnset, stored under a fixed directory
//! (`extglobalxact`) beneath the coordinator's data root. The file is the
//! canonical record of intent: every state change observable by a remote
//! site is journaled, and flushed to durable storage, before the
//! corresponding remote command is issued.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};
use std::path::{Path, PathBuf};

use crate::error::{GxactError, Result};
use crate::phase::Phase;

/// Fixed directory name (relative to the host's data directory) holding one
/// file per active txnset.
pub const LOG_DIR_NAME: &str = "extglobalxact";

/// Lines longer than this many bytes on parse are treated as corruption.
pub const MAX_LINE_BYTES: usize = 511;

/// Outcome recorded for one remote action against one site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionStatus {
    Todo,
    Ok,
    Bad,
}

impl ActionStatus {
    fn label(self) -> &'static str {
        match self {
            ActionStatus::Todo => "todo",
            ActionStatus::Ok => "OK",
            ActionStatus::Bad => "BAD",
        }
    }

    fn from_label(s: &str) -> Option<ActionStatus> {
        match s {
            "todo" => Some(ActionStatus::Todo),
            "OK" => Some(ActionStatus::Ok),
            "BAD" => Some(ActionStatus::Bad),
            _ => None,
        }
    }
}

/// One parsed `<phase-label> postgresql://host:port/db <txn-name> <status>` line.
#[derive(Debug, Clone)]
pub struct ParsedAction {
    pub phase_label: String,
    pub connection_url: String,
    pub txn_name: String,
    pub status: ActionStatus,
}

/// Result of replaying a txnset log back into memory.
pub struct ParsedTxnset {
    /// The final observed phase, i.e. the txnset's state on load.
    pub phase: Phase,
    /// The last `Commit` or `Rollback` phase line observed, ignoring the
    /// terminal `incomplete`/`complete` lines that may follow it. This is
    /// what recovery must resolve towards: an `incomplete` tail records
    /// that some sites are unresolved, not that the original decision has
    /// changed from commit to rollback or vice versa.
    pub decision_phase: Option<Phase>,
    /// The txnset id, recovered from the action lines' `<txn-name>` field.
    pub id: Option<String>,
    pub actions: Vec<ParsedAction>,
}

/// The open write-append journal for one txnset.
pub struct TxnsetLog {
    path: PathBuf,
    file: File,
    last_phase_label: String,
}

impl TxnsetLog {
    fn dir_path(data_dir: &Path) -> PathBuf {
        data_dir.join(LOG_DIR_NAME)
    }

    /// Create the log directory (mode 0700) if absent, fail with
    /// `LogExists` if `<dir>/<id>` is already present, and open the file
    /// for append.
    pub fn create(data_dir: &Path, id: &str) -> Result<TxnsetLog> {
        let dir = Self::dir_path(data_dir);
        if !dir.exists() {
            fs::DirBuilder::new()
                .recursive(true)
                .mode(0o700)
                .create(&dir)?;
        }
        let path = dir.join(id);
        if path.exists() {
            return Err(GxactError::LogExists(format!(
                "txnset log {} already exists",
                path.display()
            )));
        }
        let file = OpenOptions::new()
            .create_new(true)
            .append(true)
            .mode(0o600)
            .open(&path)?;
        Ok(TxnsetLog {
            path,
            file,
            last_phase_label: Phase::Begin.label().to_string(),
        })
    }

    /// Open an existing log file for recovery, without re-parsing it (the
    /// caller is expected to have already called [`TxnsetLog::parse`] to
    /// obtain the in-memory state; this just reopens the handle for
    /// further appends, e.g. a future `close_complete`).
    pub fn reopen(path: PathBuf) -> Result<TxnsetLog> {
        let file = OpenOptions::new().append(true).open(&path)?;
        Ok(TxnsetLog {
            path,
            file,
            last_phase_label: Phase::Incomplete.label().to_string(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        if line.len() > MAX_LINE_BYTES {
            return Err(GxactError::LogCorrupt(format!(
                "refusing to write oversize txnset log line ({} bytes)",
                line.len()
            )));
        }
        self.file.write_all(line.as_bytes())?;
        self.file.write_all(b"\n")?;
        Ok(())
    }

    /// Append one `phase <label>` line. No flush is required here: every
    /// action line flushes, and a lone phase line is always followed by an
    /// action line or by termination.
    pub fn write_phase(&mut self, phase: Phase) -> Result<()> {
        self.last_phase_label = phase.label().to_string();
        self.write_line(&format!("phase {}", phase.label()))
    }

    /// Append one action line and force a flush to durable storage before
    /// returning. This is the durability boundary: the remote command this
    /// line describes must not be issued until this call returns.
    pub fn write_action(
        &mut self,
        identity: &crate::remote::RemoteIdentity,
        txn_name: &str,
        status: ActionStatus,
    ) -> Result<()> {
        let line = format!(
            "{} {} {} {}",
            self.last_phase_label,
            identity.to_url(),
            txn_name,
            status.label()
        );
        self.write_line(&line)?;
        self.file.flush()?;
        self.file.sync_data()?;
        Ok(())
    }

    /// Append `phase complete`, close, and unlink the file.
    ///
    /// If the unlink fails the file remains with a `complete` tail; a
    /// later scan recognizes that tail as a no-op and may remove it safely.
    pub fn close_complete(mut self) -> Result<()> {
        self.write_phase(Phase::Complete)?;
        self.file.flush()?;
        self.file.sync_data()?;
        let path = self.path.clone();
        drop(self);
        fs::remove_file(&path)?;
        Ok(())
    }

    /// Append `phase incomplete`, flush, and close. The file remains for
    /// the [`crate::recovery::RecoveryWorker`] to resolve and eventually unlink.
    pub fn close_incomplete(mut self) -> Result<PathBuf> {
        self.write_phase(Phase::Incomplete)?;
        self.file.flush()?;
        self.file.sync_data()?;
        Ok(self.path.clone())
    }

    /// Scan a txnset log file line by line, reconstructing its phase and
    /// one [`ParsedAction`] per action line. Duplicate or out-of-phase
    /// lines are logged as warnings, not treated as fatal — only an
    /// oversize line is a hard [`GxactError::LogCorrupt`] failure.
    pub fn parse(path: &Path) -> Result<ParsedTxnset> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);

        let mut phase = Phase::Begin;
        let mut decision_phase: Option<Phase> = None;
        let mut last_phase_label = Phase::Begin.label().to_string();
        let mut id: Option<String> = None;
        let mut actions = Vec::new();

        for line_result in reader.lines() {
            let line = line_result?;
            if line.len() > MAX_LINE_BYTES {
                return Err(GxactError::LogCorrupt(format!(
                    "line exceeded max length of {} bytes in {}",
                    MAX_LINE_BYTES,
                    path.display()
                )));
            }
            if line.is_empty() {
                continue;
            }

            let mut words = line.splitn(2, ' ');
            let first = words.next().unwrap_or_default();

            if first == "phase" {
                let label = words.next().unwrap_or_default().trim();
                phase = Phase::from_label(label)?;
                if matches!(phase, Phase::Commit | Phase::Rollback) {
                    decision_phase = Some(phase);
                }
                last_phase_label = label.to_string();
                continue;
            }

            // Action line: "<phase-label> <url> <txn-name> <status>"
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() != 4 {
                log::warn!("skipping malformed txnset log line in {}: {}", path.display(), line);
                continue;
            }
            let [phase_label, connection_url, txn_name, status_label]: [&str; 4] =
                fields.try_into().unwrap();

            if phase_label != last_phase_label {
                log::warn!(
                    "wrong phase in {}: expected {} but line says {}",
                    path.display(),
                    last_phase_label,
                    phase_label
                );
            }

            if crate::remote::RemoteIdentity::parse_url(connection_url).is_none() {
                log::warn!(
                    "{} in {} does not look like a connection string, ignoring",
                    connection_url,
                    path.display()
                );
                continue;
            }

            let status = match ActionStatus::from_label(status_label) {
                Some(s) => s,
                None => {
                    log::warn!("unknown action status '{}' in {}", status_label, path.display());
                    continue;
                }
            };

            if id.is_none() {
                id = Some(txn_name.to_string());
            }

            actions.push(ParsedAction {
                phase_label: phase_label.to_string(),
                connection_url: connection_url.to_string(),
                txn_name: txn_name.to_string(),
                status,
            });
        }

        Ok(ParsedTxnset { phase, decision_phase, id, actions })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::RemoteIdentity;
    use tempfile::tempdir;

    fn identity() -> RemoteIdentity {
        RemoteIdentity {
            host: "127.0.0.1".to_string(),
            port: 5432,
            database: "orders".to_string(),
        }
    }

    #[test]
    fn create_then_reparse_round_trips_phase_and_actions() {
        let dir = tempdir().unwrap();
        let id = "11111111-1111-4111-8111-111111111111";
        let mut log = TxnsetLog::create(dir.path(), id).unwrap();

        log.write_phase(Phase::Prepare).unwrap();
        log.write_action(&identity(), id, ActionStatus::Todo).unwrap();
        log.write_phase(Phase::Commit).unwrap();
        log.write_action(&identity(), id, ActionStatus::Ok).unwrap();

        let path = log.path().to_path_buf();
        drop(log);

        let parsed = TxnsetLog::parse(&path).unwrap();
        assert_eq!(parsed.phase, Phase::Commit);
        assert_eq!(parsed.actions.len(), 2);
        assert_eq!(parsed.actions[1].status, ActionStatus::Ok);
        assert_eq!(parsed.id.as_deref(), Some(id));
    }

    #[test]
    fn create_collides_with_existing_file() {
        let dir = tempdir().unwrap();
        let id = "dupe-id";
        let _log = TxnsetLog::create(dir.path(), id).unwrap();
        let err = TxnsetLog::create(dir.path(), id).unwrap_err();
        assert!(matches!(err, GxactError::LogExists(_)));
    }

    #[test]
    fn close_complete_removes_the_file() {
        let dir = tempdir().unwrap();
        let id = "complete-me";
        let mut log = TxnsetLog::create(dir.path(), id).unwrap();
        log.write_phase(Phase::Prepare).unwrap();
        log.write_action(&identity(), id, ActionStatus::Ok).unwrap();
        let path = log.path().to_path_buf();
        log.close_complete().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn close_incomplete_leaves_the_file_for_recovery() {
        let dir = tempdir().unwrap();
        let id = "incomplete-me";
        let mut log = TxnsetLog::create(dir.path(), id).unwrap();
        log.write_phase(Phase::Commit).unwrap();
        log.write_action(&identity(), id, ActionStatus::Bad).unwrap();
        let path = log.close_incomplete().unwrap();
        assert!(path.exists());

        let parsed = TxnsetLog::parse(&path).unwrap();
        assert_eq!(parsed.phase, Phase::Incomplete);
    }

    #[test]
    fn oversize_line_is_corruption_on_parse() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("corrupt");
        let huge = "x".repeat(MAX_LINE_BYTES + 50);
        fs::write(&path, format!("{}\n", huge)).unwrap();
        let err = TxnsetLog::parse(&path).unwrap_err();
        assert!(matches!(err, GxactError::LogCorrupt(_)));
    }

    #[test]
    fn malformed_action_line_is_skipped_not_fatal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("weird");
        fs::write(&path, "phase prepare\nprepare not-a-url txn OK\n").unwrap();
        let parsed = TxnsetLog::parse(&path).unwrap();
        assert_eq!(parsed.phase, Phase::Prepare);
        assert!(parsed.actions.is_empty());
    }

    #[test]
    fn unknown_phase_label_fails_at_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad-phase");
        fs::write(&path, "phase committed\n").unwrap();
        let err = TxnsetLog::parse(&path).unwrap_err();
        assert!(matches!(err, GxactError::InvalidPhaseLabel(_)));
    }
}
