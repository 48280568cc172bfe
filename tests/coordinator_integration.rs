//! End-to-end coverage of the host-callback event policy, driven only
//! through `Coordinator`'s public surface.

mod common;

use std::sync::{Arc, Mutex};

use tempfile::tempdir;

use common::{RecordingConnection, SharedLogConnection};
use globalxact::{Coordinator, GxactError, HostEvent, HostTransactionEvents, Phase, RemoteSite};

fn site(host: &str) -> RemoteSite {
    RemoteSite::new(Box::new(RecordingConnection::new(host, 5432, "orders")))
}

#[test]
fn no_sites_registered_means_events_are_harmless_no_ops() {
    let dir = tempdir().unwrap();
    let mut coordinator = Coordinator::new(dir.path().to_path_buf());
    coordinator.on_event(HostEvent::PreCommit).unwrap();
    coordinator.on_event(HostEvent::Abort).unwrap();
    assert!(!coordinator.has_current());
}

#[test]
fn pre_commit_prepares_and_commits_every_registered_site() {
    let dir = tempdir().unwrap();
    let mut coordinator = Coordinator::new(dir.path().to_path_buf());
    coordinator.register_site(site("a")).unwrap();
    coordinator.register_site(site("b")).unwrap();
    assert_eq!(coordinator.current_phase(), Some(Phase::Begin));

    coordinator.on_event(HostEvent::ParallelPreCommit).unwrap();
    assert!(!coordinator.has_current(), "txnset is cleared once resolved");
}

#[test]
fn abort_rolls_back_without_ever_reaching_prepare_if_called_from_begin() {
    let dir = tempdir().unwrap();
    let mut coordinator = Coordinator::new(dir.path().to_path_buf());
    coordinator.register_site(site("a")).unwrap();

    coordinator.on_event(HostEvent::ParallelAbort).unwrap();
    assert!(!coordinator.has_current());
}

#[test]
fn nested_prepare_is_rejected_without_mutating_the_current_txnset() {
    let dir = tempdir().unwrap();
    let mut coordinator = Coordinator::new(dir.path().to_path_buf());
    coordinator.register_site(site("a")).unwrap();

    let err = coordinator.on_event(HostEvent::PrePrepare).unwrap_err();
    assert!(matches!(err, GxactError::NotSupported(_)));
    assert!(coordinator.has_current(), "rejection must not clear the in-flight txnset");
}

#[test]
fn registering_sites_across_two_txnsets_reuses_a_fresh_log_each_time() {
    let dir = tempdir().unwrap();
    let mut coordinator = Coordinator::new(dir.path().to_path_buf());

    coordinator.register_site(site("a")).unwrap();
    coordinator.on_event(HostEvent::Abort).unwrap();
    assert!(!coordinator.has_current());

    coordinator.register_site(site("b")).unwrap();
    assert_eq!(coordinator.current_phase(), Some(Phase::Begin));
    coordinator.on_event(HostEvent::PreCommit).unwrap();
    assert!(!coordinator.has_current());
}

/// S2, driven end-to-end through `Coordinator`: PREPARE fails on the
/// second site during a `pre_commit` callback. The error must propagate
/// (so the host aborts its own local transaction), but the first site's
/// already-prepared state must survive in `current` so that the host's
/// subsequent `abort` callback can roll it back — it must never be
/// silently dropped.
#[test]
fn prepare_failure_during_pre_commit_leaves_prepared_site_for_the_abort_callback() {
    let dir = tempdir().unwrap();
    let mut coordinator = Coordinator::new(dir.path().to_path_buf());

    let log_a = Arc::new(Mutex::new(Vec::new()));
    coordinator
        .register_site(RemoteSite::new(Box::new(SharedLogConnection::new(
            "a",
            5432,
            "orders",
            log_a.clone(),
        ))))
        .unwrap();

    let mut failing = RecordingConnection::new("b", 5432, "orders");
    failing.exec_results.push_back(false);
    coordinator
        .register_site(RemoteSite::new(Box::new(failing)))
        .unwrap();

    let err = coordinator.on_event(HostEvent::PreCommit).unwrap_err();
    assert!(matches!(err, GxactError::PrepareFailed(_)));
    assert!(
        coordinator.has_current(),
        "the partially-prepared txnset must survive a failed pre_commit so abort can roll it back"
    );
    assert_eq!(coordinator.current_phase(), Some(Phase::Prepare));

    coordinator.on_event(HostEvent::Abort).unwrap();
    assert!(!coordinator.has_current());

    let calls = log_a.lock().unwrap();
    assert_eq!(calls.len(), 2, "site a must see exactly PREPARE then ROLLBACK PREPARED");
    assert!(calls[0].starts_with("PREPARE TRANSACTION"));
    assert!(calls[1].starts_with("ROLLBACK PREPARED"));
}
