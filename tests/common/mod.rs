//! Shared `RemoteConnection` test double for integration tests.
//!
//! Lives outside the crate, so it only has access to `globalxact`'s public
//! API — exactly what an application embedding this coordinator would have.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use globalxact::{RemoteConnection, RemoteIdentity};

pub struct RecordingConnection {
    pub identity: RemoteIdentity,
    pub exec_log: Vec<String>,
    pub exec_results: VecDeque<bool>,
    pub query_results: VecDeque<Option<bool>>,
    pub bad: bool,
}

impl RecordingConnection {
    pub fn new(host: &str, port: u16, database: &str) -> Self {
        Self {
            identity: RemoteIdentity {
                host: host.to_string(),
                port,
                database: database.to_string(),
            },
            exec_log: Vec::new(),
            exec_results: VecDeque::new(),
            query_results: VecDeque::new(),
            bad: false,
        }
    }
}

impl RemoteConnection for RecordingConnection {
    fn exec(&mut self, sql: &str) -> bool {
        self.exec_log.push(sql.to_string());
        self.exec_results.pop_front().unwrap_or(true)
    }

    fn query_has_rows(&mut self, sql: &str) -> Option<bool> {
        self.exec_log.push(sql.to_string());
        self.query_results.pop_front().unwrap_or(Some(false))
    }

    fn identity(&self) -> RemoteIdentity {
        self.identity.clone()
    }

    fn is_bad(&self) -> bool {
        self.bad
    }

    fn reset(&mut self) -> bool {
        self.bad = false;
        true
    }

    fn close(&mut self) {}
}

/// A `RecordingConnection` whose `exec_log` is mirrored into a shared,
/// externally-held buffer, so a test can inspect what a site received
/// after `Coordinator::register_site` has taken ownership of it.
pub struct SharedLogConnection {
    inner: RecordingConnection,
    shared: Arc<Mutex<Vec<String>>>,
}

impl SharedLogConnection {
    pub fn new(host: &str, port: u16, database: &str, shared: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            inner: RecordingConnection::new(host, port, database),
            shared,
        }
    }

    pub fn fail_next_exec(&mut self) {
        self.inner.exec_results.push_back(false);
    }
}

impl RemoteConnection for SharedLogConnection {
    fn exec(&mut self, sql: &str) -> bool {
        let ok = self.inner.exec(sql);
        self.shared.lock().unwrap().push(sql.to_string());
        ok
    }

    fn query_has_rows(&mut self, sql: &str) -> Option<bool> {
        self.inner.query_has_rows(sql)
    }

    fn identity(&self) -> RemoteIdentity {
        self.inner.identity()
    }

    fn is_bad(&self) -> bool {
        self.inner.is_bad()
    }

    fn reset(&mut self) -> bool {
        self.inner.reset()
    }

    fn close(&mut self) {
        self.inner.close()
    }
}
