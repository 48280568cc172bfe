//! RemoteSite (C3) — a thin wrapper over an opaque remote-session handle
//!
//! The coordinator core never speaks to a concrete client crate directly;
//! it depends only on the shape of a libpq-style session through the
//! [`RemoteConnection`] trait. [`PgRemoteConnection`] is the ambient,
//! production implementation over the synchronous `postgres` crate.

/// The identity triple used for log emission: `postgresql://host:port/database`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteIdentity {
    pub host: String,
    pub port: u16,
    pub database: String,
}

impl RemoteIdentity {
    /// Render as the `postgresql://host:port/database` form used in the txnset log.
    pub fn to_url(&self) -> String {
        format!("postgresql://{}:{}/{}", self.host, self.port, self.database)
    }

    /// Parse a `postgresql://host:port/database` connection string.
    /// Returns `None` if the string doesn't look like one of ours.
    pub fn parse_url(s: &str) -> Option<RemoteIdentity> {
        let rest = s.strip_prefix("postgresql://")?;
        let (hostport, database) = rest.split_once('/')?;
        let (host, port) = hostport.rsplit_once(':')?;
        let port: u16 = port.parse().ok()?;
        if host.is_empty() || database.is_empty() {
            return None;
        }
        Some(RemoteIdentity {
            host: host.to_string(),
            port,
            database: database.to_string(),
        })
    }
}

/// Opaque remote-session handle. Mirrors a libpq `PGconn`: identity
/// accessors, synchronous `exec`, connectivity check/reset, and `close`.
///
/// Implementations must never raise from `exec` or `ensure_alive` — a
/// failed remote command is reported through the boolean return value so
/// that the coordinator can log it and continue driving the remaining
/// sites; recovery is what retries failures, not propagation.
pub trait RemoteConnection: Send {
    /// Issue a synchronous SQL command. Returns whether the remote
    /// reported a command-OK status.
    fn exec(&mut self, sql: &str) -> bool;

    /// Issue a synchronous query and return whether at least one row came back.
    /// Used for `SELECT ... FROM pg_prepared_xacts`-style presence checks.
    /// Returns `None` if the query itself failed (treated as "still present").
    fn query_has_rows(&mut self, sql: &str) -> Option<bool>;

    /// Pure identity accessors for log emission.
    fn identity(&self) -> RemoteIdentity;

    /// Is the underlying connection currently usable?
    fn is_bad(&self) -> bool;

    /// Attempt to reset a bad connection. Errors are swallowed by the
    /// caller (recovery will retry); this only reports whether the reset
    /// itself succeeded.
    fn reset(&mut self) -> bool;

    /// Release the session.
    fn close(&mut self);
}

/// Thin wrapper over one remote database participating in a txnset.
pub struct RemoteSite {
    connection: Box<dyn RemoteConnection>,
}

impl RemoteSite {
    pub fn new(connection: Box<dyn RemoteConnection>) -> Self {
        Self { connection }
    }

    /// Issue a synchronous SQL command; never raises.
    pub fn exec(&mut self, sql: &str) -> bool {
        self.connection.exec(sql)
    }

    /// `SELECT ... pg_prepared_xacts`-style presence check. `None` means
    /// the query itself failed and the site should be treated as present
    /// (retry later).
    pub fn query_has_rows(&mut self, sql: &str) -> Option<bool> {
        self.connection.query_has_rows(sql)
    }

    /// Pure `(host, port, database)` accessor.
    pub fn identity(&self) -> RemoteIdentity {
        self.connection.identity()
    }

    /// If the session reports a bad status, issue a reset. Errors are
    /// swallowed: recovery will retry.
    pub fn ensure_alive(&mut self) {
        if self.connection.is_bad() {
            let _ = self.connection.reset();
        }
    }

    /// Release the session.
    pub fn close(&mut self) {
        self.connection.close();
    }
}

/// Production [`RemoteConnection`] backed by the synchronous `postgres` crate.
pub struct PgRemoteConnection {
    client: postgres::Client,
    identity: RemoteIdentity,
}

impl PgRemoteConnection {
    /// Open a fresh libpq-style session to `identity` using `config`.
    pub fn connect(
        identity: RemoteIdentity,
        config: postgres::Config,
    ) -> Result<Self, postgres::Error> {
        let client = config.connect(postgres::NoTls)?;
        Ok(Self { client, identity })
    }

    /// Open a session from a `postgresql://host:port/database` URL, as
    /// reconstructed during [`crate::log::TxnsetLog::parse`].
    pub fn connect_url(url: &str) -> Result<Self, ConnectUrlError> {
        let identity = RemoteIdentity::parse_url(url).ok_or(ConnectUrlError::NotAConnectionString)?;
        let config: postgres::Config = url.parse().map_err(ConnectUrlError::Postgres)?;
        Self::connect(identity, config).map_err(ConnectUrlError::Postgres)
    }
}

/// Failure modes when reconstructing a remote session from a logged URL.
#[derive(Debug)]
pub enum ConnectUrlError {
    NotAConnectionString,
    Postgres(postgres::Error),
}

impl RemoteConnection for PgRemoteConnection {
    fn exec(&mut self, sql: &str) -> bool {
        self.client.execute(sql, &[]).is_ok()
    }

    fn query_has_rows(&mut self, sql: &str) -> Option<bool> {
        self.client.query(sql, &[]).ok().map(|rows| !rows.is_empty())
    }

    fn identity(&self) -> RemoteIdentity {
        self.identity.clone()
    }

    fn is_bad(&self) -> bool {
        self.client.is_closed()
    }

    fn reset(&mut self) -> bool {
        // The synchronous postgres crate has no in-place reconnect; a bad
        // client is simply left closed; `ensure_alive` swallows this and
        // the next `exec`/`query_has_rows` call will fail and be retried.
        !self.client.is_closed()
    }

    fn close(&mut self) {
        // Client is closed on drop; nothing to explicitly finish here
        // beyond letting the handle go out of scope at the call site.
    }
}
