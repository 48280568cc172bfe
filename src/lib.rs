//! globalxact - a two-phase commit coordinator for remote-site transactions
//!
//! Tracks one global transaction at a time per host process: as the host
//! registers remote sites it is about to touch, the coordinator opens a
//! durable log ahead of every remote command, then drives every site
//! through PREPARE / COMMIT or ROLLBACK when the host's own transaction
//! settles. A site that doesn't acknowledge leaves the txnset `Incomplete`
//! and its resolution to a background [`recovery::RecoveryWorker`], rather
//! than blocking or failing the host transaction.
//!
//! Architecture:
//! ```text
//!   host backend (commit/abort notification)
//!            |
//!            v
//!      Coordinator  ---register_site--->  Txnset
//!            |                               |
//!            | on_event                      | prepare_all / commit_all / rollback_all
//!            v                               v
//!      HostEvent                       RemoteSite (per site)  ---via--->  RemoteConnection
//!                                            |
//!                                            v
//!                                       TxnsetLog (WAL, extglobalxact/<id>)
//!                                            |
//!                                 Incomplete  v
//!                                       RecoveryWorker (background thread, retries until dry)
//! ```

pub mod config;
pub mod coordinator;
pub mod error;
pub mod log;
pub mod phase;
pub mod recovery;
pub mod remote;
pub mod txnset;

pub use config::Config;
pub use coordinator::{Coordinator, HostEvent, HostTransactionEvents};
pub use error::{GxactError, Result};
pub use phase::Phase;
pub use recovery::{RecoveryConfig, RecoveryWorker};
pub use remote::{PgRemoteConnection, RemoteConnection, RemoteIdentity, RemoteSite};
pub use txnset::{Resolution, Txnset};
