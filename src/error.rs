//! Error types for the global transaction-set coordinator
//!
//! Defines a unified error type that can represent errors from every
//! component of the coordinator (phase state machine, txnset log, remote
//! sites, and the coordinator itself).

use std::fmt;
use std::io;

/// Unified error type for coordinator operations
#[derive(Debug)]
pub enum GxactError {
    /// I/O error (txnset log file operations)
    Io(io::Error),
    /// An attempted phase transition is not in the legal-transition table.
    /// Raised before the host transaction commits; never raised from the
    /// commit/abort callback.
    InvalidPhase(String),
    /// A phase label read back from a txnset log is not one of the six known labels
    InvalidPhaseLabel(String),
    /// A new txnset log collides with an existing file of the same name
    LogExists(String),
    /// A txnset log is malformed or contains an oversize line
    LogCorrupt(String),
    /// A remote PREPARE TRANSACTION returned a non-OK result
    PrepareFailed(String),
    /// The host invoked the coordinator with an event it cannot support
    /// (nested prepare inside a host-level 2PC)
    NotSupported(String),
}

impl fmt::Display for GxactError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GxactError::Io(e) => write!(f, "{}", e),
            GxactError::InvalidPhase(msg) => write!(f, "{}", msg),
            GxactError::InvalidPhaseLabel(msg) => write!(f, "{}", msg),
            GxactError::LogExists(msg) => write!(f, "{}", msg),
            GxactError::LogCorrupt(msg) => write!(f, "{}", msg),
            GxactError::PrepareFailed(msg) => write!(f, "{}", msg),
            GxactError::NotSupported(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for GxactError {}

impl From<io::Error> for GxactError {
    fn from(e: io::Error) -> Self {
        GxactError::Io(e)
    }
}

/// Result type alias for coordinator operations
pub type Result<T> = std::result::Result<T, GxactError>;
