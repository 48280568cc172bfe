//! Phase state machine (C1)
//!
//! A closed enumeration of the six states a txnset can be in, the
//! lowercase label each one is persisted under, and the legal-transition
//! predicate that every state change must pass.

use crate::error::GxactError;

/// Coordinator's view of where a txnset is in the 2PC protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Begin,
    Prepare,
    Commit,
    Rollback,
    Complete,
    Incomplete,
}

impl Phase {
    /// The stable lowercase label used in the on-disk format.
    pub fn label(self) -> &'static str {
        match self {
            Phase::Begin => "begin",
            Phase::Prepare => "prepare",
            Phase::Commit => "commit",
            Phase::Rollback => "rollback",
            Phase::Complete => "complete",
            Phase::Incomplete => "incomplete",
        }
    }

    /// Parse a label back into a `Phase`. Fails for any string outside the
    /// fixed set of six labels.
    pub fn from_label(label: &str) -> Result<Phase, GxactError> {
        match label {
            "begin" => Ok(Phase::Begin),
            "prepare" => Ok(Phase::Prepare),
            "commit" => Ok(Phase::Commit),
            "rollback" => Ok(Phase::Rollback),
            "complete" => Ok(Phase::Complete),
            "incomplete" => Ok(Phase::Incomplete),
            other => Err(GxactError::InvalidPhaseLabel(format!(
                "unknown txnset phase label '{}'",
                other
            ))),
        }
    }

    /// Is `old -> new` a legal transition?
    ///
    /// `Begin` is never a legal transition target — it is only the initial
    /// phase assigned when a txnset is created.
    pub fn is_valid_transition(old: Phase, new: Phase) -> bool {
        matches!(
            (old, new),
            (Phase::Begin, Phase::Prepare)
                | (Phase::Prepare, Phase::Commit)
                | (Phase::Prepare, Phase::Rollback)
                | (Phase::Commit, Phase::Complete)
                | (Phase::Commit, Phase::Incomplete)
                | (Phase::Rollback, Phase::Complete)
                | (Phase::Rollback, Phase::Incomplete)
                | (Phase::Incomplete, Phase::Complete)
        )
    }
}
