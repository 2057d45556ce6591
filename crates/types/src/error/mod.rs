// Path: crates/types/src/error/mod.rs
//! Core error types for the CR governance engine.

use thiserror::Error;

/// A trait for assigning a stable, machine-readable string code to an error.
pub trait ErrorCode {
    /// Returns the unique, stable string identifier for this error variant.
    fn code(&self) -> &'static str;
}

/// Errors raised by the height-indexed undo log.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HistoryError {
    /// The requested rollback target is older than the retained window.
    #[error("Rollback to {requested} is below the retained floor {floor}")]
    RollbackOutOfRange {
        /// The height the caller asked to roll back to.
        requested: u32,
        /// The oldest height that can still be reconstructed.
        floor: u32,
    },
    /// A frame was committed at a height that does not follow the current tip.
    #[error("Commit at height {height} does not follow tip {tip}")]
    NonMonotonicCommit {
        /// The height passed to `commit`.
        height: u32,
        /// The most recently committed height.
        tip: u32,
    },
}

impl ErrorCode for HistoryError {
    fn code(&self) -> &'static str {
        match self {
            Self::RollbackOutOfRange { .. } => "HISTORY_ROLLBACK_OUT_OF_RANGE",
            Self::NonMonotonicCommit { .. } => "HISTORY_NON_MONOTONIC_COMMIT",
        }
    }
}

/// Per-transaction rejections produced while applying governance payloads.
///
/// These never abort a block: the committee logs them and moves on to the next
/// transaction, leaving state untouched for the rejected one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GovernanceError {
    /// The payload is not handled by the component it was routed to.
    #[error("Unexpected payload: {0}")]
    UnexpectedPayload(String),
    /// The object created by this transaction already exists.
    #[error("Duplicate transaction: {0}")]
    DuplicateTransaction(String),
    /// No candidate is registered under the given CID.
    #[error("Candidate {0} not found")]
    CandidateNotFound(String),
    /// No seated council member matches the given identifier.
    #[error("Council member {0} not found")]
    MemberNotFound(String),
    /// No proposal is registered under the given hash.
    #[error("Proposal {0} not found")]
    ProposalNotFound(String),
    /// The council member already registered the maximum number of proposals this session.
    #[error("Council member {did} reached the proposal cap of {cap}")]
    ProposalCapExceeded {
        /// The DID of the proposing council member.
        did: String,
        /// The configured per-session cap.
        cap: u32,
    },
    /// The target object is not in a state that accepts this operation.
    #[error("Invalid state: {0}")]
    InvalidState(String),
    /// A general validation error occurred.
    #[error("Invalid governance operation: {0}")]
    Invalid(String),
}

impl ErrorCode for GovernanceError {
    fn code(&self) -> &'static str {
        match self {
            Self::UnexpectedPayload(_) => "GOV_UNEXPECTED_PAYLOAD",
            Self::DuplicateTransaction(_) => "GOV_DUPLICATE_TRANSACTION",
            Self::CandidateNotFound(_) => "GOV_CANDIDATE_NOT_FOUND",
            Self::MemberNotFound(_) => "GOV_MEMBER_NOT_FOUND",
            Self::ProposalNotFound(_) => "GOV_PROPOSAL_NOT_FOUND",
            Self::ProposalCapExceeded { .. } => "GOV_PROPOSAL_CAP_EXCEEDED",
            Self::InvalidState(_) => "GOV_INVALID_STATE",
            Self::Invalid(_) => "GOV_INVALID_OPERATION",
        }
    }
}

/// Errors related to checkpoint encoding and persistence.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckpointError {
    /// The underlying store failed to read or write.
    #[error("Checkpoint I/O error: {0}")]
    Io(String),
    /// The record failed validation (magic, checksum or body decode).
    #[error("Corrupt checkpoint: {0}")]
    Corrupt(String),
    /// The record was written by an unknown format version.
    #[error("Unsupported checkpoint version {0}")]
    UnsupportedVersion(u16),
    /// No checkpoint exists at or below the requested height.
    #[error("No checkpoint available at or below height {0}")]
    NotFound(u32),
}

impl ErrorCode for CheckpointError {
    fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "CHECKPOINT_IO_ERROR",
            Self::Corrupt(_) => "CHECKPOINT_CORRUPT",
            Self::UnsupportedVersion(_) => "CHECKPOINT_UNSUPPORTED_VERSION",
            Self::NotFound(_) => "CHECKPOINT_NOT_FOUND",
        }
    }
}

/// Engine-level errors propagated to the caller of the committee.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommitteeError {
    /// An undo-log operation failed.
    #[error("History error: {0}")]
    History(#[from] HistoryError),
    /// A block arrived out of height order.
    #[error("Unexpected block height. Expected {expected}, got {got}")]
    UnexpectedHeight {
        /// The height following the current tip.
        expected: u32,
        /// The height of the received block.
        got: u32,
    },
    /// The engine lock was poisoned by a panicking writer.
    #[error("Committee state lock poisoned")]
    LockPoisoned,
    /// A checkpoint operation failed.
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),
}

impl ErrorCode for CommitteeError {
    fn code(&self) -> &'static str {
        match self {
            Self::History(_) => "COMMITTEE_HISTORY_ERROR",
            Self::UnexpectedHeight { .. } => "COMMITTEE_UNEXPECTED_HEIGHT",
            Self::LockPoisoned => "COMMITTEE_LOCK_POISONED",
            Self::Checkpoint(_) => "COMMITTEE_CHECKPOINT_ERROR",
        }
    }
}

impl From<parity_scale_codec::Error> for CheckpointError {
    fn from(e: parity_scale_codec::Error) -> Self {
        CheckpointError::Corrupt(e.to_string())
    }
}

impl From<std::io::Error> for CheckpointError {
    fn from(e: std::io::Error) -> Self {
        CheckpointError::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        let err = CommitteeError::from(HistoryError::RollbackOutOfRange {
            requested: 3,
            floor: 10,
        });
        assert_eq!(err.code(), "COMMITTEE_HISTORY_ERROR");
        assert_eq!(
            err.to_string(),
            "History error: Rollback to 3 is below the retained floor 10"
        );
        assert_eq!(
            CheckpointError::UnsupportedVersion(9).code(),
            "CHECKPOINT_UNSUPPORTED_VERSION"
        );
    }
}
