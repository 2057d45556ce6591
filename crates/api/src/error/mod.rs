// Path: crates/api/src/error/mod.rs
// Re-export all core error types from the central types crate.
pub use crgov_types::error::{
    CheckpointError, CommitteeError, ErrorCode, GovernanceError, HistoryError,
};
pub use crgov_types::Result;
