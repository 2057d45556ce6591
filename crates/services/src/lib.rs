// Path: crates/services/src/lib.rs
#![forbid(unsafe_code)]
#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::todo,
        clippy::indexing_slicing
    )
)]

//! # CR Governance Services
//!
//! The stateful components of the governance engine. [`committee::Committee`]
//! is the per-block driver; it owns a [`registry::CandidateRegistry`] and a
//! [`proposal::ProposalManager`] by value, and every mutation any of them makes
//! goes through its own undo log so the whole engine can be rolled back.

pub mod checkpoint;
pub mod committee;
pub mod proposal;
pub mod registry;

pub use checkpoint::{Checkpoint, CheckpointManager, RecoveryOutcome};
pub use committee::{BlockOutcome, Committee};
