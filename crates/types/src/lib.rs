// Path: crates/types/src/lib.rs
#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unimplemented,
        clippy::todo,
        clippy::indexing_slicing
    )
)]

//! # CR Governance Types
//!
//! This crate is the foundational library for the CR governance engine. It holds
//! the primitive identifiers, the decoded transaction payloads consumed by the
//! engine, the candidate/member/proposal records, configuration and the error
//! enums shared by every other crate in the workspace.
//!
//! ## Architectural Role
//!
//! As the base crate, `crgov-types` has minimal dependencies and is itself a
//! dependency for every other crate. Keeping the record definitions here lets the
//! state ledger, the services and the checkpoint store agree on one canonical
//! encoding without depending on each other.

/// A top-level, crate-wide `Result` type alias with a default error type.
pub type Result<T, E = crate::error::GovernanceError> = std::result::Result<T, E>;

/// Application-level data structures: identifiers, transactions, candidates and proposals.
pub mod app;
/// The canonical, deterministic binary codec for snapshot and checkpoint state.
pub mod codec;
/// Engine configuration (`CommitteeParams`, `CheckpointConfig`).
pub mod config;
/// A unified set of all error types used across the workspace.
pub mod error;
/// A prelude containing useful extension traits like `OptionExt`.
pub mod prelude;
