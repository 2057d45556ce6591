// Path: crates/api/src/lib.rs

//! # CR Governance API Crate Lints
//!
//! This crate enforces a strict set of lints to ensure high-quality,
//! panic-free, and well-documented code. Panics are disallowed in non-test
//! code to promote robust error handling.
#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::todo,
        clippy::unimplemented,
        clippy::indexing_slicing
    )
)]
//! # CR Governance API
//!
//! The traits through which the governance engine talks to the rest of the
//! node. The engine never reaches into networking, the mempool or the disk
//! directly; it is handed implementations of these traits instead.

/// Read-only view of the host chain (height, sync status).
pub mod chain;
/// Re-exports all core error types from the central `crgov-types` crate.
pub mod error;
/// Durable storage for encoded checkpoints.
pub mod storage;
/// The sink for engine-originated transactions.
pub mod transaction;

/// A curated set of the most commonly used traits and types.
pub mod prelude {
    pub use crate::chain::ChainView;
    pub use crate::storage::CheckpointStore;
    pub use crate::transaction::TxSubmitter;
}
