// Path: crates/types/src/app/mod.rs
//! Core application-level data structures: identifiers, transactions and governance records.

/// Candidate, deposit and council-member records.
pub mod cr;
/// Decoded transaction payloads.
pub mod payload;
/// Identifier and amount primitives.
pub mod primitives;
/// Proposal lifecycle records.
pub mod proposal;
/// Blocks, transactions, inputs and vote outputs.
pub mod transaction;

pub use cr::*;
pub use payload::*;
pub use primitives::*;
pub use proposal::*;
pub use transaction::*;
