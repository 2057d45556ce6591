// Path: crates/state/src/lib.rs
//! # CR Governance State Crate Lints
//!
//! This crate enforces a strict set of lints to ensure high-quality,
//! panic-free code. Panics are disallowed in non-test code.
#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::indexing_slicing
    )
)]
//! # CR Governance State
//!
//! Every stateful mutation of the governance engine is routed through a
//! [`History`]: a height-indexed undo log of tagged change records. Records know
//! how to apply and invert themselves, so a chain reorganization can be undone
//! by replaying the log backwards without any captured closures.

pub mod change;
pub mod history;

/// A prelude for easily importing the most common types.
pub mod prelude {
    pub use crate::change::{MapChange, SetChange, ValueChange};
    pub use crate::history::{History, Reversible};
}
