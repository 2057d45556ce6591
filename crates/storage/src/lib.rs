// Path: crates/storage/src/lib.rs
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

//! Checkpoint stores for the CR governance engine.
//!
//! [`FileCheckpointStore`] keeps one file per checkpoint height, each guarded by
//! a SHA-256 checksum and replaced atomically. [`MemoryCheckpointStore`] is the
//! same contract without a disk, for tests and ephemeral nodes.

pub mod file;
pub mod memory;

pub use file::FileCheckpointStore;
pub use memory::MemoryCheckpointStore;
