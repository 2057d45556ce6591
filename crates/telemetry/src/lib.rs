// Path: crates/telemetry/src/lib.rs
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

//! # CR Governance Telemetry
//!
//! Structured logging initialization and abstract metrics sinks. The engine
//! reports through the `*MetricsSink` traits; a Prometheus-backed sink can be
//! installed at startup, otherwise every call lands on a no-op sink.

/// The initialization routine for global structured logging.
pub mod init;
/// The concrete implementation of metrics sinks using the `prometheus` crate.
pub mod prometheus;
/// Abstract traits (`*MetricsSink`) that define the contract for metrics reporting.
pub mod sinks;
/// A simple RAII timer for measuring block processing time.
pub mod time;

// Re-export the public helper functions for easy access to the global sinks.
pub use sinks::{checkpoint_metrics, committee_metrics, error_metrics, proposal_metrics};
