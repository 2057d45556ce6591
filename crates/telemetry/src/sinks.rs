// Path: crates/telemetry/src/sinks.rs
//! Defines abstract traits for metrics reporting, decoupling engine logic from the backend.

use once_cell::sync::OnceCell;

// --- Static Sink Access ---

/// A no-op sink for use in tests or when telemetry is disabled.
#[derive(Debug, Clone, Copy)]
pub struct NopSink;

/// A lazily-initialized static reference to the global `MetricsSink` implementation.
pub static SINK: OnceCell<&'static dyn MetricsSink> = OnceCell::new();
static NOP_SINK: NopSink = NopSink;

/// Returns the configured committee metrics sink, or a no-op sink.
pub fn committee_metrics() -> &'static dyn CommitteeMetricsSink {
    SINK.get().copied().unwrap_or(&NOP_SINK)
}

/// Returns the configured proposal metrics sink, or a no-op sink.
pub fn proposal_metrics() -> &'static dyn ProposalMetricsSink {
    SINK.get().copied().unwrap_or(&NOP_SINK)
}

/// Returns the configured checkpoint metrics sink, or a no-op sink.
pub fn checkpoint_metrics() -> &'static dyn CheckpointMetricsSink {
    SINK.get().copied().unwrap_or(&NOP_SINK)
}

/// Returns the configured error metrics sink, or a no-op sink.
pub fn error_metrics() -> &'static dyn ErrorMetricsSink {
    SINK.get().copied().unwrap_or(&NOP_SINK)
}

// --- Trait Definitions ---

/// A sink for metrics related to per-block committee processing.
pub trait CommitteeMetricsSink: Send + Sync + std::fmt::Debug {
    /// Increments the counter of processed blocks.
    fn inc_blocks_processed(&self);
    /// Observes the duration of one `process_block` call.
    fn observe_block_duration(&self, duration_secs: f64);
    /// Sets the gauge of council members in the Elected state.
    fn set_elected_members(&self, count: u64);
    /// Sets the gauge of Pending and Active candidates.
    fn set_current_candidates(&self, count: u64);
    /// Increments the counter of rollbacks and the number of reverted records.
    fn inc_rollbacks(&self, reverted_records: u64);
    /// Increments the counter of transactions rejected by the engine, by payload.
    fn inc_rejected_transactions(&self, payload: &'static str);
}
impl CommitteeMetricsSink for NopSink {
    fn inc_blocks_processed(&self) {}
    fn observe_block_duration(&self, _duration_secs: f64) {}
    fn set_elected_members(&self, _count: u64) {}
    fn set_current_candidates(&self, _count: u64) {}
    fn inc_rollbacks(&self, _reverted_records: u64) {}
    fn inc_rejected_transactions(&self, _payload: &'static str) {}
}

/// A sink for metrics related to the proposal lifecycle.
pub trait ProposalMetricsSink: Send + Sync + std::fmt::Debug {
    /// Increments a counter of status transitions, labeled by the new status.
    fn inc_status_transition(&self, status: &'static str);
    /// Increments the counter of budget stages paid out.
    fn inc_budget_withdrawals(&self, stages: u64);
}
impl ProposalMetricsSink for NopSink {
    fn inc_status_transition(&self, _status: &'static str) {}
    fn inc_budget_withdrawals(&self, _stages: u64) {}
}

/// A sink for metrics related to checkpoint persistence.
pub trait CheckpointMetricsSink: Send + Sync + std::fmt::Debug {
    /// Increments the counter of written checkpoints and bytes.
    fn inc_checkpoints_saved(&self, bytes: u64);
    /// Increments the counter of recoveries from a checkpoint.
    fn inc_recoveries(&self);
}
impl CheckpointMetricsSink for NopSink {
    fn inc_checkpoints_saved(&self, _bytes: u64) {}
    fn inc_recoveries(&self) {}
}

/// A sink for recording structured error metrics.
pub trait ErrorMetricsSink: Send + Sync + std::fmt::Debug {
    /// Increments a counter for a specific error, categorized by its kind and variant.
    fn inc_error(&self, kind: &'static str, variant: &'static str);
}
impl ErrorMetricsSink for NopSink {
    fn inc_error(&self, _kind: &'static str, _variant: &'static str) {}
}

/// A unified sink that implements all domain-specific traits, providing a single
/// point of implementation for metrics backends like Prometheus.
pub trait MetricsSink:
    CommitteeMetricsSink + ProposalMetricsSink + CheckpointMetricsSink + ErrorMetricsSink
{
}

// Blanket implementation to allow any type that implements all sub-traits
// to be used as a `MetricsSink`.
impl<T> MetricsSink for T where
    T: CommitteeMetricsSink + ProposalMetricsSink + CheckpointMetricsSink + ErrorMetricsSink
{
}
