// Path: crates/telemetry/src/prometheus.rs
//! A concrete implementation of the metrics sinks using the Prometheus crate.

use crate::sinks::*;
use once_cell::sync::OnceCell;
use prometheus::{
    exponential_buckets, register_gauge, register_histogram, register_int_counter,
    register_int_counter_vec, Gauge, Histogram, IntCounter, IntCounterVec,
};

// --- Metric Statics ---
// Collectors are registered exactly once by `install`.

static COMMITTEE_BLOCKS_PROCESSED_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static COMMITTEE_BLOCK_DURATION_SECONDS: OnceCell<Histogram> = OnceCell::new();
static COMMITTEE_ELECTED_MEMBERS: OnceCell<Gauge> = OnceCell::new();
static COMMITTEE_CURRENT_CANDIDATES: OnceCell<Gauge> = OnceCell::new();
static COMMITTEE_ROLLBACKS_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static COMMITTEE_REVERTED_RECORDS_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static COMMITTEE_REJECTED_TX_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();
static PROPOSAL_TRANSITIONS_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();
static PROPOSAL_WITHDRAWN_STAGES_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static CHECKPOINT_SAVED_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static CHECKPOINT_BYTES_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static CHECKPOINT_RECOVERIES_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static ERRORS_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();

/// Prometheus-backed implementation of every sink trait.
#[derive(Debug, Clone, Copy)]
pub struct PrometheusSink;

// A sink call before `install` is a no-op rather than a panic.
macro_rules! with_metric {
    ($metric:ident, |$m:ident| $body:expr) => {
        if let Some($m) = $metric.get() {
            $body;
        }
    };
}

impl CommitteeMetricsSink for PrometheusSink {
    fn inc_blocks_processed(&self) {
        with_metric!(COMMITTEE_BLOCKS_PROCESSED_TOTAL, |m| m.inc());
    }
    fn observe_block_duration(&self, duration_secs: f64) {
        with_metric!(COMMITTEE_BLOCK_DURATION_SECONDS, |m| m.observe(duration_secs));
    }
    fn set_elected_members(&self, count: u64) {
        with_metric!(COMMITTEE_ELECTED_MEMBERS, |m| m.set(count as f64));
    }
    fn set_current_candidates(&self, count: u64) {
        with_metric!(COMMITTEE_CURRENT_CANDIDATES, |m| m.set(count as f64));
    }
    fn inc_rollbacks(&self, reverted_records: u64) {
        with_metric!(COMMITTEE_ROLLBACKS_TOTAL, |m| m.inc());
        with_metric!(COMMITTEE_REVERTED_RECORDS_TOTAL, |m| m.inc_by(reverted_records));
    }
    fn inc_rejected_transactions(&self, payload: &'static str) {
        with_metric!(COMMITTEE_REJECTED_TX_TOTAL, |m| m
            .with_label_values(&[payload])
            .inc());
    }
}

impl ProposalMetricsSink for PrometheusSink {
    fn inc_status_transition(&self, status: &'static str) {
        with_metric!(PROPOSAL_TRANSITIONS_TOTAL, |m| m
            .with_label_values(&[status])
            .inc());
    }
    fn inc_budget_withdrawals(&self, stages: u64) {
        with_metric!(PROPOSAL_WITHDRAWN_STAGES_TOTAL, |m| m.inc_by(stages));
    }
}

impl CheckpointMetricsSink for PrometheusSink {
    fn inc_checkpoints_saved(&self, bytes: u64) {
        with_metric!(CHECKPOINT_SAVED_TOTAL, |m| m.inc());
        with_metric!(CHECKPOINT_BYTES_TOTAL, |m| m.inc_by(bytes));
    }
    fn inc_recoveries(&self) {
        with_metric!(CHECKPOINT_RECOVERIES_TOTAL, |m| m.inc());
    }
}

impl ErrorMetricsSink for PrometheusSink {
    fn inc_error(&self, kind: &'static str, variant: &'static str) {
        with_metric!(ERRORS_TOTAL, |m| m.with_label_values(&[kind, variant]).inc());
    }
}

fn set_once<T>(cell: &OnceCell<T>, value: T) -> Result<(), prometheus::Error> {
    cell.set(value)
        .map_err(|_| prometheus::Error::Msg("prometheus sink already installed".into()))
}

/// Registers all collectors in the default registry, publishes the sink through
/// [`SINK`] and returns it. Must be called only once at startup.
pub fn install() -> Result<&'static dyn MetricsSink, prometheus::Error> {
    set_once(
        &COMMITTEE_BLOCKS_PROCESSED_TOTAL,
        register_int_counter!(
            "crgov_committee_blocks_processed_total",
            "Total number of blocks applied to the committee."
        )?,
    )?;
    set_once(
        &COMMITTEE_BLOCK_DURATION_SECONDS,
        register_histogram!(
            "crgov_committee_block_duration_seconds",
            "Latency of a single process_block call.",
            exponential_buckets(0.0005, 2.0, 15)?
        )?,
    )?;
    set_once(
        &COMMITTEE_ELECTED_MEMBERS,
        register_gauge!(
            "crgov_committee_elected_members",
            "Current number of council members in the Elected state."
        )?,
    )?;
    set_once(
        &COMMITTEE_CURRENT_CANDIDATES,
        register_gauge!(
            "crgov_committee_current_candidates",
            "Current number of Pending and Active candidates."
        )?,
    )?;
    set_once(
        &COMMITTEE_ROLLBACKS_TOTAL,
        register_int_counter!(
            "crgov_committee_rollbacks_total",
            "Total number of rollbacks performed."
        )?,
    )?;
    set_once(
        &COMMITTEE_REVERTED_RECORDS_TOTAL,
        register_int_counter!(
            "crgov_committee_reverted_records_total",
            "Total number of change records reverted by rollbacks."
        )?,
    )?;
    set_once(
        &COMMITTEE_REJECTED_TX_TOTAL,
        register_int_counter_vec!(
            "crgov_committee_rejected_transactions_total",
            "Transactions whose payload was rejected by the engine.",
            &["payload"]
        )?,
    )?;
    set_once(
        &PROPOSAL_TRANSITIONS_TOTAL,
        register_int_counter_vec!(
            "crgov_proposal_transitions_total",
            "Proposal status transitions, labeled by the new status.",
            &["status"]
        )?,
    )?;
    set_once(
        &PROPOSAL_WITHDRAWN_STAGES_TOTAL,
        register_int_counter!(
            "crgov_proposal_withdrawn_stages_total",
            "Total number of budget stages paid out."
        )?,
    )?;
    set_once(
        &CHECKPOINT_SAVED_TOTAL,
        register_int_counter!(
            "crgov_checkpoint_saved_total",
            "Total number of checkpoints written."
        )?,
    )?;
    set_once(
        &CHECKPOINT_BYTES_TOTAL,
        register_int_counter!(
            "crgov_checkpoint_bytes_total",
            "Total bytes of encoded checkpoints written."
        )?,
    )?;
    set_once(
        &CHECKPOINT_RECOVERIES_TOTAL,
        register_int_counter!(
            "crgov_checkpoint_recoveries_total",
            "Total number of state recoveries from a checkpoint."
        )?,
    )?;
    set_once(
        &ERRORS_TOTAL,
        register_int_counter_vec!(
            "crgov_errors_total",
            "Total number of errors, categorized by type and variant.",
            &["kind", "variant"]
        )?,
    )?;

    static PROMETHEUS_SINK: PrometheusSink = PrometheusSink;
    let sink: &'static dyn MetricsSink = &PROMETHEUS_SINK;
    // A second install cannot reach this point: the collectors above are already set.
    let _ = SINK.set(sink);
    Ok(sink)
}
