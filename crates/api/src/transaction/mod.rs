// Path: crates/api/src/transaction/mod.rs
//! The sink for transactions the engine originates itself.

use crgov_types::app::Transaction;
use crgov_types::error::GovernanceError;

/// Accepts engine-built transactions (mempool append and broadcast).
///
/// Called from a detached task, never while the engine lock is held.
pub trait TxSubmitter: Send + Sync {
    /// Hands `tx` to the mempool.
    fn submit(&self, tx: Transaction) -> Result<(), GovernanceError>;
}
