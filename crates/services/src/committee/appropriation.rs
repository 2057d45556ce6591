// Path: crates/services/src/committee/appropriation.rs
//! Building and dispatching the per-term CRC appropriation transaction.
//!
//! The transaction is assembled from a copy of the foundation outputs taken
//! under the engine lock and is submitted from a detached task, so the
//! submitter may call back into the engine without deadlocking.

use crgov_api::prelude::*;
use crgov_types::app::{Output, Payload, Transaction, TxInput};
use crgov_types::codec;
use crgov_types::prelude::*;
use std::sync::Arc;

/// Everything needed to build one appropriation transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppropriationRequest {
    pub height: u32,
    /// Amount to move to the committee address.
    pub amount: Fixed64,
    pub foundation_address: ProgramHash,
    pub committee_address: ProgramHash,
    /// Spendable foundation outputs, in outpoint order.
    pub utxos: Vec<(OutPoint, Output)>,
}

/// Selects foundation outputs in outpoint order until `amount` is covered.
///
/// Returns `None` when the foundation cannot cover a positive amount.
pub fn build_appropriation_tx(request: &AppropriationRequest) -> Option<Transaction> {
    if !request.amount.is_positive() {
        return None;
    }
    let mut inputs = Vec::new();
    let mut gathered = Fixed64::ZERO;
    for (outpoint, output) in &request.utxos {
        if gathered >= request.amount {
            break;
        }
        gathered += output.value;
        inputs.push(TxInput {
            previous: *outpoint,
            output: output.clone(),
        });
    }
    if gathered < request.amount {
        return None;
    }

    let mut outputs = vec![Output::new(request.amount, request.committee_address)];
    let change = gathered - request.amount;
    if change.is_positive() {
        outputs.push(Output::new(change, request.foundation_address));
    }
    let hash = codec::digest_canonical(&(request.height, &inputs, &outputs));
    Some(Transaction {
        hash,
        payload: Payload::CrcAppropriation,
        inputs,
        outputs,
        programs: Vec::new(),
    })
}

/// Wires the committee to the node's chain view and mempool.
#[derive(Clone)]
pub struct AppropriationHook {
    chain: Arc<dyn ChainView>,
    submitter: Arc<dyn TxSubmitter>,
    runtime: Option<tokio::runtime::Handle>,
}

impl std::fmt::Debug for AppropriationHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppropriationHook")
            .field("runtime", &self.runtime.is_some())
            .finish_non_exhaustive()
    }
}

impl AppropriationHook {
    /// Captures the ambient tokio runtime, if any; without one, dispatch falls
    /// back to a plain thread.
    pub fn new(chain: Arc<dyn ChainView>, submitter: Arc<dyn TxSubmitter>) -> Self {
        Self {
            chain,
            submitter,
            runtime: tokio::runtime::Handle::try_current().ok(),
        }
    }

    /// Builds and submits the transaction on a detached task. Must be called
    /// without the engine lock held.
    pub(crate) fn dispatch(&self, request: AppropriationRequest) {
        if !self.chain.is_current() {
            tracing::debug!(
                target: "committee",
                best = self.chain.best_height(),
                "Node is syncing; appropriation deferred"
            );
            return;
        }
        let submitter = Arc::clone(&self.submitter);
        let job = move || {
            let Some(tx) = build_appropriation_tx(&request) else {
                tracing::warn!(
                    target: "committee",
                    amount = %request.amount,
                    "Foundation outputs cannot cover the appropriation"
                );
                return;
            };
            let hash = tx.hash;
            match submitter.submit(tx) {
                Ok(()) => tracing::info!(target: "committee", tx = %hash, amount = %request.amount, "Appropriation submitted"),
                Err(e) => tracing::error!(target: "committee", error = %e, "Appropriation submission failed"),
            }
        };
        match &self.runtime {
            Some(handle) => {
                handle.spawn_blocking(job);
            }
            None => {
                std::thread::spawn(job);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crgov_types::error::GovernanceError;
    use std::sync::mpsc;
    use std::sync::Mutex;
    use std::time::Duration;

    fn request(amount: i64, values: &[i64]) -> AppropriationRequest {
        AppropriationRequest {
            height: 10,
            amount: Fixed64(amount),
            foundation_address: ProgramHash([1; 21]),
            committee_address: ProgramHash([2; 21]),
            utxos: values
                .iter()
                .enumerate()
                .map(|(i, v)| {
                    (
                        OutPoint::new(Hash256([i as u8; 32]), 0),
                        Output::new(Fixed64(*v), ProgramHash([1; 21])),
                    )
                })
                .collect(),
        }
    }

    #[test]
    fn selects_outputs_and_returns_change() {
        let tx = build_appropriation_tx(&request(150, &[100, 100, 100])).unwrap();
        assert_eq!(tx.inputs.len(), 2);
        assert_eq!(tx.outputs[0], Output::new(Fixed64(150), ProgramHash([2; 21])));
        assert_eq!(tx.outputs[1], Output::new(Fixed64(50), ProgramHash([1; 21])));
        assert_eq!(tx.payload, Payload::CrcAppropriation);

        let exact = build_appropriation_tx(&request(200, &[100, 100])).unwrap();
        assert_eq!(exact.outputs.len(), 1);
    }

    #[test]
    fn insufficient_or_zero_amount_builds_nothing() {
        assert!(build_appropriation_tx(&request(500, &[100, 100])).is_none());
        assert!(build_appropriation_tx(&request(0, &[100])).is_none());
    }

    struct Chain(bool);
    impl ChainView for Chain {
        fn best_height(&self) -> u32 {
            10
        }
        fn is_current(&self) -> bool {
            self.0
        }
    }

    struct Sink(Mutex<mpsc::Sender<Transaction>>);
    impl TxSubmitter for Sink {
        fn submit(&self, tx: Transaction) -> Result<(), GovernanceError> {
            self.0
                .lock()
                .map_err(|_| GovernanceError::Invalid("poisoned".into()))?
                .send(tx)
                .map_err(|e| GovernanceError::Invalid(e.to_string()))
        }
    }

    #[test]
    fn dispatch_submits_from_a_detached_thread_when_synced() {
        let (tx, rx) = mpsc::channel();
        let hook = AppropriationHook::new(Arc::new(Chain(true)), Arc::new(Sink(Mutex::new(tx))));
        hook.dispatch(request(150, &[100, 100]));
        let submitted = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(submitted.outputs[0].value, Fixed64(150));
    }

    #[test]
    fn dispatch_is_suppressed_while_syncing() {
        let (tx, rx) = mpsc::channel();
        let hook = AppropriationHook::new(Arc::new(Chain(false)), Arc::new(Sink(Mutex::new(tx))));
        hook.dispatch(request(150, &[100, 100]));
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn dispatch_uses_the_ambient_runtime() {
        let (tx, rx) = mpsc::channel();
        let hook = AppropriationHook::new(Arc::new(Chain(true)), Arc::new(Sink(Mutex::new(tx))));
        assert!(hook.runtime.is_some());
        hook.dispatch(request(100, &[100]));
        let submitted = tokio::task::spawn_blocking(move || rx.recv_timeout(Duration::from_secs(5)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(submitted.inputs.len(), 1);
    }
}
