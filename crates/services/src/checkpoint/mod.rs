// Path: crates/services/src/checkpoint/mod.rs
//! Periodic full-state checkpoints and recovery from them.
//!
//! A checkpoint is the SCALE encoding of the three keyframes behind a short
//! magic/version preamble. Rollbacks deeper than the undo window fall back to
//! the newest checkpoint at or below the target; the caller then replays the
//! blocks after it.

use crate::committee::{Committee, KeyFrame};
use crate::proposal::ProposalKeyFrame;
use crate::registry::StateKeyFrame;
use crgov_api::prelude::*;
use crgov_telemetry::checkpoint_metrics;
use crgov_types::config::CheckpointConfig;
use crgov_types::error::{CheckpointError, CommitteeError, HistoryError};
use parity_scale_codec::{Decode, DecodeAll, Encode};
use std::sync::Arc;

const MAGIC: &[u8; 4] = b"CRCP";
const VERSION: u16 = 1;

/// The complete engine state at one height.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct Checkpoint {
    pub height: u32,
    pub committee: KeyFrame,
    pub state: StateKeyFrame,
    pub proposals: ProposalKeyFrame,
}

impl Checkpoint {
    /// Canonical bytes: identical states always encode identically.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(64);
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&VERSION.to_le_bytes());
        Encode::encode_to(self, &mut out);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CheckpointError> {
        let (magic, rest) = bytes
            .split_first_chunk::<4>()
            .ok_or_else(|| CheckpointError::Corrupt("truncated preamble".into()))?;
        if magic != MAGIC {
            return Err(CheckpointError::Corrupt("bad magic".into()));
        }
        let (version, mut body) = rest
            .split_first_chunk::<2>()
            .ok_or_else(|| CheckpointError::Corrupt("truncated preamble".into()))?;
        let version = u16::from_le_bytes(*version);
        if version != VERSION {
            return Err(CheckpointError::UnsupportedVersion(version));
        }
        Ok(<Self as DecodeAll>::decode_all(&mut body)?)
    }
}

/// How a deep rollback was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// The undo log reached the target.
    RolledBack { reverted: usize },
    /// The state was replaced from a checkpoint; blocks after
    /// `checkpoint_height` must be replayed.
    Restored { checkpoint_height: u32 },
}

/// Writes checkpoints on a fixed interval and restores from them.
pub struct CheckpointManager {
    store: Arc<dyn CheckpointStore>,
    interval: u32,
}

impl std::fmt::Debug for CheckpointManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckpointManager")
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl CheckpointManager {
    pub fn new(store: Arc<dyn CheckpointStore>, config: &CheckpointConfig) -> Self {
        Self {
            store,
            interval: config.interval.max(1),
        }
    }

    /// Saves a checkpoint when `height` falls on the interval. Returns whether
    /// one was written.
    pub fn maybe_save(&self, committee: &Committee, height: u32) -> Result<bool, CommitteeError> {
        if height == 0 || height % self.interval != 0 {
            return Ok(false);
        }
        self.save(committee)?;
        Ok(true)
    }

    /// Unconditionally saves the committee's current state.
    pub fn save(&self, committee: &Committee) -> Result<u32, CommitteeError> {
        let checkpoint = committee.snapshot()?;
        let bytes = checkpoint.encode();
        self.store.save(checkpoint.height, &bytes)?;
        checkpoint_metrics().inc_checkpoints_saved(bytes.len() as u64);
        log::info!(
            "[Checkpoint] Saved height {} ({} bytes)",
            checkpoint.height,
            bytes.len()
        );
        Ok(checkpoint.height)
    }

    /// Rolls back to `height`, falling back to the newest usable checkpoint
    /// when the target lies below the undo window.
    pub fn rollback_or_recover(
        &self,
        committee: &Committee,
        height: u32,
    ) -> Result<RecoveryOutcome, CommitteeError> {
        match committee.rollback_to(height) {
            Ok(reverted) => Ok(RecoveryOutcome::RolledBack { reverted }),
            Err(CommitteeError::History(HistoryError::RollbackOutOfRange { floor, .. })) => {
                tracing::warn!(
                    target: "checkpoint",
                    height,
                    floor,
                    "Rollback below the undo window; recovering from checkpoint"
                );
                let checkpoint = self
                    .newest_usable(height)?
                    .ok_or(CheckpointError::NotFound(height))?;
                let checkpoint_height = checkpoint.height;
                committee.restore(checkpoint)?;
                checkpoint_metrics().inc_recoveries();
                Ok(RecoveryOutcome::Restored { checkpoint_height })
            }
            Err(e) => Err(e),
        }
    }

    /// The newest checkpoint at or below `height` that loads and decodes.
    /// Unreadable records count as absent; only I/O failures abort the search.
    fn newest_usable(&self, height: u32) -> Result<Option<Checkpoint>, CheckpointError> {
        let mut heights = self.store.heights()?;
        heights.retain(|h| *h <= height);
        for h in heights.into_iter().rev() {
            let decoded = match self.store.load(h) {
                Ok(Some(bytes)) => Checkpoint::decode(&bytes),
                Ok(None) => continue,
                Err(e) => Err(e),
            };
            match decoded {
                Ok(checkpoint) if checkpoint.height == h => return Ok(Some(checkpoint)),
                Ok(checkpoint) => tracing::warn!(
                    target: "checkpoint",
                    height = h,
                    recorded = checkpoint.height,
                    "Skipping checkpoint filed under the wrong height"
                ),
                Err(e @ CheckpointError::Io(_)) => return Err(e),
                Err(e) => tracing::warn!(
                    target: "checkpoint",
                    height = h,
                    error = %e,
                    "Skipping unusable checkpoint"
                ),
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crgov_types::app::{Block, CrInfo, Output, Payload, Transaction};
    use crgov_types::config::CommitteeParams;
    use crgov_types::prelude::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemStore(Mutex<BTreeMap<u32, Vec<u8>>>);

    impl CheckpointStore for MemStore {
        fn save(&self, height: u32, bytes: &[u8]) -> Result<(), CheckpointError> {
            self.0.lock().unwrap().insert(height, bytes.to_vec());
            Ok(())
        }
        fn load(&self, height: u32) -> Result<Option<Vec<u8>>, CheckpointError> {
            Ok(self.0.lock().unwrap().get(&height).cloned())
        }
        fn heights(&self) -> Result<Vec<u32>, CheckpointError> {
            Ok(self.0.lock().unwrap().keys().copied().collect())
        }
    }

    fn committee(capacity: usize) -> Committee {
        Committee::new(CommitteeParams {
            history_capacity: capacity,
            ..CommitteeParams::default()
        })
    }

    fn register_block(height: u32, seed: u8) -> Block {
        let info = CrInfo::from_code(vec![seed; 35], format!("n{seed}"));
        let deposit = ProgramHash::deposit_from_code(&info.code);
        Block {
            height,
            transactions: vec![Transaction {
                hash: Hash256::digest(&[seed]),
                payload: Payload::RegisterCr(info),
                inputs: vec![],
                outputs: vec![Output::new(Fixed64(5_000), deposit)],
                programs: vec![],
            }],
        }
    }

    fn empty(height: u32) -> Block {
        Block {
            height,
            transactions: vec![],
        }
    }

    #[test]
    fn decode_rejects_foreign_bytes() {
        assert!(matches!(
            Checkpoint::decode(b"NOPE\x01\x00"),
            Err(CheckpointError::Corrupt(_))
        ));
        assert!(matches!(
            Checkpoint::decode(b"CRCP\x09\x00"),
            Err(CheckpointError::UnsupportedVersion(9))
        ));
        assert!(matches!(
            Checkpoint::decode(b"CR"),
            Err(CheckpointError::Corrupt(_))
        ));
    }

    #[test]
    fn encoding_is_canonical() {
        let c = committee(10);
        c.process_block(&register_block(1, 1)).unwrap();
        let snap = c.snapshot().unwrap();
        let bytes = snap.encode();
        assert_eq!(Checkpoint::decode(&bytes).unwrap(), snap);
        assert_eq!(Checkpoint::decode(&bytes).unwrap().encode(), bytes);
    }

    #[test]
    fn saves_on_the_interval_only() {
        let store = Arc::new(MemStore::default());
        let manager = CheckpointManager::new(
            store.clone(),
            &CheckpointConfig {
                interval: 3,
                ..CheckpointConfig::default()
            },
        );
        let c = committee(10);
        for h in 1..=7 {
            c.process_block(&empty(h)).unwrap();
            manager.maybe_save(&c, h).unwrap();
        }
        assert_eq!(store.heights().unwrap(), vec![3, 6]);
    }

    #[test]
    fn deep_rollback_restores_the_newest_checkpoint() {
        let store = Arc::new(MemStore::default());
        let manager = CheckpointManager::new(
            store.clone(),
            &CheckpointConfig {
                interval: 4,
                ..CheckpointConfig::default()
            },
        );
        let c = committee(2);
        c.process_block(&register_block(1, 1)).unwrap();
        for h in 2..=4 {
            c.process_block(&empty(h)).unwrap();
            manager.maybe_save(&c, h).unwrap();
        }
        let at_four = c.snapshot().unwrap();
        c.process_block(&register_block(5, 2)).unwrap();
        for h in 6..=9 {
            c.process_block(&empty(h)).unwrap();
            manager.maybe_save(&c, h).unwrap();
        }

        // Inside the window: plain rollback.
        assert!(matches!(
            manager.rollback_or_recover(&c, 8).unwrap(),
            RecoveryOutcome::RolledBack { .. }
        ));

        // Below the window: the checkpoint at 4 is the newest at or below 5.
        let outcome = manager.rollback_or_recover(&c, 5).unwrap();
        assert_eq!(outcome, RecoveryOutcome::Restored { checkpoint_height: 4 });
        assert_eq!(c.snapshot().unwrap(), at_four);
        assert_eq!(c.tip().unwrap(), Some(4));

        // Replay continues from the checkpoint height.
        c.process_block(&register_block(5, 2)).unwrap();
        assert!(c.candidate(&ProgramHash::cid_from_code(&[2; 35])).unwrap().is_some());
    }

    #[test]
    fn undecodable_checkpoints_fall_back_to_an_older_one() {
        let store = Arc::new(MemStore::default());
        let manager = CheckpointManager::new(
            store.clone(),
            &CheckpointConfig {
                interval: 4,
                ..CheckpointConfig::default()
            },
        );
        let c = committee(2);
        c.process_block(&register_block(1, 1)).unwrap();
        for h in 2..=4 {
            c.process_block(&empty(h)).unwrap();
            manager.maybe_save(&c, h).unwrap();
        }
        let at_four = c.snapshot().unwrap();
        for h in 5..=12 {
            c.process_block(&empty(h)).unwrap();
        }
        // Newer records the store accepts but that do not decode.
        store.save(6, b"CRCP\x01\x00\xff").unwrap();
        store.save(8, b"CRCP\x02\x00garbage").unwrap();
        store.save(9, b"not a checkpoint").unwrap();

        let outcome = manager.rollback_or_recover(&c, 9).unwrap();
        assert_eq!(outcome, RecoveryOutcome::Restored { checkpoint_height: 4 });
        assert_eq!(c.snapshot().unwrap(), at_four);
    }

    #[test]
    fn unusable_checkpoints_alone_are_not_found() {
        let store = Arc::new(MemStore::default());
        let manager = CheckpointManager::new(store.clone(), &CheckpointConfig::default());
        let c = committee(1);
        for h in 1..=5 {
            c.process_block(&empty(h)).unwrap();
        }
        store.save(2, b"CRCP\x07\x00").unwrap();
        let err = manager.rollback_or_recover(&c, 3).unwrap_err();
        assert_eq!(err, CommitteeError::Checkpoint(CheckpointError::NotFound(3)));
    }

    #[test]
    fn recovery_without_a_checkpoint_fails() {
        let manager = CheckpointManager::new(
            Arc::new(MemStore::default()),
            &CheckpointConfig::default(),
        );
        let c = committee(1);
        for h in 1..=5 {
            c.process_block(&empty(h)).unwrap();
        }
        let err = manager.rollback_or_recover(&c, 1).unwrap_err();
        assert_eq!(err, CommitteeError::Checkpoint(CheckpointError::NotFound(1)));
    }
}
