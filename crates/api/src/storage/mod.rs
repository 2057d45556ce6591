// Path: crates/api/src/storage/mod.rs

//! API for durable storage of encoded checkpoints.

use crgov_types::error::CheckpointError;

/// Persists opaque, already-encoded checkpoint records keyed by height.
pub trait CheckpointStore: Send + Sync {
    /// Durably stores `bytes` as the checkpoint for `height`, replacing any
    /// previous record at that height.
    fn save(&self, height: u32, bytes: &[u8]) -> Result<(), CheckpointError>;

    /// Loads the record for `height`. `Ok(None)` when no record exists;
    /// `Err(Corrupt)` when a record exists but fails its integrity check.
    fn load(&self, height: u32) -> Result<Option<Vec<u8>>, CheckpointError>;

    /// Heights of all stored records, ascending.
    fn heights(&self) -> Result<Vec<u32>, CheckpointError>;

    /// The newest intact record at or below `height`.
    ///
    /// Corrupt records are skipped with a warning so that recovery falls back to
    /// the next older checkpoint.
    fn latest_at_or_below(&self, height: u32) -> Result<Option<(u32, Vec<u8>)>, CheckpointError> {
        let mut heights = self.heights()?;
        heights.retain(|h| *h <= height);
        for h in heights.into_iter().rev() {
            match self.load(h) {
                Ok(Some(bytes)) => return Ok(Some((h, bytes))),
                Ok(None) => continue,
                Err(CheckpointError::Corrupt(reason)) => {
                    log::warn!("[Checkpoint] Skipping corrupt checkpoint at {}: {}", h, reason);
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }
}
