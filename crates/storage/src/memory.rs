// Path: crates/storage/src/memory.rs
use crgov_api::storage::CheckpointStore;
use crgov_types::error::CheckpointError;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// A volatile [`CheckpointStore`]. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    records: Mutex<BTreeMap<u32, Vec<u8>>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<u32, Vec<u8>>>, CheckpointError> {
        self.records
            .lock()
            .map_err(|_| CheckpointError::Io("checkpoint store lock poisoned".into()))
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn save(&self, height: u32, bytes: &[u8]) -> Result<(), CheckpointError> {
        self.records()?.insert(height, bytes.to_vec());
        Ok(())
    }

    fn load(&self, height: u32) -> Result<Option<Vec<u8>>, CheckpointError> {
        Ok(self.records()?.get(&height).cloned())
    }

    fn heights(&self) -> Result<Vec<u32>, CheckpointError> {
        Ok(self.records()?.keys().copied().collect())
    }
}
