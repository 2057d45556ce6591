// Path: crates/storage/src/file.rs
//! One checkpoint per file: `checkpoint_<height>.ckpt`.
//!
//! Each file is a bincode header followed by the opaque record. Writes go to a
//! temporary file in the same directory which is synced and then renamed over
//! the target, so a crash never leaves a half-written checkpoint behind.

use crgov_api::storage::CheckpointStore;
use crgov_types::error::CheckpointError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const PREFIX: &str = "checkpoint_";
const EXTENSION: &str = "ckpt";

/// Header for a checkpoint file.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
struct CheckpointHeader {
    height: u32,
    body_len: u64,
    checksum: [u8; 32],
}

fn checksum(body: &[u8]) -> [u8; 32] {
    Sha256::digest(body).into()
}

fn corrupt(path: &Path, reason: impl std::fmt::Display) -> CheckpointError {
    CheckpointError::Corrupt(format!("{}: {}", path.display(), reason))
}

#[derive(Debug)]
pub struct FileCheckpointStore {
    dir: PathBuf,
    keep: usize,
}

impl FileCheckpointStore {
    /// Opens (creating if needed) `dir`, retaining the newest `keep` records.
    pub fn open(dir: impl AsRef<Path>, keep: usize) -> Result<Self, CheckpointError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            keep: keep.max(1),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, height: u32) -> PathBuf {
        self.dir.join(format!("{PREFIX}{height}.{EXTENSION}"))
    }

    fn parse_height(name: &str) -> Option<u32> {
        name.strip_prefix(PREFIX)?
            .strip_suffix(EXTENSION)?
            .strip_suffix('.')?
            .parse()
            .ok()
    }

    fn prune(&self) -> Result<(), CheckpointError> {
        let heights = self.heights()?;
        let excess = heights.len().saturating_sub(self.keep);
        for height in heights.into_iter().take(excess) {
            fs::remove_file(self.path_for(height))?;
            tracing::debug!(target: "storage", height, "Pruned checkpoint");
        }
        Ok(())
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn save(&self, height: u32, bytes: &[u8]) -> Result<(), CheckpointError> {
        let header = CheckpointHeader {
            height,
            body_len: bytes.len() as u64,
            checksum: checksum(bytes),
        };
        let encoded = bincode::serialize(&header)
            .map_err(|e| CheckpointError::Io(format!("header encoding failed: {e}")))?;

        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(&encoded)?;
        tmp.write_all(bytes)?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;

        let path = self.path_for(height);
        tmp.persist(&path).map_err(|e| CheckpointError::Io(e.error.to_string()))?;

        tracing::info!(
            target: "storage",
            height,
            bytes = bytes.len(),
            checksum = %hex::encode(header.checksum),
            "Checkpoint written"
        );
        self.prune()
    }

    fn load(&self, height: u32) -> Result<Option<Vec<u8>>, CheckpointError> {
        let path = self.path_for(height);
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut reader = Cursor::new(raw.as_slice());
        let header: CheckpointHeader =
            bincode::deserialize_from(&mut reader).map_err(|e| corrupt(&path, e))?;
        if header.height != height {
            return Err(corrupt(
                &path,
                format!("header height {} does not match file name", header.height),
            ));
        }

        let mut body = Vec::new();
        reader.read_to_end(&mut body)?;
        if body.len() as u64 != header.body_len {
            return Err(corrupt(
                &path,
                format!("expected {} body bytes, found {}", header.body_len, body.len()),
            ));
        }
        if checksum(&body) != header.checksum {
            return Err(corrupt(&path, "checksum mismatch"));
        }
        Ok(Some(body))
    }

    fn heights(&self) -> Result<Vec<u32>, CheckpointError> {
        let mut heights = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if let Some(height) = entry.file_name().to_str().and_then(Self::parse_height) {
                heights.push(height);
            }
        }
        heights.sort_unstable();
        Ok(heights)
    }
}
