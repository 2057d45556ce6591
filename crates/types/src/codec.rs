// Path: crates/types/src/codec.rs

//! Defines the canonical, deterministic binary codec for key frames and checkpoints.
//!
//! Every snapshot the engine persists goes through these wrappers around
//! `parity-scale-codec` (SCALE). All state maps are ordered, so the same logical
//! state always produces the same bytes; rollback tests compare encodings directly.

use crate::app::Hash256;
use parity_scale_codec::{Decode, DecodeAll, Encode};
use sha2::{Digest, Sha256};

/// Encodes a value into its canonical SCALE byte representation.
pub fn to_bytes_canonical<T: Encode>(v: &T) -> Result<Vec<u8>, String> {
    Ok(v.encode())
}

/// Decodes a value from its canonical SCALE byte representation.
///
/// Trailing bytes are rejected; a checkpoint body that decodes with leftovers
/// was written by a different schema and must not be trusted.
pub fn from_bytes_canonical<T: Decode>(b: &[u8]) -> Result<T, String> {
    T::decode_all(&mut &*b).map_err(|e| format!("canonical decode failed: {}", e))
}

/// Hashes the canonical encoding of a value with SHA-256.
///
/// Used to derive proposal hashes from their payload content.
pub fn digest_canonical<T: Encode>(v: &T) -> Hash256 {
    let digest = Sha256::digest(v.encode());
    Hash256(digest.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[derive(Encode, Decode, Debug, PartialEq, Eq)]
    struct Sample {
        height: u32,
        nickname: String,
        votes: BTreeMap<[u8; 4], i64>,
    }

    #[test]
    fn test_canonical_codec_roundtrip_and_trailing_bytes() {
        let mut votes = BTreeMap::new();
        votes.insert(*b"bbbb", 20);
        votes.insert(*b"aaaa", 10);
        let original = Sample {
            height: 42,
            nickname: "alice".to_string(),
            votes,
        };

        let encoded = to_bytes_canonical(&original).unwrap();
        let decoded = from_bytes_canonical::<Sample>(&encoded).unwrap();
        assert_eq!(original, decoded);

        let mut padded = encoded.clone();
        padded.push(0);
        assert!(from_bytes_canonical::<Sample>(&padded).is_err());
    }

    #[test]
    fn test_digest_is_content_derived() {
        let a = digest_canonical(&(1u32, "x".to_string()));
        let b = digest_canonical(&(1u32, "x".to_string()));
        let c = digest_canonical(&(2u32, "x".to_string()));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
