// Path: crates/types/src/app/primitives.rs
//! Identifier and amount primitives shared by every governance record.

use parity_scale_codec::{Decode, Encode};
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

/// Address prefix for standard single-signature programs.
pub const PREFIX_STANDARD: u8 = 0x21;
/// Address prefix for CR deposit programs.
pub const PREFIX_DEPOSIT: u8 = 0x1F;
/// Address prefix for CR identifiers (CID). DIDs share the prefix in this engine.
pub const PREFIX_CR_DID: u8 = 0x67;

/// A 21-byte program hash: one prefix byte followed by a 20-byte digest of the code.
#[derive(Encode, Decode, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ProgramHash(pub [u8; 21]);

impl ProgramHash {
    /// Derives a program hash from redeem-script code: `prefix || sha256(code)[..20]`.
    pub fn from_code(prefix: u8, code: &[u8]) -> Self {
        let digest = Sha256::digest(code);
        let mut bytes = [0u8; 21];
        bytes[0] = prefix;
        for (dst, src) in bytes.iter_mut().skip(1).zip(digest.iter()) {
            *dst = *src;
        }
        Self(bytes)
    }

    /// The CID a candidate registering with `code` is known under.
    pub fn cid_from_code(code: &[u8]) -> Self {
        Self::from_code(PREFIX_CR_DID, code)
    }

    /// The deposit address a candidate registering with `code` pays collateral to.
    pub fn deposit_from_code(code: &[u8]) -> Self {
        Self::from_code(PREFIX_DEPOSIT, code)
    }

    /// The address prefix byte.
    pub fn prefix(&self) -> u8 {
        self.0[0]
    }
}

impl AsRef<[u8]> for ProgramHash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for ProgramHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for ProgramHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProgramHash({})", hex::encode(self.0))
    }
}

/// A 32-byte SHA-256 digest identifying a transaction, proposal or document.
#[derive(Encode, Decode, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    /// Hashes arbitrary bytes with SHA-256.
    pub fn digest(bytes: &[u8]) -> Self {
        Self(Sha256::digest(bytes).into())
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", hex::encode(self.0))
    }
}

// Identifiers serialize as hex strings so they can key JSON maps.
macro_rules! hex_serde {
    ($ty:ty, $len:literal) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&hex::encode(self.0))
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                let bytes = hex::decode(&s).map_err(D::Error::custom)?;
                let arr: [u8; $len] = bytes
                    .try_into()
                    .map_err(|_| D::Error::custom(concat!("expected ", $len, " bytes")))?;
                Ok(Self(arr))
            }
        }
    };
}

hex_serde!(ProgramHash, 21);
hex_serde!(Hash256, 32);

/// A signed fixed-point amount with eight decimal places (1 coin = 100_000_000).
#[derive(
    Encode,
    Decode,
    Serialize,
    Deserialize,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Debug,
    Default,
)]
#[serde(transparent)]
pub struct Fixed64(pub i64);

impl Fixed64 {
    /// Sub-units per whole coin.
    pub const COIN: i64 = 100_000_000;
    /// The zero amount.
    pub const ZERO: Fixed64 = Fixed64(0);

    /// Builds an amount from whole coins.
    pub const fn from_coins(coins: i64) -> Self {
        Self(coins * Self::COIN)
    }

    /// Returns `self * numerator / denominator`, computed in 128-bit precision and
    /// truncated toward zero. A zero denominator yields zero.
    pub fn mul_div(self, numerator: i64, denominator: i64) -> Self {
        if denominator == 0 {
            return Self::ZERO;
        }
        let wide = i128::from(self.0) * i128::from(numerator) / i128::from(denominator);
        Self(i64::try_from(wide).unwrap_or(if wide.is_negative() {
            i64::MIN
        } else {
            i64::MAX
        }))
    }

    /// Returns `pct` percent of this amount.
    pub fn percent(self, pct: u32) -> Self {
        self.mul_div(i64::from(pct), 100)
    }

    /// True when the amount is strictly positive.
    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Clamps negative amounts to zero.
    pub fn non_negative(self) -> Self {
        Self(self.0.max(0))
    }
}

impl fmt::Display for Fixed64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let coin = Self::COIN.unsigned_abs();
        write!(f, "{}{}.{:08}", sign, abs / coin, abs % coin)
    }
}

impl Add for Fixed64 {
    type Output = Fixed64;
    fn add(self, rhs: Fixed64) -> Fixed64 {
        Fixed64(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Fixed64 {
    type Output = Fixed64;
    fn sub(self, rhs: Fixed64) -> Fixed64 {
        Fixed64(self.0.saturating_sub(rhs.0))
    }
}

impl AddAssign for Fixed64 {
    fn add_assign(&mut self, rhs: Fixed64) {
        *self = *self + rhs;
    }
}

impl SubAssign for Fixed64 {
    fn sub_assign(&mut self, rhs: Fixed64) {
        *self = *self - rhs;
    }
}

impl Neg for Fixed64 {
    type Output = Fixed64;
    fn neg(self) -> Fixed64 {
        Fixed64(self.0.saturating_neg())
    }
}

impl Sum for Fixed64 {
    fn sum<I: Iterator<Item = Fixed64>>(iter: I) -> Fixed64 {
        iter.fold(Fixed64::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Fixed64> for Fixed64 {
    fn sum<I: Iterator<Item = &'a Fixed64>>(iter: I) -> Fixed64 {
        iter.copied().sum()
    }
}

/// A reference to one output of a previous transaction.
#[derive(
    Encode, Decode, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug,
)]
pub struct OutPoint {
    /// Hash of the transaction that created the output.
    pub tx_hash: Hash256,
    /// Position of the output inside that transaction.
    pub index: u16,
}

impl OutPoint {
    /// Creates a new outpoint.
    pub fn new(tx_hash: Hash256, index: u16) -> Self {
        Self { tx_hash, index }
    }
}
