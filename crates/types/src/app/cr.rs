// Path: crates/types/src/app/cr.rs
//! Candidate, deposit and council-member records.

use crate::app::{Fixed64, ProgramHash};
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// Registration data submitted by a CR candidate.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct CrInfo {
    /// Redeem-script code; the CID and deposit address derive from it.
    pub code: Vec<u8>,
    /// The candidate identifier.
    pub cid: ProgramHash,
    /// The decentralized identifier of the candidate.
    pub did: ProgramHash,
    /// Unique display name.
    pub nickname: String,
    /// Informational URL.
    pub url: String,
    /// Location code.
    pub location: u64,
}

impl CrInfo {
    /// Builds registration info whose CID and DID are derived from `code`.
    pub fn from_code(code: Vec<u8>, nickname: impl Into<String>) -> Self {
        let cid = ProgramHash::cid_from_code(&code);
        Self {
            code,
            cid,
            did: cid,
            nickname: nickname.into(),
            url: String::new(),
            location: 0,
        }
    }
}

/// Lifecycle state of a candidate.
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Encode, Decode,
)]
pub enum CandidateState {
    /// Registered, waiting for the activation confirmations.
    Pending,
    /// Eligible to receive votes and be elected.
    Active,
    /// Unregistered or not elected; the deposit is locked until maturation.
    Canceled,
    /// The deposit has been fully returned.
    Returned,
}

impl CandidateState {
    /// Pending and Active candidates hold their nickname and code reservations.
    pub fn is_current(self) -> bool {
        matches!(self, Self::Pending | Self::Active)
    }
}

/// A CR candidate record.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct Candidate {
    /// Registration data.
    pub info: CrInfo,
    /// Current lifecycle state.
    pub state: CandidateState,
    /// Votes counted during the voting period.
    pub votes: Fixed64,
    /// Height of the registering transaction.
    pub register_height: u32,
    /// Height of cancellation, zero while not canceled.
    pub cancel_height: u32,
    /// The deposit address derived from `info.code`.
    pub deposit_hash: ProgramHash,
}

/// Deposit bookkeeping for one CID.
///
/// `total_amount - deposit_amount - penalty` is never negative.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq, Encode, Decode)]
pub struct DepositInfo {
    /// Whether the locked collateral may be withdrawn.
    pub refundable: bool,
    /// Collateral currently locked.
    pub deposit_amount: Fixed64,
    /// Penalty retained from the deposit.
    pub penalty: Fixed64,
    /// All funds received at the deposit address minus funds returned.
    pub total_amount: Fixed64,
}

impl DepositInfo {
    /// Funds the owner may withdraw right now.
    pub fn available(&self) -> Fixed64 {
        self.total_amount - self.deposit_amount - self.penalty
    }
}

/// State of a seated or archived council member.
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Encode, Decode,
)]
pub enum MemberState {
    /// Serving normally.
    Elected,
    /// Removed by a public impeachment vote.
    Impeached,
    /// The term ended without a successor committee.
    Terminated,
    /// The member deposit was returned.
    Returned,
    /// The member's DPoS node stopped producing.
    Inactive,
    /// The member's DPoS node was caught misbehaving.
    Illegal,
}

impl MemberState {
    /// Members in these states still hold a council seat.
    pub fn is_seated(self) -> bool {
        matches!(self, Self::Elected | Self::Inactive | Self::Illegal)
    }
}

/// A council member record.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct CrMember {
    /// Registration data carried over from the candidate.
    pub info: CrInfo,
    /// Impeachment votes counted against the member.
    pub impeachment_votes: Fixed64,
    /// The deposit address of the member.
    pub deposit_hash: ProgramHash,
    /// Current state.
    pub member_state: MemberState,
    /// The DPoS node key claimed by the member, empty when unclaimed.
    pub dpos_public_key: Vec<u8>,
    /// Height at which the member became Inactive or Illegal.
    pub inactive_since: u32,
    /// Height of the latest activation request, if any.
    pub activate_request_height: Option<u32>,
    /// Set once the term-end or impeachment penalty has been charged.
    pub penalty_applied: bool,
}

impl CrMember {
    /// Seats an elected candidate.
    pub fn from_candidate(candidate: &super::Candidate) -> Self {
        Self {
            info: candidate.info.clone(),
            impeachment_votes: Fixed64::ZERO,
            deposit_hash: candidate.deposit_hash,
            member_state: MemberState::Elected,
            dpos_public_key: Vec::new(),
            inactive_since: 0,
            activate_request_height: None,
            penalty_applied: false,
        }
    }
}
