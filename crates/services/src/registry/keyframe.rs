// Path: crates/services/src/registry/keyframe.rs
//! The registry's snapshottable state and its change records.

use crgov_state::prelude::*;
use crgov_types::app::{Candidate, CandidateVotes, DepositInfo};
use crgov_types::prelude::*;
use parity_scale_codec::{Decode, Encode};
use std::collections::{BTreeMap, BTreeSet};

/// Everything the candidate registry knows, in canonical (ordered) form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode)]
pub struct StateKeyFrame {
    /// Candidates registered in the current election cycle, by CID.
    pub candidates: BTreeMap<ProgramHash, Candidate>,
    /// Candidates of earlier cycles, keyed by the session they were archived under.
    pub history_candidates: BTreeMap<(u64, ProgramHash), Candidate>,
    /// Nicknames held by current candidates.
    pub nicknames: BTreeSet<String>,
    /// Registration code of each current candidate.
    pub code_cids: BTreeMap<Vec<u8>, ProgramHash>,
    /// Deposit address to CID. Never pruned: deposits outlive candidacies.
    pub deposit_hashes: BTreeMap<ProgramHash, ProgramHash>,
    /// Deposit accounting per CID.
    pub deposits: BTreeMap<ProgramHash, DepositInfo>,
    /// Unspent outputs paid to a deposit address, with their value.
    pub deposit_outputs: BTreeMap<OutPoint, Fixed64>,
    /// Election votes credited per vote output.
    pub crc_votes: BTreeMap<OutPoint, Vec<CandidateVotes>>,
}

/// A reversible mutation of one [`StateKeyFrame`] field.
#[derive(Debug, Clone)]
pub enum RegistryChange {
    Candidate(MapChange<ProgramHash, Candidate>),
    HistoryCandidate(MapChange<(u64, ProgramHash), Candidate>),
    Nickname(SetChange<String>),
    Code(MapChange<Vec<u8>, ProgramHash>),
    DepositHash(MapChange<ProgramHash, ProgramHash>),
    Deposit(MapChange<ProgramHash, DepositInfo>),
    DepositOutput(MapChange<OutPoint, Fixed64>),
    Votes(MapChange<OutPoint, Vec<CandidateVotes>>),
}

impl Reversible<StateKeyFrame> for RegistryChange {
    fn apply(&self, t: &mut StateKeyFrame) {
        match self {
            Self::Candidate(c) => c.apply_to(&mut t.candidates),
            Self::HistoryCandidate(c) => c.apply_to(&mut t.history_candidates),
            Self::Nickname(c) => c.apply_to(&mut t.nicknames),
            Self::Code(c) => c.apply_to(&mut t.code_cids),
            Self::DepositHash(c) => c.apply_to(&mut t.deposit_hashes),
            Self::Deposit(c) => c.apply_to(&mut t.deposits),
            Self::DepositOutput(c) => c.apply_to(&mut t.deposit_outputs),
            Self::Votes(c) => c.apply_to(&mut t.crc_votes),
        }
    }

    fn revert(&self, t: &mut StateKeyFrame) {
        match self {
            Self::Candidate(c) => c.revert_from(&mut t.candidates),
            Self::HistoryCandidate(c) => c.revert_from(&mut t.history_candidates),
            Self::Nickname(c) => c.revert_from(&mut t.nicknames),
            Self::Code(c) => c.revert_from(&mut t.code_cids),
            Self::DepositHash(c) => c.revert_from(&mut t.deposit_hashes),
            Self::Deposit(c) => c.revert_from(&mut t.deposits),
            Self::DepositOutput(c) => c.revert_from(&mut t.deposit_outputs),
            Self::Votes(c) => c.revert_from(&mut t.crc_votes),
        }
    }
}
