// Path: crates/services/src/committee/keyframe.rs
//! Committee-level state and its change records.

use crgov_state::prelude::*;
use crgov_types::app::{CandidateVotes, CrMember, Output};
use crgov_types::prelude::*;
use parity_scale_codec::{Decode, Encode};
use std::collections::BTreeMap;

/// Scalar committee bookkeeping, replaced as a whole on every change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode)]
pub struct CommitteeCounters {
    /// Number of completed rotations.
    pub session: u64,
    pub last_committee_height: u32,
    pub last_voting_start_height: u32,
    pub in_election_period: bool,
    pub need_appropriation: bool,
    /// Budget appropriated for the current term.
    pub current_stage_amount: Fixed64,
    /// Budget committed to proposals this term.
    pub committee_used_amount: Fixed64,
    pub circulation_amount: Fixed64,
}

/// Treasury balances aggregated from block outputs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode)]
pub struct TreasuryBalances {
    pub foundation: Fixed64,
    pub committee: Fixed64,
    pub destroyed: Fixed64,
}

/// Everything the committee itself owns, in canonical (ordered) form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode)]
pub struct KeyFrame {
    /// Members of the current term, by CID.
    pub members: BTreeMap<ProgramHash, CrMember>,
    /// Members of past terms, keyed by the session they served.
    pub history_members: BTreeMap<(u64, ProgramHash), CrMember>,
    pub counters: CommitteeCounters,
    pub balances: TreasuryBalances,
    /// Unspent outputs held by the foundation address.
    pub foundation_utxos: BTreeMap<OutPoint, Output>,
    /// Unspent outputs held by the committee address.
    pub committee_utxos: BTreeMap<OutPoint, Output>,
    /// Impeachment votes credited per vote output.
    pub impeachment_votes: BTreeMap<OutPoint, Vec<CandidateVotes>>,
}

/// A reversible mutation of one [`KeyFrame`] field.
#[derive(Debug, Clone)]
pub enum CommitteeChange {
    Counters(ValueChange<CommitteeCounters>),
    Balances(ValueChange<TreasuryBalances>),
    FoundationUtxo(MapChange<OutPoint, Output>),
    CommitteeUtxo(MapChange<OutPoint, Output>),
    Member(MapChange<ProgramHash, CrMember>),
    HistoryMember(MapChange<(u64, ProgramHash), CrMember>),
    ImpeachmentVotes(MapChange<OutPoint, Vec<CandidateVotes>>),
}

impl Reversible<KeyFrame> for CommitteeChange {
    fn apply(&self, t: &mut KeyFrame) {
        match self {
            Self::Counters(c) => c.apply_to(&mut t.counters),
            Self::Balances(c) => c.apply_to(&mut t.balances),
            Self::FoundationUtxo(c) => c.apply_to(&mut t.foundation_utxos),
            Self::CommitteeUtxo(c) => c.apply_to(&mut t.committee_utxos),
            Self::Member(c) => c.apply_to(&mut t.members),
            Self::HistoryMember(c) => c.apply_to(&mut t.history_members),
            Self::ImpeachmentVotes(c) => c.apply_to(&mut t.impeachment_votes),
        }
    }

    fn revert(&self, t: &mut KeyFrame) {
        match self {
            Self::Counters(c) => c.revert_from(&mut t.counters),
            Self::Balances(c) => c.revert_from(&mut t.balances),
            Self::FoundationUtxo(c) => c.revert_from(&mut t.foundation_utxos),
            Self::CommitteeUtxo(c) => c.revert_from(&mut t.committee_utxos),
            Self::Member(c) => c.revert_from(&mut t.members),
            Self::HistoryMember(c) => c.revert_from(&mut t.history_members),
            Self::ImpeachmentVotes(c) => c.revert_from(&mut t.impeachment_votes),
        }
    }
}
