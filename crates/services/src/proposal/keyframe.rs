// Path: crates/services/src/proposal/keyframe.rs
//! The proposal manager's snapshottable state and its change records.

use crgov_state::prelude::*;
use crgov_types::app::{ProposalState, ProposalVotes, SideChainInfo, UpgradeCodeInfo};
use crgov_types::prelude::*;
use parity_scale_codec::{Decode, Encode};
use std::collections::{BTreeMap, BTreeSet};

/// Singleton values set by passed proposals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode)]
pub struct ProposalSettings {
    pub secretary_general_public_key: Vec<u8>,
    pub secretary_general_did: ProgramHash,
    pub custom_id_fee_rate: Fixed64,
    pub custom_id_fee_effective_height: u32,
}

/// Everything the proposal manager knows, in canonical (ordered) form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode)]
pub struct ProposalKeyFrame {
    /// Every proposal ever registered, by proposal hash.
    pub proposals: BTreeMap<Hash256, ProposalState>,
    /// `(sponsor DID, proposal hash)` for proposals registered this session.
    pub session_index: BTreeSet<(ProgramHash, Hash256)>,
    /// Reject votes credited per vote output.
    pub reject_votes: BTreeMap<OutPoint, Vec<ProposalVotes>>,
    pub settings: ProposalSettings,
    pub reserved_custom_ids: BTreeSet<String>,
    pub received_custom_ids: BTreeMap<String, ProgramHash>,
    pub side_chains: BTreeMap<String, SideChainInfo>,
    pub upgrade_codes: BTreeMap<String, UpgradeCodeInfo>,
}

/// A reversible mutation of one [`ProposalKeyFrame`] field.
#[derive(Debug, Clone)]
pub enum ProposalChange {
    Proposal(MapChange<Hash256, ProposalState>),
    SessionIndex(SetChange<(ProgramHash, Hash256)>),
    RejectVotes(MapChange<OutPoint, Vec<ProposalVotes>>),
    Settings(ValueChange<ProposalSettings>),
    ReservedId(SetChange<String>),
    ReceivedId(MapChange<String, ProgramHash>),
    SideChain(MapChange<String, SideChainInfo>),
    UpgradeCode(MapChange<String, UpgradeCodeInfo>),
}

impl Reversible<ProposalKeyFrame> for ProposalChange {
    fn apply(&self, t: &mut ProposalKeyFrame) {
        match self {
            Self::Proposal(c) => c.apply_to(&mut t.proposals),
            Self::SessionIndex(c) => c.apply_to(&mut t.session_index),
            Self::RejectVotes(c) => c.apply_to(&mut t.reject_votes),
            Self::Settings(c) => c.apply_to(&mut t.settings),
            Self::ReservedId(c) => c.apply_to(&mut t.reserved_custom_ids),
            Self::ReceivedId(c) => c.apply_to(&mut t.received_custom_ids),
            Self::SideChain(c) => c.apply_to(&mut t.side_chains),
            Self::UpgradeCode(c) => c.apply_to(&mut t.upgrade_codes),
        }
    }

    fn revert(&self, t: &mut ProposalKeyFrame) {
        match self {
            Self::Proposal(c) => c.revert_from(&mut t.proposals),
            Self::SessionIndex(c) => c.revert_from(&mut t.session_index),
            Self::RejectVotes(c) => c.revert_from(&mut t.reject_votes),
            Self::Settings(c) => c.revert_from(&mut t.settings),
            Self::ReservedId(c) => c.revert_from(&mut t.reserved_custom_ids),
            Self::ReceivedId(c) => c.revert_from(&mut t.received_custom_ids),
            Self::SideChain(c) => c.revert_from(&mut t.side_chains),
            Self::UpgradeCode(c) => c.revert_from(&mut t.upgrade_codes),
        }
    }
}
