// Path: crates/types/src/app/payload.rs
//! Decoded transaction payloads consumed by the governance engine.
//!
//! Payload wire formats are decoded upstream; the engine only ever sees these
//! typed values and matches on them exhaustively.

use crate::app::{CrInfo, Fixed64, Hash256, ProgramHash};
use crate::codec;
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// The typed payload of a transaction.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub enum Payload {
    /// Block reward transaction.
    CoinBase,
    /// Plain value transfer (may carry vote outputs).
    TransferAsset,
    /// Registers a new CR candidate.
    RegisterCr(CrInfo),
    /// Updates the registration data of an existing candidate.
    UpdateCr(CrInfo),
    /// Withdraws a candidacy.
    UnregisterCr {
        /// The CID being unregistered.
        cid: ProgramHash,
    },
    /// Spends deposit outputs back to the candidate or member.
    ReturnCrDepositCoin,
    /// Registers a new proposal.
    CrcProposal(CrcProposal),
    /// A council member's review of a proposal.
    CrcProposalReview(CrcProposalReview),
    /// Progress tracking posted by the proposal owner and secretary general.
    CrcProposalTracking(CrcProposalTracking),
    /// Withdraws every withdrawable budget stage of a proposal.
    CrcProposalWithdraw(CrcProposalWithdraw),
    /// Moves the per-term appropriation from the foundation to the committee address.
    CrcAppropriation,
    /// Binds a DPoS node key to a council member.
    CrCouncilMemberClaimNode(CrCouncilMemberClaimNode),
    /// Requests reactivation of an inactive node.
    ActivateProducer {
        /// The node key requesting reactivation.
        node_public_key: Vec<u8>,
    },
    /// Marks the listed arbitrator node keys as inactive.
    InactiveArbitrators {
        /// Node keys that stopped producing.
        arbitrators: Vec<Vec<u8>>,
    },
    /// Evidence of misbehavior by a node key.
    IllegalEvidence {
        /// The offending node key.
        offender: Vec<u8>,
    },
}

impl Payload {
    /// A short, stable name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CoinBase => "CoinBase",
            Self::TransferAsset => "TransferAsset",
            Self::RegisterCr(_) => "RegisterCR",
            Self::UpdateCr(_) => "UpdateCR",
            Self::UnregisterCr { .. } => "UnregisterCR",
            Self::ReturnCrDepositCoin => "ReturnCRDepositCoin",
            Self::CrcProposal(_) => "CRCProposal",
            Self::CrcProposalReview(_) => "CRCProposalReview",
            Self::CrcProposalTracking(_) => "CRCProposalTracking",
            Self::CrcProposalWithdraw(_) => "CRCProposalWithdraw",
            Self::CrcAppropriation => "CRCAppropriation",
            Self::CrCouncilMemberClaimNode(_) => "CRCouncilMemberClaimNode",
            Self::ActivateProducer { .. } => "ActivateProducer",
            Self::InactiveArbitrators { .. } => "InactiveArbitrators",
            Self::IllegalEvidence { .. } => "IllegalEvidence",
        }
    }
}

/// Kind of a budget stage.
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Encode, Decode,
)]
pub enum BudgetType {
    /// Advance payment, withdrawable as soon as the council agrees.
    Imprest,
    /// Intermediate payment released by progress tracking.
    NormalPayment,
    /// Last payment released when the proposal is finalized.
    FinalPayment,
}

/// One stage of a proposal budget.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct Budget {
    /// Stage kind.
    pub budget_type: BudgetType,
    /// Stage index, unique within the proposal.
    pub stage: u8,
    /// Amount requested for the stage.
    pub amount: Fixed64,
}

/// Information carried by a side-chain registration proposal.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct SideChainInfo {
    /// Side-chain name, unique.
    pub side_chain_name: String,
    /// Magic number of the side-chain network.
    pub magic_number: u32,
    /// Genesis block hash of the side chain.
    pub genesis_hash: Hash256,
    /// Exchange rate against the main chain.
    pub exchange_rate: Fixed64,
    /// Effective height of the registration.
    pub effective_height: u32,
}

/// Information carried by a code-upgrade proposal.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct UpgradeCodeInfo {
    /// Height from which the new code must run.
    pub work_height: u32,
    /// Target node version.
    pub node_version: String,
    /// Download location of the release.
    pub node_download_url: String,
    /// Hash of the release binary.
    pub node_binary_hash: Hash256,
    /// Whether nodes must upgrade by `work_height`.
    pub force_upgrade: bool,
}

/// The closed set of proposal kinds and their kind-specific content.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub enum ProposalKind {
    /// Budgeted treasury spending.
    Normal,
    /// Elastos improvement proposal; budgets are optional.
    Elip,
    /// Transfers ownership of another proposal.
    ChangeProposalOwner {
        /// The proposal whose owner changes.
        target: Hash256,
        /// Public key of the new owner.
        new_owner_public_key: Vec<u8>,
        /// New budget recipient.
        new_recipient: ProgramHash,
    },
    /// Appoints a new secretary general.
    SecretaryGeneral {
        /// Public key of the secretary general.
        public_key: Vec<u8>,
        /// DID of the secretary general.
        did: ProgramHash,
    },
    /// Terminates another proposal.
    CloseProposal {
        /// The proposal to close.
        target: Hash256,
    },
    /// Reserves custom identifiers.
    ReserveCustomId {
        /// Identifiers to reserve.
        ids: Vec<String>,
    },
    /// Assigns reserved custom identifiers to a DID.
    ReceiveCustomId {
        /// Identifiers to assign.
        ids: Vec<String>,
        /// The receiving DID.
        receiver_did: ProgramHash,
    },
    /// Changes the custom-identifier fee rate.
    ChangeCustomIdFee {
        /// New fee rate.
        rate: Fixed64,
        /// Height from which the rate applies.
        effective_height: u32,
    },
    /// Registers a side chain.
    RegisterSideChain(SideChainInfo),
    /// Announces a node code upgrade for a chain.
    UpgradeCode {
        /// The chain being upgraded.
        chain: String,
        /// Release details.
        info: UpgradeCodeInfo,
    },
}

/// Fieldless discriminant of [`ProposalKind`].
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Encode, Decode,
)]
pub enum ProposalType {
    /// See [`ProposalKind::Normal`].
    Normal,
    /// See [`ProposalKind::Elip`].
    Elip,
    /// See [`ProposalKind::ChangeProposalOwner`].
    ChangeProposalOwner,
    /// See [`ProposalKind::SecretaryGeneral`].
    SecretaryGeneral,
    /// See [`ProposalKind::CloseProposal`].
    CloseProposal,
    /// See [`ProposalKind::ReserveCustomId`].
    ReserveCustomId,
    /// See [`ProposalKind::ReceiveCustomId`].
    ReceiveCustomId,
    /// See [`ProposalKind::ChangeCustomIdFee`].
    ChangeCustomIdFee,
    /// See [`ProposalKind::RegisterSideChain`].
    RegisterSideChain,
    /// See [`ProposalKind::UpgradeCode`].
    UpgradeCode,
}

impl ProposalType {
    /// Budgeted kinds enter the tracking and withdrawal phase after the public vote.
    pub fn is_budgeted(self) -> bool {
        matches!(self, Self::Normal | Self::Elip)
    }

    /// Kinds whose final outcome is reported back to the caller of `update_proposals`.
    pub fn reports_outcome(self) -> bool {
        matches!(
            self,
            Self::ReserveCustomId
                | Self::ReceiveCustomId
                | Self::ChangeCustomIdFee
                | Self::UpgradeCode
        )
    }
}

impl ProposalKind {
    /// Returns the fieldless discriminant.
    pub fn proposal_type(&self) -> ProposalType {
        match self {
            Self::Normal => ProposalType::Normal,
            Self::Elip => ProposalType::Elip,
            Self::ChangeProposalOwner { .. } => ProposalType::ChangeProposalOwner,
            Self::SecretaryGeneral { .. } => ProposalType::SecretaryGeneral,
            Self::CloseProposal { .. } => ProposalType::CloseProposal,
            Self::ReserveCustomId { .. } => ProposalType::ReserveCustomId,
            Self::ReceiveCustomId { .. } => ProposalType::ReceiveCustomId,
            Self::ChangeCustomIdFee { .. } => ProposalType::ChangeCustomIdFee,
            Self::RegisterSideChain(_) => ProposalType::RegisterSideChain,
            Self::UpgradeCode { .. } => ProposalType::UpgradeCode,
        }
    }
}

/// A proposal registration payload.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct CrcProposal {
    /// Kind and kind-specific content.
    pub kind: ProposalKind,
    /// Free-form category.
    pub category_data: String,
    /// Public key of the proposal owner.
    pub owner_public_key: Vec<u8>,
    /// Hash of the off-chain proposal draft.
    pub draft_hash: Hash256,
    /// Budget stages, possibly empty.
    pub budgets: Vec<Budget>,
    /// Receiver of withdrawn budgets.
    pub recipient: ProgramHash,
    /// DID of the council member sponsoring the proposal.
    pub cr_council_member_did: ProgramHash,
}

impl CrcProposal {
    /// The proposal hash, derived from the canonical encoding of the payload.
    pub fn hash(&self) -> Hash256 {
        codec::digest_canonical(self)
    }

    /// Sum of all budget stages.
    pub fn total_budget(&self) -> Fixed64 {
        self.budgets.iter().map(|b| b.amount).sum()
    }
}

/// A council member's opinion on a proposal.
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Encode, Decode,
)]
pub enum VoteResult {
    /// In favor.
    Approve,
    /// Against.
    Reject,
    /// No opinion.
    Abstain,
}

/// A proposal review payload.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct CrcProposalReview {
    /// The reviewed proposal.
    pub proposal_hash: Hash256,
    /// The opinion.
    pub vote_result: VoteResult,
    /// DID of the reviewing council member.
    pub did: ProgramHash,
    /// Hash of the off-chain opinion document.
    pub opinion_hash: Hash256,
}

/// The kind of a tracking record and its kind-specific content.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub enum TrackingType {
    /// Informational progress report.
    Common,
    /// Releases the given stage for withdrawal.
    Progress {
        /// The stage being released.
        stage: u8,
    },
    /// Rejects the given stage.
    Rejected {
        /// The stage being rejected.
        stage: u8,
    },
    /// Terminates the proposal.
    Terminated,
    /// Transfers ownership of the proposal.
    ChangeOwner {
        /// Public key of the new owner.
        new_owner_public_key: Vec<u8>,
        /// New budget recipient.
        new_recipient: ProgramHash,
    },
    /// Completes the proposal and releases the final payment.
    Finalized,
}

/// A proposal tracking payload.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct CrcProposalTracking {
    /// The tracked proposal.
    pub proposal_hash: Hash256,
    /// What the record does.
    pub tracking: TrackingType,
    /// Hash of the off-chain tracking message.
    pub message_hash: Hash256,
}

/// A proposal withdrawal payload.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct CrcProposalWithdraw {
    /// The proposal whose budgets are withdrawn.
    pub proposal_hash: Hash256,
    /// Public key of the proposal owner.
    pub owner_public_key: Vec<u8>,
    /// Receiver of the funds.
    pub recipient: ProgramHash,
    /// Amount paid out by the transaction.
    pub amount: Fixed64,
}

/// Binds a DPoS node key to a council member.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct CrCouncilMemberClaimNode {
    /// The node key being claimed.
    pub node_public_key: Vec<u8>,
    /// DID of the claiming council member.
    pub cr_council_member_did: ProgramHash,
}
