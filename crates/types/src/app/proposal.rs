// Path: crates/types/src/app/proposal.rs
//! Proposal lifecycle records.

use crate::app::{Budget, BudgetType, CrcProposal, Fixed64, Hash256, ProgramHash, VoteResult};
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lifecycle status of a proposal.
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Encode, Decode,
)]
pub enum ProposalStatus {
    /// Waiting for the council review deadline.
    Registered,
    /// Approved by the council, waiting for the public vote deadline.
    CrAgreed,
    /// Passed the public vote; budgets are released through tracking.
    VoterAgreed,
    /// Completed.
    Finished,
    /// Rejected by the council.
    CrCanceled,
    /// Rejected by public vote.
    VoterCanceled,
    /// A deadline arrived while no council was seated.
    Aborted,
    /// Closed early through tracking or a close proposal.
    Terminated,
}

impl ProposalStatus {
    /// Terminal statuses never change again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Finished
                | Self::CrCanceled
                | Self::VoterCanceled
                | Self::Aborted
                | Self::Terminated
        )
    }

    /// A short, stable label for logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Registered => "Registered",
            Self::CrAgreed => "CRAgreed",
            Self::VoterAgreed => "VoterAgreed",
            Self::Finished => "Finished",
            Self::CrCanceled => "CRCanceled",
            Self::VoterCanceled => "VoterCanceled",
            Self::Aborted => "Aborted",
            Self::Terminated => "Terminated",
        }
    }
}

/// Status of one budget stage.
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Encode, Decode,
)]
pub enum BudgetStatus {
    /// Not yet released.
    Unfinished,
    /// Released and waiting for a withdrawal transaction.
    Withdrawable,
    /// Paid out.
    Withdrawn,
    /// Rejected by the secretary general; may be released again.
    Rejected,
    /// Will never be paid.
    Closed,
}

/// The mutable lifecycle state wrapped around an immutable proposal payload.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct ProposalState {
    /// Current status.
    pub status: ProposalStatus,
    /// The registered content.
    pub proposal: CrcProposal,
    /// Hash of the registering transaction.
    pub tx_hash: Hash256,
    /// Height of the registering transaction.
    pub register_height: u32,
    /// Height at which the public vote started.
    pub vote_start_height: u32,
    /// Council opinions by member DID.
    pub cr_votes: BTreeMap<ProgramHash, VoteResult>,
    /// Public reject votes counted while `CrAgreed`.
    pub voters_reject_amount: Fixed64,
    /// Paid amount per stage.
    pub withdrawn_budgets: BTreeMap<u8, Fixed64>,
    /// Released but unpaid amount per stage.
    pub withdrawable_budgets: BTreeMap<u8, Fixed64>,
    /// Status per stage.
    pub budgets_status: BTreeMap<u8, BudgetStatus>,
    /// Set once only the final payment stage remains unpaid.
    pub final_payment_status: bool,
    /// Number of tracking records applied.
    pub tracking_count: u8,
    /// Stage most recently released by tracking.
    pub current_stage: u8,
    /// Height of termination, zero otherwise.
    pub terminated_height: u32,
    /// Public key of the current owner.
    pub proposal_owner: Vec<u8>,
    /// Current budget recipient.
    pub recipient: ProgramHash,
}

impl ProposalState {
    /// Wraps a freshly registered proposal.
    pub fn new(proposal: CrcProposal, tx_hash: Hash256, height: u32) -> Self {
        let budgets_status = proposal
            .budgets
            .iter()
            .map(|b| (b.stage, BudgetStatus::Unfinished))
            .collect();
        Self {
            status: ProposalStatus::Registered,
            proposal_owner: proposal.owner_public_key.clone(),
            recipient: proposal.recipient,
            proposal,
            tx_hash,
            register_height: height,
            vote_start_height: 0,
            cr_votes: BTreeMap::new(),
            voters_reject_amount: Fixed64::ZERO,
            withdrawn_budgets: BTreeMap::new(),
            withdrawable_budgets: BTreeMap::new(),
            budgets_status,
            final_payment_status: false,
            tracking_count: 0,
            current_stage: 0,
            terminated_height: 0,
        }
    }

    /// The budget entry of `stage`, if any.
    pub fn budget(&self, stage: u8) -> Option<&Budget> {
        self.proposal.budgets.iter().find(|b| b.stage == stage)
    }

    /// The status of `stage`, if the stage exists.
    pub fn stage_status(&self, stage: u8) -> Option<BudgetStatus> {
        self.budgets_status.get(&stage).copied()
    }

    /// Number of council approvals.
    pub fn approvals(&self) -> usize {
        self.cr_votes
            .values()
            .filter(|v| **v == VoteResult::Approve)
            .count()
    }

    /// Sum of all withdrawn amounts.
    pub fn withdrawn_total(&self) -> Fixed64 {
        self.withdrawn_budgets.values().sum()
    }

    /// Moves `stage` to `Withdrawable`, recording its full amount as releasable.
    pub fn release_stage(&mut self, stage: u8) {
        if let Some(amount) = self.budget(stage).map(|b| b.amount) {
            self.budgets_status.insert(stage, BudgetStatus::Withdrawable);
            self.withdrawable_budgets.insert(stage, amount);
        }
    }

    /// Releases every imprest stage.
    pub fn release_imprest(&mut self) {
        let stages: Vec<u8> = self
            .proposal
            .budgets
            .iter()
            .filter(|b| b.budget_type == BudgetType::Imprest)
            .map(|b| b.stage)
            .collect();
        for stage in stages {
            self.release_stage(stage);
        }
    }

    /// Closes every stage that is neither paid nor awaiting withdrawal and returns
    /// the amount no longer owed.
    pub fn close_unpaid_stages(&mut self) -> Fixed64 {
        let mut released = Fixed64::ZERO;
        for budget in &self.proposal.budgets {
            let status = self
                .budgets_status
                .entry(budget.stage)
                .or_insert(BudgetStatus::Unfinished);
            if matches!(
                *status,
                BudgetStatus::Unfinished | BudgetStatus::Rejected
            ) {
                *status = BudgetStatus::Closed;
                released += budget.amount;
            }
        }
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ProposalKind;

    fn proposal_with_budgets() -> CrcProposal {
        CrcProposal {
            kind: ProposalKind::Normal,
            category_data: String::new(),
            owner_public_key: vec![1; 33],
            draft_hash: Hash256([9; 32]),
            budgets: vec![
                Budget {
                    budget_type: BudgetType::Imprest,
                    stage: 0,
                    amount: Fixed64(100),
                },
                Budget {
                    budget_type: BudgetType::NormalPayment,
                    stage: 1,
                    amount: Fixed64(200),
                },
                Budget {
                    budget_type: BudgetType::FinalPayment,
                    stage: 2,
                    amount: Fixed64(300),
                },
            ],
            recipient: ProgramHash([3; 21]),
            cr_council_member_did: ProgramHash([4; 21]),
        }
    }

    #[test]
    fn close_unpaid_stages_keeps_withdrawable_and_paid() {
        let mut state = ProposalState::new(proposal_with_budgets(), Hash256([1; 32]), 10);
        state.release_imprest();
        assert_eq!(state.stage_status(0), Some(BudgetStatus::Withdrawable));
        state.budgets_status.insert(1, BudgetStatus::Rejected);

        let released = state.close_unpaid_stages();
        assert_eq!(released, Fixed64(500));
        assert_eq!(state.stage_status(0), Some(BudgetStatus::Withdrawable));
        assert_eq!(state.stage_status(1), Some(BudgetStatus::Closed));
        assert_eq!(state.stage_status(2), Some(BudgetStatus::Closed));
    }

    #[test]
    fn terminal_statuses() {
        assert!(!ProposalStatus::Registered.is_terminal());
        assert!(!ProposalStatus::VoterAgreed.is_terminal());
        assert!(ProposalStatus::Aborted.is_terminal());
        assert!(ProposalStatus::Terminated.is_terminal());
    }
}
