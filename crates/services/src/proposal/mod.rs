// Path: crates/services/src/proposal/mod.rs
//! Proposal lifecycle manager.
//!
//! A proposal moves `Registered -> CrAgreed -> VoterAgreed -> Finished` when the
//! council approves it, the public does not reject it and its owner finalizes
//! it. Budgeted kinds pay out stage by stage in between; the other kinds take
//! effect the moment the public vote closes.

mod keyframe;

pub use keyframe::{ProposalChange, ProposalKeyFrame, ProposalSettings};

use crgov_state::prelude::*;
use crgov_telemetry::proposal_metrics;
use crgov_types::app::{
    BudgetStatus, BudgetType, CrcProposal, CrcProposalReview, CrcProposalTracking,
    CrcProposalWithdraw, ProposalKind, ProposalState, ProposalStatus, ProposalType,
    ProposalVotes, SideChainInfo, TrackingType, UpgradeCodeInfo,
};
use crgov_types::config::CommitteeParams;
use crgov_types::error::{GovernanceError, HistoryError};
use crgov_types::prelude::*;
use std::sync::Arc;

/// The final result of a proposal whose kind reports back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalOutcome {
    pub hash: Hash256,
    pub proposal_type: ProposalType,
    pub status: ProposalStatus,
    /// True when the proposal took effect.
    pub passed: bool,
}

/// What one call to [`ProposalManager::update_proposals`] changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProposalUpdate {
    pub outcomes: Vec<ProposalOutcome>,
    /// Budget no longer committed because stages were closed.
    pub released: Fixed64,
    pub transitions: usize,
}

/// Registration, review, voting, tracking and withdrawal of CRC proposals.
#[derive(Debug)]
pub struct ProposalManager {
    params: Arc<CommitteeParams>,
    state: ProposalKeyFrame,
    history: History<ProposalChange>,
}

impl ProposalManager {
    pub fn new(params: Arc<CommitteeParams>) -> Self {
        let history = History::new(params.history_capacity);
        Self {
            params,
            state: ProposalKeyFrame::default(),
            history,
        }
    }

    // --- Ledger plumbing ---

    fn record(&mut self, height: u32, change: ProposalChange) {
        self.history.append(&mut self.state, height, change);
    }

    fn put_proposal(&mut self, height: u32, hash: Hash256, proposal: ProposalState) {
        let change = MapChange::insert(&self.state.proposals, hash, proposal);
        self.record(height, ProposalChange::Proposal(change));
    }

    fn update_settings(&mut self, height: u32, f: impl FnOnce(&mut ProposalSettings)) {
        let mut next = self.state.settings.clone();
        f(&mut next);
        if next != self.state.settings {
            let change = ValueChange::new(&self.state.settings, next);
            self.record(height, ProposalChange::Settings(change));
        }
    }

    /// Stores `proposal` with status `to` and reports the transition.
    fn transition(&mut self, height: u32, hash: Hash256, mut proposal: ProposalState, to: ProposalStatus) {
        let from = proposal.status;
        proposal.status = to;
        self.put_proposal(height, hash, proposal);
        proposal_metrics().inc_status_transition(to.as_str());
        tracing::info!(
            target: "proposal",
            hash = %hash,
            from = from.as_str(),
            to = to.as_str(),
            height,
            "Proposal status changed"
        );
    }

    /// Seals the records appended at `height`.
    pub fn commit(&mut self, height: u32) -> Result<(), HistoryError> {
        self.history.commit(height)
    }

    /// Reverts every record newer than `height`.
    pub fn rollback_to(&mut self, height: u32) -> Result<usize, HistoryError> {
        self.history.rollback_to(&mut self.state, height)
    }

    /// Fails if `height` is below the retained window.
    pub fn ensure_reachable(&self, height: u32) -> Result<(), HistoryError> {
        self.history.ensure_reachable(height)
    }

    /// Replaces the whole state and restarts the log at `height`.
    pub fn restore(&mut self, state: ProposalKeyFrame, height: u32) {
        self.state = state;
        self.history.rollback_seek_to(height);
    }

    /// The current key frame.
    pub fn state(&self) -> &ProposalKeyFrame {
        &self.state
    }

    // --- Transactions ---

    /// Registers a proposal sponsored by a council member.
    ///
    /// A member may sponsor at most `max_committee_proposal_count` proposals
    /// per session.
    pub fn register_proposal(
        &mut self,
        proposal: &CrcProposal,
        tx_hash: Hash256,
        height: u32,
    ) -> Result<Hash256, GovernanceError> {
        let hash = proposal.hash();
        if self.state.proposals.contains_key(&hash) {
            return Err(GovernanceError::DuplicateTransaction(format!(
                "proposal {} is already registered",
                hash
            )));
        }
        let did = proposal.cr_council_member_did;
        let cap = self.params.max_committee_proposal_count;
        if self.session_proposal_count(&did) >= cap as usize {
            return Err(GovernanceError::ProposalCapExceeded {
                did: did.to_string(),
                cap,
            });
        }

        self.put_proposal(height, hash, ProposalState::new(proposal.clone(), tx_hash, height));
        let change = SetChange::insert(&self.state.session_index, (did, hash));
        self.record(height, ProposalChange::SessionIndex(change));
        proposal_metrics().inc_status_transition(ProposalStatus::Registered.as_str());
        tracing::info!(target: "proposal", hash = %hash, sponsor = %did, height, "Proposal registered");
        Ok(hash)
    }

    /// Records a council member's opinion on a proposal under council review.
    pub fn review(&mut self, review: &CrcProposalReview, height: u32) -> Result<(), GovernanceError> {
        let mut proposal = self.get(&review.proposal_hash)?;
        if proposal.status != ProposalStatus::Registered {
            return Err(GovernanceError::InvalidState(format!(
                "proposal {} is {}, not under review",
                review.proposal_hash,
                proposal.status.as_str()
            )));
        }
        proposal.cr_votes.insert(review.did, review.vote_result);
        self.put_proposal(height, review.proposal_hash, proposal);
        Ok(())
    }

    /// Applies a tracking record to a VoterAgreed proposal.
    ///
    /// Returns the budget released by closing stages (terminate or finalize).
    pub fn tracking(&mut self, tracking: &CrcProposalTracking, height: u32) -> Result<Fixed64, GovernanceError> {
        let hash = tracking.proposal_hash;
        let mut proposal = self.get(&hash)?;
        if proposal.status != ProposalStatus::VoterAgreed {
            return Err(GovernanceError::InvalidState(format!(
                "proposal {} is {}, tracking needs VoterAgreed",
                hash,
                proposal.status.as_str()
            )));
        }

        let mut released = Fixed64::ZERO;
        let mut next_status = proposal.status;
        match &tracking.tracking {
            TrackingType::Common => {}
            TrackingType::Progress { stage } => match proposal.stage_status(*stage) {
                Some(BudgetStatus::Unfinished | BudgetStatus::Rejected) => {
                    proposal.release_stage(*stage);
                    proposal.current_stage = *stage;
                }
                other => return Err(stage_error(&hash, *stage, other)),
            },
            TrackingType::Rejected { stage } => match proposal.stage_status(*stage) {
                Some(BudgetStatus::Unfinished | BudgetStatus::Withdrawable) => {
                    proposal.budgets_status.insert(*stage, BudgetStatus::Rejected);
                    proposal.withdrawable_budgets.remove(stage);
                }
                other => return Err(stage_error(&hash, *stage, other)),
            },
            TrackingType::Terminated => {
                released = proposal.close_unpaid_stages();
                proposal.terminated_height = height;
                next_status = ProposalStatus::Terminated;
            }
            TrackingType::ChangeOwner {
                new_owner_public_key,
                new_recipient,
            } => {
                proposal.proposal_owner = new_owner_public_key.clone();
                proposal.recipient = *new_recipient;
            }
            TrackingType::Finalized => {
                let finals: Vec<u8> = proposal
                    .proposal
                    .budgets
                    .iter()
                    .filter(|b| b.budget_type == BudgetType::FinalPayment)
                    .map(|b| b.stage)
                    .collect();
                for stage in finals {
                    if matches!(
                        proposal.stage_status(stage),
                        Some(BudgetStatus::Unfinished | BudgetStatus::Rejected)
                    ) {
                        proposal.release_stage(stage);
                    }
                }
                released = proposal.close_unpaid_stages();
                next_status = ProposalStatus::Finished;
            }
        }
        proposal.tracking_count = proposal.tracking_count.saturating_add(1);

        if next_status == proposal.status {
            self.put_proposal(height, hash, proposal);
        } else {
            self.transition(height, hash, proposal, next_status);
        }
        Ok(released)
    }

    /// Pays out every Withdrawable stage of a proposal and returns the amount paid.
    ///
    /// Withdrawal is allowed in any status, so stages released before a
    /// proposal was terminated or aborted can still be collected.
    pub fn withdraw(&mut self, withdraw: &CrcProposalWithdraw, height: u32) -> Result<Fixed64, GovernanceError> {
        let hash = withdraw.proposal_hash;
        let mut proposal = self.get(&hash)?;
        let stages: Vec<u8> = proposal
            .budgets_status
            .iter()
            .filter(|(_, s)| **s == BudgetStatus::Withdrawable)
            .map(|(stage, _)| *stage)
            .collect();
        if stages.is_empty() {
            return Err(GovernanceError::InvalidState(format!(
                "proposal {} has no withdrawable stage",
                hash
            )));
        }

        let mut paid = Fixed64::ZERO;
        for stage in &stages {
            let budget = proposal.budget(*stage).map(|b| b.amount).unwrap_or_default();
            let amount = proposal
                .withdrawable_budgets
                .remove(stage)
                .unwrap_or(budget)
                .min(budget);
            proposal.withdrawn_budgets.insert(*stage, amount);
            proposal.budgets_status.insert(*stage, BudgetStatus::Withdrawn);
            paid += amount;
        }

        let only_final_left = {
            let mut unpaid = proposal
                .proposal
                .budgets
                .iter()
                .filter(|b| proposal.stage_status(b.stage) != Some(BudgetStatus::Withdrawn));
            matches!(
                (unpaid.next(), unpaid.next()),
                (Some(last), None) if last.budget_type == BudgetType::FinalPayment
            )
        };
        if only_final_left {
            proposal.final_payment_status = true;
        }

        self.put_proposal(height, hash, proposal);
        proposal_metrics().inc_budget_withdrawals(stages.len() as u64);
        log::debug!("[Proposal] Withdrew {} from {} ({} stages)", paid, hash, stages.len());
        Ok(paid)
    }

    // --- Public reject votes ---

    /// Credits reject votes carried by the output at `outpoint` to CrAgreed proposals.
    pub fn process_reject_votes(&mut self, outpoint: OutPoint, votes: &[ProposalVotes], height: u32) {
        let mut credited = Vec::new();
        for vote in votes {
            let Some(mut proposal) = self.state.proposals.get(&vote.proposal_hash).cloned() else {
                continue;
            };
            if proposal.status != ProposalStatus::CrAgreed {
                continue;
            }
            proposal.voters_reject_amount += vote.votes;
            self.put_proposal(height, vote.proposal_hash, proposal);
            credited.push(vote.clone());
        }
        if !credited.is_empty() {
            let change = MapChange::insert(&self.state.reject_votes, outpoint, credited);
            self.record(height, ProposalChange::RejectVotes(change));
        }
    }

    /// Subtracts the reject votes credited for `outpoint` from proposals still in public vote.
    pub fn cancel_reject_votes(&mut self, outpoint: &OutPoint, height: u32) {
        let Some(credited) = self.state.reject_votes.get(outpoint).cloned() else {
            return;
        };
        for vote in &credited {
            if let Some(mut proposal) = self.state.proposals.get(&vote.proposal_hash).cloned() {
                if proposal.status == ProposalStatus::CrAgreed {
                    proposal.voters_reject_amount -= vote.votes;
                    self.put_proposal(height, vote.proposal_hash, proposal);
                }
            }
        }
        let change = MapChange::remove(&self.state.reject_votes, *outpoint);
        self.record(height, ProposalChange::RejectVotes(change));
    }

    // --- Per-block transitions ---

    /// Closes the council review and public vote windows that end at `height`.
    ///
    /// Outside an election period every proposal whose window closes is
    /// aborted instead.
    pub fn update_proposals(&mut self, height: u32, circulation: Fixed64, in_election_period: bool) -> ProposalUpdate {
        let cr_period = self.params.proposal_cr_voting_period;
        let public_period = self.params.proposal_public_voting_period;
        let due: Vec<(Hash256, ProposalState)> = self
            .state
            .proposals
            .iter()
            .filter(|(_, p)| match p.status {
                ProposalStatus::Registered => height.saturating_sub(p.register_height) >= cr_period,
                ProposalStatus::CrAgreed => height.saturating_sub(p.vote_start_height) >= public_period,
                _ => false,
            })
            .map(|(h, p)| (*h, p.clone()))
            .collect();

        let mut update = ProposalUpdate::default();
        for (hash, proposal) in due {
            let to = if !in_election_period {
                ProposalStatus::Aborted
            } else if proposal.status == ProposalStatus::Registered {
                self.council_verdict(&proposal)
            } else {
                self.public_verdict(&proposal, circulation)
            };
            self.close_window(height, hash, proposal, to, &mut update);
        }
        update
    }

    fn council_verdict(&self, proposal: &ProposalState) -> ProposalStatus {
        if proposal.approvals() >= self.params.cr_agreement_count as usize {
            ProposalStatus::CrAgreed
        } else {
            ProposalStatus::CrCanceled
        }
    }

    fn public_verdict(&self, proposal: &ProposalState, circulation: Fixed64) -> ProposalStatus {
        let threshold = circulation.percent(self.params.voter_reject_percentage);
        if proposal.voters_reject_amount >= threshold {
            ProposalStatus::VoterCanceled
        } else if proposal.proposal.kind.proposal_type().is_budgeted() {
            ProposalStatus::VoterAgreed
        } else {
            ProposalStatus::Finished
        }
    }

    fn close_window(
        &mut self,
        height: u32,
        hash: Hash256,
        mut proposal: ProposalState,
        to: ProposalStatus,
        update: &mut ProposalUpdate,
    ) {
        match to {
            ProposalStatus::CrAgreed => {
                proposal.vote_start_height = height;
                proposal.release_imprest();
            }
            ProposalStatus::Finished => {
                self.deal_proposal(height, &proposal, update);
                update.released += proposal.close_unpaid_stages();
            }
            status if status.is_terminal() => {
                update.released += proposal.close_unpaid_stages();
            }
            _ => {}
        }

        let proposal_type = proposal.proposal.kind.proposal_type();
        if to.is_terminal() && proposal_type.reports_outcome() {
            update.outcomes.push(ProposalOutcome {
                hash,
                proposal_type,
                status: to,
                passed: to == ProposalStatus::Finished,
            });
        }
        update.transitions += 1;
        self.transition(height, hash, proposal, to);
    }

    /// Applies the effect of a passed non-budgeted proposal.
    fn deal_proposal(&mut self, height: u32, proposal: &ProposalState, update: &mut ProposalUpdate) {
        match &proposal.proposal.kind {
            ProposalKind::Normal | ProposalKind::Elip => {}
            ProposalKind::ChangeProposalOwner {
                target,
                new_owner_public_key,
                new_recipient,
            } => {
                if let Some(mut t) = self.state.proposals.get(target).cloned() {
                    if !t.status.is_terminal() {
                        t.proposal_owner = new_owner_public_key.clone();
                        t.recipient = *new_recipient;
                        self.put_proposal(height, *target, t);
                    }
                }
            }
            ProposalKind::SecretaryGeneral { public_key, did } => {
                self.update_settings(height, |s| {
                    s.secretary_general_public_key = public_key.clone();
                    s.secretary_general_did = *did;
                });
            }
            ProposalKind::CloseProposal { target } => {
                if let Some(mut t) = self.state.proposals.get(target).cloned() {
                    if t.status == ProposalStatus::VoterAgreed {
                        update.released += t.close_unpaid_stages();
                        t.terminated_height = height;
                        update.transitions += 1;
                        self.transition(height, *target, t, ProposalStatus::Terminated);
                    }
                }
            }
            ProposalKind::ReserveCustomId { ids } => {
                for id in ids {
                    let change = SetChange::insert(&self.state.reserved_custom_ids, id.clone());
                    self.record(height, ProposalChange::ReservedId(change));
                }
            }
            ProposalKind::ReceiveCustomId { ids, receiver_did } => {
                for id in ids {
                    let change = MapChange::insert(&self.state.received_custom_ids, id.clone(), *receiver_did);
                    self.record(height, ProposalChange::ReceivedId(change));
                }
            }
            ProposalKind::ChangeCustomIdFee {
                rate,
                effective_height,
            } => {
                self.update_settings(height, |s| {
                    s.custom_id_fee_rate = *rate;
                    s.custom_id_fee_effective_height = *effective_height;
                });
            }
            ProposalKind::RegisterSideChain(info) => {
                let change = MapChange::insert(&self.state.side_chains, info.side_chain_name.clone(), info.clone());
                self.record(height, ProposalChange::SideChain(change));
            }
            ProposalKind::UpgradeCode { chain, info } => {
                let change = MapChange::insert(&self.state.upgrade_codes, chain.clone(), info.clone());
                self.record(height, ProposalChange::UpgradeCode(change));
            }
        }
    }

    /// Forgets which proposals were registered in the ending session.
    pub fn reset_session(&mut self, height: u32) {
        let entries: Vec<(ProgramHash, Hash256)> = self.state.session_index.iter().copied().collect();
        for entry in entries {
            let change = SetChange::remove(&self.state.session_index, entry);
            self.record(height, ProposalChange::SessionIndex(change));
        }
    }

    // --- Queries ---

    fn get(&self, hash: &Hash256) -> Result<ProposalState, GovernanceError> {
        self.state
            .proposals
            .get(hash)
            .cloned()
            .required(GovernanceError::ProposalNotFound(hash.to_string()))
    }

    pub fn proposal(&self, hash: &Hash256) -> Option<&ProposalState> {
        self.state.proposals.get(hash)
    }

    /// Proposals currently in `status`, ordered by hash.
    pub fn proposals_with_status(&self, status: ProposalStatus) -> Vec<(Hash256, ProposalState)> {
        self.state
            .proposals
            .iter()
            .filter(|(_, p)| p.status == status)
            .map(|(h, p)| (*h, p.clone()))
            .collect()
    }

    /// Proposals sponsored by `did` in the current session.
    pub fn session_proposal_count(&self, did: &ProgramHash) -> usize {
        self.state
            .session_index
            .range((*did, Hash256::default())..)
            .take_while(|(d, _)| d == did)
            .count()
    }

    /// `(reviewed, registered)` counts of this session's proposals for `did`.
    pub fn session_review_rate(&self, did: &ProgramHash) -> (usize, usize) {
        let total = self.state.session_index.len();
        let reviewed = self
            .state
            .session_index
            .iter()
            .filter_map(|(_, hash)| self.state.proposals.get(hash))
            .filter(|p| p.cr_votes.contains_key(did))
            .count();
        (reviewed, total)
    }

    pub fn settings(&self) -> &ProposalSettings {
        &self.state.settings
    }

    pub fn is_custom_id_reserved(&self, id: &str) -> bool {
        self.state.reserved_custom_ids.contains(id)
    }

    pub fn custom_id_receiver(&self, id: &str) -> Option<ProgramHash> {
        self.state.received_custom_ids.get(id).copied()
    }

    pub fn side_chain(&self, name: &str) -> Option<&SideChainInfo> {
        self.state.side_chains.get(name)
    }

    pub fn upgrade_code(&self, chain: &str) -> Option<&UpgradeCodeInfo> {
        self.state.upgrade_codes.get(chain)
    }
}

fn stage_error(hash: &Hash256, stage: u8, status: Option<BudgetStatus>) -> GovernanceError {
    match status {
        Some(s) => GovernanceError::InvalidState(format!("stage {} of {} is {:?}", stage, hash, s)),
        None => GovernanceError::Invalid(format!("proposal {} has no stage {}", hash, stage)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crgov_types::app::{Budget, VoteResult};

    const CR: u32 = 10;
    const PUBLIC: u32 = 10;

    fn manager() -> ProposalManager {
        let params = CommitteeParams {
            proposal_cr_voting_period: CR,
            proposal_public_voting_period: PUBLIC,
            cr_agreement_count: 2,
            max_committee_proposal_count: 2,
            ..CommitteeParams::default()
        };
        ProposalManager::new(Arc::new(params))
    }

    fn did(seed: u8) -> ProgramHash {
        ProgramHash([seed; 21])
    }

    fn budget(budget_type: BudgetType, stage: u8, amount: i64) -> Budget {
        Budget {
            budget_type,
            stage,
            amount: Fixed64(amount),
        }
    }

    fn normal(sponsor: u8, draft: u8) -> CrcProposal {
        CrcProposal {
            kind: ProposalKind::Normal,
            category_data: String::new(),
            owner_public_key: vec![2; 33],
            draft_hash: Hash256([draft; 32]),
            budgets: vec![
                budget(BudgetType::Imprest, 0, 100),
                budget(BudgetType::NormalPayment, 1, 200),
                budget(BudgetType::FinalPayment, 2, 300),
            ],
            recipient: did(0x33),
            cr_council_member_did: did(sponsor),
        }
    }

    fn approve(m: &mut ProposalManager, hash: Hash256, voters: &[u8], height: u32) {
        for v in voters {
            m.review(
                &CrcProposalReview {
                    proposal_hash: hash,
                    vote_result: VoteResult::Approve,
                    did: did(*v),
                    opinion_hash: Hash256::default(),
                },
                height,
            )
            .unwrap();
        }
    }

    fn track(m: &mut ProposalManager, hash: Hash256, tracking: TrackingType, height: u32) -> Result<Fixed64, GovernanceError> {
        m.tracking(
            &CrcProposalTracking {
                proposal_hash: hash,
                tracking,
                message_hash: Hash256::default(),
            },
            height,
        )
    }

    fn withdraw(m: &mut ProposalManager, hash: Hash256, height: u32) -> Result<Fixed64, GovernanceError> {
        m.withdraw(
            &CrcProposalWithdraw {
                proposal_hash: hash,
                owner_public_key: vec![2; 33],
                recipient: did(0x33),
                amount: Fixed64::ZERO,
            },
            height,
        )
    }

    /// Registers at 100 and drives the proposal to VoterAgreed at 120.
    fn voter_agreed(m: &mut ProposalManager) -> Hash256 {
        let hash = m.register_proposal(&normal(1, 1), Hash256([1; 32]), 100).unwrap();
        approve(m, hash, &[1, 2], 101);
        m.update_proposals(110, Fixed64(1_000), true);
        m.update_proposals(120, Fixed64(1_000), true);
        assert_eq!(m.proposal(&hash).unwrap().status, ProposalStatus::VoterAgreed);
        hash
    }

    #[test]
    fn budgeted_proposal_happy_path() {
        let mut m = manager();
        let hash = voter_agreed(&mut m);
        // Imprest became withdrawable when the council agreed.
        assert_eq!(withdraw(&mut m, hash, 121).unwrap(), Fixed64(100));
        assert!(withdraw(&mut m, hash, 122).is_err());

        track(&mut m, hash, TrackingType::Progress { stage: 1 }, 130).unwrap();
        assert_eq!(withdraw(&mut m, hash, 131).unwrap(), Fixed64(200));
        assert!(m.proposal(&hash).unwrap().final_payment_status);

        let released = track(&mut m, hash, TrackingType::Finalized, 140).unwrap();
        assert_eq!(released, Fixed64::ZERO);
        let p = m.proposal(&hash).unwrap();
        assert_eq!(p.status, ProposalStatus::Finished);
        assert_eq!(p.tracking_count, 2);
        assert_eq!(withdraw(&mut m, hash, 141).unwrap(), Fixed64(300));
        assert_eq!(m.proposal(&hash).unwrap().withdrawn_total(), Fixed64(600));
    }

    #[test]
    fn council_rejection_and_public_rejection() {
        let mut m = manager();
        let lonely = m.register_proposal(&normal(1, 1), Hash256([1; 32]), 100).unwrap();
        approve(&mut m, lonely, &[1], 101);
        let rejected = m.register_proposal(&normal(2, 2), Hash256([2; 32]), 100).unwrap();
        approve(&mut m, rejected, &[1, 2], 101);

        let update = m.update_proposals(110, Fixed64(1_000), true);
        assert_eq!(update.transitions, 2);
        assert_eq!(update.released, Fixed64(600));
        assert_eq!(m.proposal(&lonely).unwrap().status, ProposalStatus::CrCanceled);

        let op = OutPoint::new(Hash256([9; 32]), 0);
        m.process_reject_votes(op, &[ProposalVotes { proposal_hash: rejected, votes: Fixed64(100) }], 111);
        assert_eq!(m.proposal(&rejected).unwrap().voters_reject_amount, Fixed64(100));

        let update = m.update_proposals(120, Fixed64(1_000), true);
        assert_eq!(m.proposal(&rejected).unwrap().status, ProposalStatus::VoterCanceled);
        // Imprest was released to Withdrawable at CrAgreed and is not reclaimed.
        assert_eq!(update.released, Fixed64(500));
        assert_eq!(
            m.proposal(&rejected).unwrap().stage_status(0),
            Some(BudgetStatus::Withdrawable)
        );
    }

    #[test]
    fn reject_vote_cancel_only_applies_during_public_vote() {
        let mut m = manager();
        let hash = m.register_proposal(&normal(1, 1), Hash256([1; 32]), 100).unwrap();
        approve(&mut m, hash, &[1, 2], 101);
        m.update_proposals(110, Fixed64(1_000_000), true);

        let op = OutPoint::new(Hash256([9; 32]), 0);
        m.process_reject_votes(op, &[ProposalVotes { proposal_hash: hash, votes: Fixed64(5) }], 111);
        m.update_proposals(120, Fixed64(1_000_000), true);
        m.cancel_reject_votes(&op, 121);
        assert_eq!(m.proposal(&hash).unwrap().voters_reject_amount, Fixed64(5));
        assert!(m.state().reject_votes.is_empty());
    }

    #[test]
    fn windows_abort_outside_election_period() {
        let mut m = manager();
        let hash = m.register_proposal(&normal(1, 1), Hash256([1; 32]), 100).unwrap();
        approve(&mut m, hash, &[1, 2], 101);
        let update = m.update_proposals(110, Fixed64(1_000), false);
        assert_eq!(m.proposal(&hash).unwrap().status, ProposalStatus::Aborted);
        assert_eq!(update.released, Fixed64(600));
    }

    #[test]
    fn proposal_cap_is_per_session() {
        let mut m = manager();
        m.register_proposal(&normal(1, 1), Hash256([1; 32]), 100).unwrap();
        m.register_proposal(&normal(1, 2), Hash256([2; 32]), 100).unwrap();
        assert!(matches!(
            m.register_proposal(&normal(1, 3), Hash256([3; 32]), 100),
            Err(GovernanceError::ProposalCapExceeded { cap: 2, .. })
        ));
        m.register_proposal(&normal(2, 3), Hash256([3; 32]), 100).unwrap();
        assert!(matches!(
            m.register_proposal(&normal(2, 3), Hash256([3; 32]), 100),
            Err(GovernanceError::DuplicateTransaction(_))
        ));

        m.reset_session(200);
        assert_eq!(m.session_proposal_count(&did(1)), 0);
        m.register_proposal(&normal(1, 3), Hash256([4; 32]), 200).unwrap();
    }

    #[test]
    fn rejected_stage_can_be_progressed_again_and_termination_closes_the_rest() {
        let mut m = manager();
        let hash = voter_agreed(&mut m);
        track(&mut m, hash, TrackingType::Rejected { stage: 1 }, 125).unwrap();
        assert_eq!(m.proposal(&hash).unwrap().stage_status(1), Some(BudgetStatus::Rejected));
        assert!(track(&mut m, hash, TrackingType::Rejected { stage: 1 }, 126).is_err());
        assert!(track(&mut m, hash, TrackingType::Progress { stage: 9 }, 126).is_err());

        let released = track(&mut m, hash, TrackingType::Terminated, 130).unwrap();
        assert_eq!(released, Fixed64(500));
        let p = m.proposal(&hash).unwrap();
        assert_eq!(p.status, ProposalStatus::Terminated);
        assert_eq!(p.terminated_height, 130);
        // The imprest is still collectable after termination.
        assert_eq!(withdraw(&mut m, hash, 131).unwrap(), Fixed64(100));
    }

    #[test]
    fn non_budgeted_kinds_take_effect_and_report_outcomes() {
        let mut m = manager();
        let mut reserve = normal(1, 7);
        reserve.kind = ProposalKind::ReserveCustomId {
            ids: vec!["elastos".into()],
        };
        reserve.budgets.clear();
        let mut secretary = normal(2, 8);
        secretary.kind = ProposalKind::SecretaryGeneral {
            public_key: vec![5; 33],
            did: did(0x55),
        };
        secretary.budgets.clear();

        let r = m.register_proposal(&reserve, Hash256([1; 32]), 100).unwrap();
        let s = m.register_proposal(&secretary, Hash256([2; 32]), 100).unwrap();
        approve(&mut m, r, &[1, 2], 101);
        approve(&mut m, s, &[1, 2], 101);
        m.update_proposals(110, Fixed64(1_000), true);
        let update = m.update_proposals(120, Fixed64(1_000), true);

        assert_eq!(
            update.outcomes,
            vec![ProposalOutcome {
                hash: r,
                proposal_type: ProposalType::ReserveCustomId,
                status: ProposalStatus::Finished,
                passed: true,
            }]
        );
        assert!(m.is_custom_id_reserved("elastos"));
        assert_eq!(m.settings().secretary_general_did, did(0x55));
    }

    #[test]
    fn close_proposal_terminates_its_target() {
        let mut m = manager();
        let target = voter_agreed(&mut m);
        let mut close = normal(2, 9);
        close.kind = ProposalKind::CloseProposal { target };
        close.budgets.clear();
        let c = m.register_proposal(&close, Hash256([5; 32]), 130).unwrap();
        approve(&mut m, c, &[1, 2], 131);
        m.update_proposals(140, Fixed64(1_000), true);
        let update = m.update_proposals(150, Fixed64(1_000), true);

        assert_eq!(m.proposal(&c).unwrap().status, ProposalStatus::Finished);
        assert_eq!(m.proposal(&target).unwrap().status, ProposalStatus::Terminated);
        assert_eq!(update.released, Fixed64(500));
    }

    #[test]
    fn rollback_restores_reviews_and_statuses() {
        let mut m = manager();
        let hash = m.register_proposal(&normal(1, 1), Hash256([1; 32]), 100).unwrap();
        m.commit(100).unwrap();
        let before = m.state().clone();
        approve(&mut m, hash, &[1, 2], 101);
        m.commit(101).unwrap();
        m.update_proposals(110, Fixed64(1_000), true);
        m.commit(110).unwrap();

        m.rollback_to(100).unwrap();
        assert_eq!(m.state(), &before);
    }
}
