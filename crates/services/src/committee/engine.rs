// Path: crates/services/src/committee/engine.rs
//! The per-block state machine that [`super::Committee`] guards with its lock.

use super::appropriation::AppropriationRequest;
use super::keyframe::{CommitteeChange, CommitteeCounters, KeyFrame};
use super::penalty::{member_penalty, PenaltyInput};
use super::{period, BlockOutcome};
use crate::checkpoint::Checkpoint;
use crate::proposal::ProposalManager;
use crate::registry::CandidateRegistry;
use crgov_state::prelude::*;
use crgov_telemetry::{committee_metrics, error_metrics};
use crgov_types::app::{
    Block, Candidate, CandidateVotes, CrCouncilMemberClaimNode, CrMember, MemberState, Payload,
    Transaction, VoteContent,
};
use crgov_types::config::CommitteeParams;
use crgov_types::error::{CommitteeError, GovernanceError};
use crgov_types::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;

#[derive(Debug)]
pub(crate) struct CommitteeEngine {
    params: Arc<CommitteeParams>,
    key_frame: KeyFrame,
    /// Treasury balances and outputs; sealed at the start of every block.
    first_stage: History<CommitteeChange>,
    history: History<CommitteeChange>,
    pub(crate) registry: CandidateRegistry,
    pub(crate) proposals: ProposalManager,
}

impl CommitteeEngine {
    pub(crate) fn new(params: Arc<CommitteeParams>) -> Self {
        Self {
            first_stage: History::new(params.history_capacity),
            history: History::new(params.history_capacity),
            registry: CandidateRegistry::new(Arc::clone(&params)),
            proposals: ProposalManager::new(Arc::clone(&params)),
            key_frame: KeyFrame::default(),
            params,
        }
    }

    // --- Ledger plumbing ---

    fn record(&mut self, height: u32, change: CommitteeChange) {
        self.history.append(&mut self.key_frame, height, change);
    }

    fn record_first_stage(&mut self, height: u32, change: CommitteeChange) {
        self.first_stage.append(&mut self.key_frame, height, change);
    }

    fn update_counters(&mut self, height: u32, f: impl FnOnce(&mut CommitteeCounters)) {
        let mut next = self.key_frame.counters.clone();
        f(&mut next);
        if next != self.key_frame.counters {
            let change = ValueChange::new(&self.key_frame.counters, next);
            self.record(height, CommitteeChange::Counters(change));
        }
    }

    fn put_member(&mut self, height: u32, member: CrMember) {
        let change = MapChange::insert(&self.key_frame.members, member.info.cid, member);
        self.record(height, CommitteeChange::Member(change));
    }

    fn put_history_member(&mut self, height: u32, session: u64, member: CrMember) {
        let key = (session, member.info.cid);
        let change = MapChange::insert(&self.key_frame.history_members, key, member);
        self.record(height, CommitteeChange::HistoryMember(change));
    }

    // --- Block processing ---

    pub(crate) fn process_block(&mut self, block: &Block) -> Result<BlockOutcome, CommitteeError> {
        let height = block.height;
        if let Some(tip) = self.history.tip() {
            let expected = tip.saturating_add(1);
            if height != expected {
                return Err(CommitteeError::UnexpectedHeight {
                    expected,
                    got: height,
                });
            }
        }

        self.process_treasury(block);
        self.first_stage.commit(height)?;

        if let Some(start) = period::next_voting_start(&self.params, &self.key_frame.counters, height) {
            self.update_counters(height, |c| c.last_voting_start_height = start);
        }

        let rejected = self.process_transactions(block);

        self.registry.activate_pending(height);
        self.registry.mature_deposits(height);
        self.reactivate_members(height);

        self.end_election_if_quorum_lost(height);

        let counters = &self.key_frame.counters;
        let update = self.proposals.update_proposals(
            height,
            counters.circulation_amount,
            counters.in_election_period,
        );
        self.release_budget(height, update.released);

        self.update_circulation(height);

        let committee_changed = period::should_change(&self.params, &self.key_frame.counters, height)
            && self.change_committee(height);

        if block
            .transactions
            .iter()
            .any(|tx| matches!(tx.payload, Payload::CrcAppropriation))
        {
            self.record_appropriation(height);
        }

        // Rotation archives candidates through the registry ledger, so all three
        // ledgers are sealed together once the block is fully applied.
        self.registry.commit(height)?;
        self.proposals.commit(height)?;
        self.history.commit(height)?;

        Ok(BlockOutcome {
            height,
            proposal_outcomes: update.outcomes,
            rejected,
            committee_changed,
        })
    }

    fn process_treasury(&mut self, block: &Block) {
        let height = block.height;
        let foundation = self.params.foundation_address;
        let committee = self.params.committee_address;
        let destroy = self.params.destroy_address;
        let mut balances = self.key_frame.balances.clone();

        for tx in &block.transactions {
            for input in &tx.inputs {
                let spent = &input.output;
                if spent.program_hash == foundation {
                    balances.foundation -= spent.value;
                    if self.key_frame.foundation_utxos.contains_key(&input.previous) {
                        let change = MapChange::remove(&self.key_frame.foundation_utxos, input.previous);
                        self.record_first_stage(height, CommitteeChange::FoundationUtxo(change));
                    }
                } else if spent.program_hash == committee {
                    balances.committee -= spent.value;
                    if self.key_frame.committee_utxos.contains_key(&input.previous) {
                        let change = MapChange::remove(&self.key_frame.committee_utxos, input.previous);
                        self.record_first_stage(height, CommitteeChange::CommitteeUtxo(change));
                    }
                }
            }
            for (outpoint, output) in tx.indexed_outputs() {
                if output.program_hash == foundation {
                    balances.foundation += output.value;
                    let change = MapChange::insert(&self.key_frame.foundation_utxos, outpoint, output.clone());
                    self.record_first_stage(height, CommitteeChange::FoundationUtxo(change));
                } else if output.program_hash == committee {
                    balances.committee += output.value;
                    let change = MapChange::insert(&self.key_frame.committee_utxos, outpoint, output.clone());
                    self.record_first_stage(height, CommitteeChange::CommitteeUtxo(change));
                } else if output.program_hash == destroy {
                    balances.destroyed += output.value;
                }
            }
        }

        if balances != self.key_frame.balances {
            let change = ValueChange::new(&self.key_frame.balances, balances);
            self.record_first_stage(height, CommitteeChange::Balances(change));
        }
    }

    /// Applies every transaction of `block`, withdrawals first, and returns the
    /// rejected ones. A rejection leaves the rest of the block unaffected.
    fn process_transactions(&mut self, block: &Block) -> Vec<(Hash256, GovernanceError)> {
        let height = block.height;
        let ordered = block
            .transactions
            .iter()
            .filter(|tx| tx.is_proposal_withdraw())
            .chain(block.transactions.iter().filter(|tx| !tx.is_proposal_withdraw()));

        let mut rejected = Vec::new();
        for tx in ordered {
            if let Err(e) = self.process_transaction(tx, height) {
                committee_metrics().inc_rejected_transactions(tx.payload.name());
                error_metrics().inc_error("governance", e.code());
                tracing::warn!(
                    target: "committee",
                    tx = %tx.hash,
                    payload = tx.payload.name(),
                    error = %e,
                    "Transaction rejected"
                );
                rejected.push((tx.hash, e));
            }
        }
        rejected
    }

    fn process_transaction(&mut self, tx: &Transaction, height: u32) -> Result<(), GovernanceError> {
        self.cancel_spent_votes(tx, height);
        let result = self.process_payload(tx, height);
        self.registry.process_deposit(tx, height);
        self.process_vote_outputs(tx, height);
        result
    }

    fn cancel_spent_votes(&mut self, tx: &Transaction, height: u32) {
        for input in &tx.inputs {
            for content in input.output.vote_contents() {
                match content {
                    VoteContent::Crc(_) => self.registry.cancel_votes(&input.previous, height),
                    VoteContent::CrcProposal(_) => {
                        self.proposals.cancel_reject_votes(&input.previous, height)
                    }
                    VoteContent::CrcImpeachment(_) => {
                        self.cancel_impeachment_votes(&input.previous, height)
                    }
                }
            }
        }
    }

    fn process_vote_outputs(&mut self, tx: &Transaction, height: u32) {
        let voting = self.is_in_voting_period(height);
        for (outpoint, output) in tx.indexed_outputs() {
            for content in output.vote_contents() {
                match content {
                    VoteContent::Crc(votes) if voting => {
                        self.registry.process_votes(outpoint, votes, height)
                    }
                    VoteContent::Crc(_) => {}
                    VoteContent::CrcProposal(votes) => {
                        self.proposals.process_reject_votes(outpoint, votes, height)
                    }
                    VoteContent::CrcImpeachment(votes) => {
                        self.process_impeachment_votes(outpoint, votes, height)
                    }
                }
            }
        }
    }

    fn process_payload(&mut self, tx: &Transaction, height: u32) -> Result<(), GovernanceError> {
        match &tx.payload {
            Payload::CoinBase | Payload::TransferAsset | Payload::CrcAppropriation => Ok(()),
            Payload::RegisterCr(info) => self.registry.register_cr(info, height),
            Payload::UpdateCr(info) => self.registry.update_cr(info, height),
            Payload::UnregisterCr { cid } => self.registry.unregister_cr(cid, height),
            Payload::ReturnCrDepositCoin => {
                let cids = self.registry.return_deposit(tx, height)?;
                self.mark_members_returned(&cids, height);
                Ok(())
            }
            Payload::CrcProposal(proposal) => {
                self.elected_member_by_did(&proposal.cr_council_member_did)?;
                self.proposals.register_proposal(proposal, tx.hash, height)?;
                let budget = proposal.total_budget();
                self.update_counters(height, |c| c.committee_used_amount += budget);
                Ok(())
            }
            Payload::CrcProposalReview(review) => {
                self.elected_member_by_did(&review.did)?;
                self.proposals.review(review, height)
            }
            Payload::CrcProposalTracking(tracking) => {
                let released = self.proposals.tracking(tracking, height)?;
                self.release_budget(height, released);
                Ok(())
            }
            Payload::CrcProposalWithdraw(withdraw) => {
                self.proposals.withdraw(withdraw, height).map(|_| ())
            }
            Payload::CrCouncilMemberClaimNode(claim) => self.claim_node(claim, height),
            Payload::ActivateProducer { node_public_key } => {
                self.request_activation(node_public_key, height);
                Ok(())
            }
            Payload::InactiveArbitrators { arbitrators } => {
                for key in arbitrators {
                    self.mark_inactive(key, height);
                }
                Ok(())
            }
            Payload::IllegalEvidence { offender } => {
                self.mark_illegal(offender, height);
                Ok(())
            }
        }
    }

    fn release_budget(&mut self, height: u32, released: Fixed64) {
        if released.is_positive() {
            self.update_counters(height, |c| {
                c.committee_used_amount = (c.committee_used_amount - released).non_negative()
            });
        }
    }

    fn update_circulation(&mut self, height: u32) {
        let b = &self.key_frame.balances;
        let minted = self.params.reward_per_block.mul_div(i64::from(height), 1);
        let circulation = self.params.genesis_supply + minted - b.foundation - b.committee - b.destroyed;
        self.update_counters(height, |c| c.circulation_amount = circulation);
    }

    fn record_appropriation(&mut self, height: u32) {
        let amount = self.key_frame.balances.committee;
        self.update_counters(height, |c| {
            c.current_stage_amount = amount;
            c.need_appropriation = false;
        });
        tracing::info!(target: "committee", amount = %amount, height, "Appropriation recorded");
    }

    // --- Members ---

    fn elected_member_by_did(&self, did: &ProgramHash) -> Result<&CrMember, GovernanceError> {
        self.key_frame
            .members
            .values()
            .find(|m| m.info.did == *did && m.member_state == MemberState::Elected)
            .required(GovernanceError::MemberNotFound(did.to_string()))
    }

    fn members_with_node_key(&self, key: &[u8]) -> Vec<CrMember> {
        self.key_frame
            .members
            .values()
            .filter(|m| !m.dpos_public_key.is_empty() && m.dpos_public_key == key)
            .cloned()
            .collect()
    }

    fn claim_node(&mut self, claim: &CrCouncilMemberClaimNode, height: u32) -> Result<(), GovernanceError> {
        let mut member = self
            .key_frame
            .members
            .values()
            .find(|m| m.info.did == claim.cr_council_member_did && m.member_state.is_seated())
            .cloned()
            .required(GovernanceError::MemberNotFound(
                claim.cr_council_member_did.to_string(),
            ))?;
        member.dpos_public_key = claim.node_public_key.clone();
        self.put_member(height, member);
        Ok(())
    }

    fn mark_inactive(&mut self, key: &[u8], height: u32) {
        for mut member in self.members_with_node_key(key) {
            if member.member_state == MemberState::Elected {
                member.member_state = MemberState::Inactive;
                member.inactive_since = height;
                member.activate_request_height = None;
                log::info!("[Committee] Member {} inactive at {}", member.info.cid, height);
                self.put_member(height, member);
            }
        }
    }

    fn mark_illegal(&mut self, key: &[u8], height: u32) {
        for mut member in self.members_with_node_key(key) {
            if matches!(member.member_state, MemberState::Elected | MemberState::Inactive) {
                member.member_state = MemberState::Illegal;
                member.inactive_since = height;
                member.activate_request_height = None;
                log::warn!("[Committee] Member {} flagged illegal at {}", member.info.cid, height);
                self.put_member(height, member);
            }
        }
    }

    fn request_activation(&mut self, key: &[u8], height: u32) {
        for mut member in self.members_with_node_key(key) {
            if matches!(member.member_state, MemberState::Inactive | MemberState::Illegal) {
                member.activate_request_height = Some(height);
                self.put_member(height, member);
            }
        }
    }

    fn reactivate_members(&mut self, height: u32) {
        let duration = self.params.activate_duration;
        let ready: Vec<CrMember> = self
            .key_frame
            .members
            .values()
            .filter(|m| {
                matches!(m.member_state, MemberState::Inactive | MemberState::Illegal)
                    && m
                        .activate_request_height
                        .map_or(false, |h| height.saturating_sub(h) >= duration)
            })
            .cloned()
            .collect();
        for mut member in ready {
            member.member_state = MemberState::Elected;
            member.activate_request_height = None;
            member.inactive_since = 0;
            self.put_member(height, member);
        }
    }

    fn mark_members_returned(&mut self, cids: &[ProgramHash], height: u32) {
        for cid in cids {
            let settled = self
                .registry
                .deposit_info(cid)
                .map_or(false, |d| d.refundable && !(d.total_amount - d.penalty).is_positive());
            if !settled {
                continue;
            }
            if let Some(mut member) = self.key_frame.members.get(cid).cloned() {
                if matches!(member.member_state, MemberState::Impeached | MemberState::Terminated) {
                    member.member_state = MemberState::Returned;
                    self.put_member(height, member);
                }
            }
            let archived: Vec<(u64, CrMember)> = self
                .key_frame
                .history_members
                .iter()
                .filter(|((_, c), m)| c == cid && m.member_state != MemberState::Returned)
                .map(|((session, _), m)| (*session, m.clone()))
                .collect();
            for (session, mut member) in archived {
                member.member_state = MemberState::Returned;
                self.put_history_member(height, session, member);
            }
        }
    }

    // --- Impeachment ---

    fn penalty_for(&self, member: &CrMember, height: u32, impeached: bool) -> Fixed64 {
        let (reviewed, proposals) = self.proposals.session_review_rate(&member.info.did);
        let existing = self
            .registry
            .deposit_info(&member.info.cid)
            .map_or(Fixed64::ZERO, |d| d.penalty);
        existing
            + member_penalty(PenaltyInput {
                min_deposit: self.params.min_deposit,
                served_blocks: height.saturating_sub(self.key_frame.counters.last_committee_height),
                duty_period: self.params.cr_duty_period,
                reviewed,
                proposals,
                impeached,
            })
    }

    fn process_impeachment_votes(&mut self, outpoint: OutPoint, votes: &[CandidateVotes], height: u32) {
        let threshold = self
            .key_frame
            .counters
            .circulation_amount
            .percent(self.params.voter_reject_percentage);
        let mut credited = Vec::new();
        for vote in votes {
            let Some(mut member) = self.key_frame.members.get(&vote.cid).cloned() else {
                continue;
            };
            if !member.member_state.is_seated() {
                continue;
            }
            member.impeachment_votes += vote.votes;
            let reached = member.impeachment_votes >= threshold;
            self.put_member(height, member);
            credited.push(vote.clone());
            if reached {
                self.impeach(&vote.cid, height);
            }
        }
        if !credited.is_empty() {
            let change = MapChange::insert(&self.key_frame.impeachment_votes, outpoint, credited);
            self.record(height, CommitteeChange::ImpeachmentVotes(change));
        }
    }

    fn cancel_impeachment_votes(&mut self, outpoint: &OutPoint, height: u32) {
        let Some(credited) = self.key_frame.impeachment_votes.get(outpoint).cloned() else {
            return;
        };
        for vote in &credited {
            if let Some(mut member) = self.key_frame.members.get(&vote.cid).cloned() {
                if member.member_state.is_seated() {
                    member.impeachment_votes -= vote.votes;
                    self.put_member(height, member);
                }
            }
        }
        let change = MapChange::remove(&self.key_frame.impeachment_votes, *outpoint);
        self.record(height, CommitteeChange::ImpeachmentVotes(change));
    }

    /// Removes a seated member from office. The deposit is charged at most once
    /// per seat.
    fn impeach(&mut self, cid: &ProgramHash, height: u32) {
        let Some(mut member) = self.key_frame.members.get(cid).cloned() else {
            return;
        };
        if !member.member_state.is_seated() || member.penalty_applied {
            return;
        }
        let penalty = self.penalty_for(&member, height, true);
        self.registry.settle_member_deposit(cid, penalty, height);
        member.member_state = MemberState::Impeached;
        member.penalty_applied = true;
        tracing::warn!(
            target: "committee",
            cid = %cid,
            votes = %member.impeachment_votes,
            penalty = %penalty,
            height,
            "Council member impeached"
        );
        self.put_member(height, member);
    }

    // --- Election ---

    fn end_election_if_quorum_lost(&mut self, height: u32) {
        if !self.key_frame.counters.in_election_period {
            return;
        }
        let elected = self.elected_count();
        if elected >= self.params.cr_agreement_count as usize {
            return;
        }
        self.update_counters(height, |c| {
            c.in_election_period = false;
            c.last_voting_start_height = height;
        });
        tracing::warn!(target: "committee", elected, height, "Too few elected members; election period ended early");
    }

    /// Rotates membership. Returns false when too few candidates are Active,
    /// in which case the outgoing members are terminated and a new voting
    /// period starts.
    fn change_committee(&mut self, height: u32) -> bool {
        let seats = self.params.cr_member_count as usize;
        let session = self.key_frame.counters.session;
        let ranked = self.registry.ranked_active_candidates();

        if ranked.len() < seats {
            self.retire_members(height, session, true);
            self.update_counters(height, |c| {
                c.in_election_period = false;
                c.last_voting_start_height = height;
            });
            tracing::warn!(
                target: "committee",
                active = ranked.len(),
                seats,
                height,
                "Too few active candidates; election failed"
            );
            return false;
        }

        let elected: Vec<Candidate> = ranked.into_iter().take(seats).collect();
        let elected_cids: BTreeSet<ProgramHash> = elected.iter().map(|c| c.info.cid).collect();
        self.retire_members(height, session, false);
        self.registry.archive_candidates(session, &elected_cids, height);
        for candidate in &elected {
            self.put_member(height, CrMember::from_candidate(candidate));
        }
        self.proposals.reset_session(height);
        self.update_counters(height, |c| {
            c.session += 1;
            c.last_committee_height = height;
            c.in_election_period = true;
            c.need_appropriation = true;
            c.committee_used_amount = Fixed64::ZERO;
        });
        tracing::info!(
            target: "committee",
            session = session + 1,
            members = elected.len(),
            height,
            "New committee seated"
        );
        true
    }

    /// Archives every current member under `session`, settling the deposit of
    /// each seat that has not been charged yet.
    fn retire_members(&mut self, height: u32, session: u64, terminate: bool) {
        let members: Vec<CrMember> = self.key_frame.members.values().cloned().collect();
        for mut member in members {
            let cid = member.info.cid;
            if member.member_state.is_seated() && !member.penalty_applied {
                let penalty = self.penalty_for(&member, height, false);
                self.registry.settle_member_deposit(&cid, penalty, height);
                member.penalty_applied = true;
                if terminate {
                    member.member_state = MemberState::Terminated;
                }
            }
            self.put_history_member(height, session, member);
            let change = MapChange::remove(&self.key_frame.members, cid);
            self.record(height, CommitteeChange::Member(change));
        }
    }

    pub(crate) fn appropriation_request(&self, height: u32) -> Option<AppropriationRequest> {
        if !self.key_frame.counters.need_appropriation {
            return None;
        }
        Some(AppropriationRequest {
            height,
            amount: self
                .key_frame
                .balances
                .foundation
                .percent(self.params.cr_appropriate_percentage),
            foundation_address: self.params.foundation_address,
            committee_address: self.params.committee_address,
            utxos: self
                .key_frame
                .foundation_utxos
                .iter()
                .map(|(op, out)| (*op, out.clone()))
                .collect(),
        })
    }

    // --- Rollback and checkpoints ---

    /// Reverts all four ledgers to `height`, or none of them.
    pub(crate) fn rollback_to(&mut self, height: u32) -> Result<usize, CommitteeError> {
        self.history.ensure_reachable(height)?;
        self.proposals.ensure_reachable(height)?;
        self.registry.ensure_reachable(height)?;
        self.first_stage.ensure_reachable(height)?;

        let mut reverted = self.history.rollback_to(&mut self.key_frame, height)?;
        reverted += self.proposals.rollback_to(height)?;
        reverted += self.registry.rollback_to(height)?;
        reverted += self.first_stage.rollback_to(&mut self.key_frame, height)?;
        Ok(reverted)
    }

    pub(crate) fn snapshot(&self) -> Checkpoint {
        Checkpoint {
            height: self.tip().unwrap_or(0),
            committee: self.key_frame.clone(),
            state: self.registry.state().clone(),
            proposals: self.proposals.state().clone(),
        }
    }

    pub(crate) fn restore(&mut self, checkpoint: Checkpoint) {
        let height = checkpoint.height;
        self.key_frame = checkpoint.committee;
        self.first_stage.rollback_seek_to(height);
        self.history.rollback_seek_to(height);
        self.registry.restore(checkpoint.state, height);
        self.proposals.restore(checkpoint.proposals, height);
    }

    // --- Queries ---

    pub(crate) fn tip(&self) -> Option<u32> {
        self.history.tip()
    }

    pub(crate) fn key_frame(&self) -> &KeyFrame {
        &self.key_frame
    }

    pub(crate) fn elected_count(&self) -> usize {
        self.key_frame
            .members
            .values()
            .filter(|m| m.member_state == MemberState::Elected)
            .count()
    }

    pub(crate) fn is_in_voting_period(&self, height: u32) -> bool {
        period::is_in_voting_period(&self.params, &self.key_frame.counters, height)
    }
}
