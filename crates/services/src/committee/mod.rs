// Path: crates/services/src/committee/mod.rs
//! The CR committee: the per-block driver of the governance engine.
//!
//! [`Committee`] owns the candidate registry, the proposal manager and the
//! council state behind one lock. Every block is applied as a single write
//! critical section; queries take the read side. Side effects that leave the
//! engine (the appropriation transaction) are dispatched only after the lock
//! has been released.

mod appropriation;
mod engine;
mod keyframe;
mod penalty;
mod period;

pub use appropriation::{build_appropriation_tx, AppropriationHook, AppropriationRequest};
pub use keyframe::{CommitteeChange, CommitteeCounters, KeyFrame, TreasuryBalances};
pub use penalty::{member_penalty, PenaltyInput};

use crate::checkpoint::Checkpoint;
use crate::proposal::{ProposalManager, ProposalOutcome, ProposalSettings};
use crate::registry::CandidateRegistry;
use engine::CommitteeEngine;
use crgov_telemetry::{committee_metrics, error_metrics, time::BlockTimer};
use crgov_types::app::{
    Block, Candidate, CandidateState, CrMember, DepositInfo, MemberState, ProposalState,
    ProposalStatus,
};
use crgov_types::config::CommitteeParams;
use crgov_types::error::{CommitteeError, GovernanceError};
use crgov_types::prelude::*;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// What a single block did to the governance state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockOutcome {
    pub height: u32,
    /// Proposals that reached a reportable terminal status in this block.
    pub proposal_outcomes: Vec<ProposalOutcome>,
    /// Transactions whose governance effect was refused. The block itself is
    /// still applied.
    pub rejected: Vec<(Hash256, GovernanceError)>,
    /// True when a new council was seated at this height.
    pub committee_changed: bool,
}

/// The thread-safe committee facade.
#[derive(Debug)]
pub struct Committee {
    params: Arc<CommitteeParams>,
    engine: RwLock<CommitteeEngine>,
    appropriation: Option<AppropriationHook>,
}

impl Committee {
    pub fn new(params: CommitteeParams) -> Self {
        let params = Arc::new(params);
        Self {
            engine: RwLock::new(CommitteeEngine::new(Arc::clone(&params))),
            params,
            appropriation: None,
        }
    }

    /// Attaches the collaborators used to publish appropriation transactions.
    pub fn with_appropriation(mut self, hook: AppropriationHook) -> Self {
        self.appropriation = Some(hook);
        self
    }

    pub fn params(&self) -> &CommitteeParams {
        &self.params
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, CommitteeEngine>, CommitteeError> {
        self.engine.read().map_err(|_| CommitteeError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, CommitteeEngine>, CommitteeError> {
        self.engine.write().map_err(|_| CommitteeError::LockPoisoned)
    }

    fn with_engine<R>(&self, f: impl FnOnce(&CommitteeEngine) -> R) -> Result<R, CommitteeError> {
        let engine = self.read()?;
        Ok(f(&engine))
    }

    /// Applies one block. Blocks must arrive in strictly increasing height
    /// order without gaps.
    pub fn process_block(&self, block: &Block) -> Result<BlockOutcome, CommitteeError> {
        let _timer = BlockTimer::new(committee_metrics());

        let (outcome, request) = {
            let mut engine = self.write()?;
            let outcome = match engine.process_block(block) {
                Ok(outcome) => outcome,
                Err(e) => {
                    error_metrics().inc_error("committee", e.code());
                    tracing::error!(target: "committee", height = block.height, error = %e, "Block processing failed");
                    return Err(e);
                }
            };
            committee_metrics().set_elected_members(engine.elected_count() as u64);
            committee_metrics()
                .set_current_candidates(engine.registry.current_candidate_count() as u64);
            let request = if outcome.committee_changed {
                engine.appropriation_request(block.height)
            } else {
                None
            };
            (outcome, request)
        };
        committee_metrics().inc_blocks_processed();

        if let (Some(hook), Some(request)) = (&self.appropriation, request) {
            hook.dispatch(request);
        }

        tracing::debug!(
            target: "committee",
            height = outcome.height,
            rejected = outcome.rejected.len(),
            outcomes = outcome.proposal_outcomes.len(),
            "Block processed"
        );
        Ok(outcome)
    }

    /// Re-issues the appropriation for the current term if it has not been
    /// recorded yet. Returns false when there is nothing to do.
    pub fn request_appropriation(&self, height: u32) -> Result<bool, CommitteeError> {
        let Some(hook) = &self.appropriation else {
            return Ok(false);
        };
        let request = self.with_engine(|e| e.appropriation_request(height))?;
        match request {
            Some(request) => {
                hook.dispatch(request);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Reverts every ledger to the state right after `height` was applied.
    pub fn rollback_to(&self, height: u32) -> Result<usize, CommitteeError> {
        let reverted = self.write()?.rollback_to(height)?;
        committee_metrics().inc_rollbacks(reverted as u64);
        tracing::info!(target: "committee", height, reverted, "Rolled back");
        Ok(reverted)
    }

    /// A consistent copy of the whole engine state.
    pub fn snapshot(&self) -> Result<Checkpoint, CommitteeError> {
        self.with_engine(CommitteeEngine::snapshot)
    }

    /// Replaces the engine state with `checkpoint`. Undo history older than the
    /// checkpoint is discarded.
    pub fn restore(&self, checkpoint: Checkpoint) -> Result<(), CommitteeError> {
        let height = checkpoint.height;
        self.write()?.restore(checkpoint);
        tracing::info!(target: "committee", height, "Restored from checkpoint");
        Ok(())
    }

    // --- Council queries ---

    pub fn tip(&self) -> Result<Option<u32>, CommitteeError> {
        self.with_engine(CommitteeEngine::tip)
    }

    pub fn members(&self) -> Result<Vec<CrMember>, CommitteeError> {
        self.with_engine(|e| e.key_frame().members.values().cloned().collect())
    }

    pub fn member(&self, cid: &ProgramHash) -> Result<Option<CrMember>, CommitteeError> {
        self.with_engine(|e| e.key_frame().members.get(cid).cloned())
    }

    pub fn member_by_did(&self, did: &ProgramHash) -> Result<Option<CrMember>, CommitteeError> {
        self.with_engine(|e| {
            e.key_frame()
                .members
                .values()
                .find(|m| m.info.did == *did)
                .cloned()
        })
    }

    /// Members archived when session `session` ended.
    pub fn history_members(&self, session: u64) -> Result<Vec<CrMember>, CommitteeError> {
        self.with_engine(|e| {
            e.key_frame()
                .history_members
                .range((session, ProgramHash::default())..)
                .take_while(|((s, _), _)| *s == session)
                .map(|(_, m)| m.clone())
                .collect()
        })
    }

    pub fn members_with_state(&self, state: MemberState) -> Result<Vec<CrMember>, CommitteeError> {
        self.with_engine(|e| {
            e.key_frame()
                .members
                .values()
                .filter(|m| m.member_state == state)
                .cloned()
                .collect()
        })
    }

    pub fn elected_count(&self) -> Result<usize, CommitteeError> {
        self.with_engine(CommitteeEngine::elected_count)
    }

    pub fn is_in_voting_period(&self, height: u32) -> Result<bool, CommitteeError> {
        self.with_engine(|e| e.is_in_voting_period(height))
    }

    pub fn is_in_election_period(&self) -> Result<bool, CommitteeError> {
        self.with_engine(|e| e.key_frame().counters.in_election_period)
    }

    pub fn counters(&self) -> Result<CommitteeCounters, CommitteeError> {
        self.with_engine(|e| e.key_frame().counters.clone())
    }

    pub fn balances(&self) -> Result<TreasuryBalances, CommitteeError> {
        self.with_engine(|e| e.key_frame().balances.clone())
    }

    pub fn circulation(&self) -> Result<Fixed64, CommitteeError> {
        self.with_engine(|e| e.key_frame().counters.circulation_amount)
    }

    /// Budget still assignable to new proposals in the current term.
    pub fn available_budget(&self) -> Result<Fixed64, CommitteeError> {
        self.with_engine(|e| {
            let c = &e.key_frame().counters;
            (c.current_stage_amount - c.committee_used_amount).non_negative()
        })
    }

    // --- Registry queries ---

    fn with_registry<R>(&self, f: impl FnOnce(&CandidateRegistry) -> R) -> Result<R, CommitteeError> {
        self.with_engine(|e| f(&e.registry))
    }

    pub fn candidate(&self, cid: &ProgramHash) -> Result<Option<Candidate>, CommitteeError> {
        self.with_registry(|r| r.candidate(cid).cloned())
    }

    pub fn candidate_by_code(&self, code: &[u8]) -> Result<Option<Candidate>, CommitteeError> {
        self.with_registry(|r| r.candidate_by_code(code).cloned())
    }

    pub fn candidates(&self, states: &[CandidateState]) -> Result<Vec<Candidate>, CommitteeError> {
        self.with_registry(|r| r.candidates(states))
    }

    pub fn history_candidates(&self, session: u64) -> Result<Vec<Candidate>, CommitteeError> {
        self.with_registry(|r| r.history_candidates(session))
    }

    pub fn nickname_exists(&self, nickname: &str) -> Result<bool, CommitteeError> {
        self.with_registry(|r| r.nickname_exists(nickname))
    }

    pub fn deposit_info(&self, cid: &ProgramHash) -> Result<Option<DepositInfo>, CommitteeError> {
        self.with_registry(|r| r.deposit_info(cid).cloned())
    }

    pub fn available_deposit(&self, cid: &ProgramHash) -> Result<Fixed64, CommitteeError> {
        self.with_registry(|r| r.available_deposit(cid))
    }

    pub fn total_deposit(&self) -> Result<Fixed64, CommitteeError> {
        self.with_registry(CandidateRegistry::total_deposit)
    }

    /// A CID whose withdrawable deposit balance went negative, if any.
    pub fn overdrawn_deposit(&self) -> Result<Option<ProgramHash>, CommitteeError> {
        self.with_registry(CandidateRegistry::find_overdrawn_deposit)
    }

    // --- Proposal queries ---

    fn with_proposals<R>(&self, f: impl FnOnce(&ProposalManager) -> R) -> Result<R, CommitteeError> {
        self.with_engine(|e| f(&e.proposals))
    }

    pub fn proposal(&self, hash: &Hash256) -> Result<Option<ProposalState>, CommitteeError> {
        self.with_proposals(|p| p.proposal(hash).cloned())
    }

    pub fn proposals_with_status(
        &self,
        status: ProposalStatus,
    ) -> Result<Vec<(Hash256, ProposalState)>, CommitteeError> {
        self.with_proposals(|p| p.proposals_with_status(status))
    }

    pub fn proposal_settings(&self) -> Result<ProposalSettings, CommitteeError> {
        self.with_proposals(|p| p.settings().clone())
    }

    /// Proposals `did` sponsored in the current council session.
    pub fn session_proposal_count(&self, did: &ProgramHash) -> Result<usize, CommitteeError> {
        self.with_proposals(|p| p.session_proposal_count(did))
    }

    pub fn is_custom_id_reserved(&self, id: &str) -> Result<bool, CommitteeError> {
        self.with_proposals(|p| p.is_custom_id_reserved(id))
    }

    pub fn custom_id_receiver(&self, id: &str) -> Result<Option<ProgramHash>, CommitteeError> {
        self.with_proposals(|p| p.custom_id_receiver(id))
    }
}
