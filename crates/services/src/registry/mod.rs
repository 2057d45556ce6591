// Path: crates/services/src/registry/mod.rs
//! CR candidate registry.
//!
//! Tracks candidate registrations, their deposits and the election votes they
//! receive. Every mutation goes through the registry's own [`History`], so the
//! committee can roll the registry back together with its other ledgers.

mod keyframe;

pub use keyframe::{RegistryChange, StateKeyFrame};

use crgov_state::prelude::*;
use crgov_types::app::{
    Candidate, CandidateState, CandidateVotes, CrInfo, DepositInfo, Transaction,
};
use crgov_types::config::CommitteeParams;
use crgov_types::error::{GovernanceError, HistoryError};
use crgov_types::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Registration, deposit and vote bookkeeping for CR candidates.
#[derive(Debug)]
pub struct CandidateRegistry {
    params: Arc<CommitteeParams>,
    state: StateKeyFrame,
    history: History<RegistryChange>,
}

impl CandidateRegistry {
    pub fn new(params: Arc<CommitteeParams>) -> Self {
        let history = History::new(params.history_capacity);
        Self {
            params,
            state: StateKeyFrame::default(),
            history,
        }
    }

    // --- Ledger plumbing ---

    fn record(&mut self, height: u32, change: RegistryChange) {
        self.history.append(&mut self.state, height, change);
    }

    fn put_candidate(&mut self, height: u32, candidate: Candidate) {
        let change = MapChange::insert(&self.state.candidates, candidate.info.cid, candidate);
        self.record(height, RegistryChange::Candidate(change));
    }

    fn put_history_candidate(&mut self, height: u32, session: u64, candidate: Candidate) {
        let key = (session, candidate.info.cid);
        let change = MapChange::insert(&self.state.history_candidates, key, candidate);
        self.record(height, RegistryChange::HistoryCandidate(change));
    }

    fn update_deposit(&mut self, height: u32, cid: ProgramHash, f: impl FnOnce(&mut DepositInfo)) {
        let mut info = self.state.deposits.get(&cid).cloned().unwrap_or_default();
        f(&mut info);
        let change = MapChange::insert(&self.state.deposits, cid, info);
        if !change.is_noop() {
            self.record(height, RegistryChange::Deposit(change));
        }
    }

    /// Frees the nickname and code held by a candidate that stops being current.
    fn release_identity(&mut self, height: u32, info: &CrInfo) {
        if self.state.nicknames.contains(&info.nickname) {
            let change = SetChange::remove(&self.state.nicknames, info.nickname.clone());
            self.record(height, RegistryChange::Nickname(change));
        }
        if self.state.code_cids.get(&info.code) == Some(&info.cid) {
            let change = MapChange::remove(&self.state.code_cids, info.code.clone());
            self.record(height, RegistryChange::Code(change));
        }
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

    /// Replaces the whole state, e.g. from a checkpoint, and restarts the log at `height`.
    pub fn restore(&mut self, state: StateKeyFrame, height: u32) {
        self.state = state;
        self.history.rollback_seek_to(height);
    }

    /// The current key frame.
    pub fn state(&self) -> &StateKeyFrame {
        &self.state
    }

    // --- Registration ---

    /// Registers a new candidate in the Pending state.
    ///
    /// Collateral is credited separately when the transaction's deposit outputs
    /// are processed; registering only raises the locked amount.
    pub fn register_cr(&mut self, info: &CrInfo, height: u32) -> Result<(), GovernanceError> {
        if self.state.candidates.contains_key(&info.cid) {
            return Err(GovernanceError::DuplicateTransaction(format!(
                "candidate {} is already registered",
                info.cid
            )));
        }
        if self.state.nicknames.contains(&info.nickname) {
            return Err(GovernanceError::Invalid(format!(
                "nickname '{}' is in use",
                info.nickname
            )));
        }
        if self.state.code_cids.contains_key(&info.code) {
            return Err(GovernanceError::Invalid(
                "registration code is in use".into(),
            ));
        }

        let deposit_hash = ProgramHash::deposit_from_code(&info.code);
        self.put_candidate(
            height,
            Candidate {
                info: info.clone(),
                state: CandidateState::Pending,
                votes: Fixed64::ZERO,
                register_height: height,
                cancel_height: 0,
                deposit_hash,
            },
        );
        let change = SetChange::insert(&self.state.nicknames, info.nickname.clone());
        self.record(height, RegistryChange::Nickname(change));
        let change = MapChange::insert(&self.state.code_cids, info.code.clone(), info.cid);
        self.record(height, RegistryChange::Code(change));
        if !self.state.deposit_hashes.contains_key(&deposit_hash) {
            let change = MapChange::insert(&self.state.deposit_hashes, deposit_hash, info.cid);
            self.record(height, RegistryChange::DepositHash(change));
        }

        let min_deposit = self.params.min_deposit;
        self.update_deposit(height, info.cid, |d| {
            d.deposit_amount += min_deposit;
            d.refundable = false;
        });

        tracing::info!(target: "registry", cid = %info.cid, nickname = %info.nickname, height, "Candidate registered");
        Ok(())
    }

    /// Updates the mutable registration fields of a current candidate.
    pub fn update_cr(&mut self, info: &CrInfo, height: u32) -> Result<(), GovernanceError> {
        let current = self
            .state
            .candidates
            .get(&info.cid)
            .cloned()
            .required(GovernanceError::CandidateNotFound(info.cid.to_string()))?;
        if !current.state.is_current() {
            return Err(GovernanceError::InvalidState(format!(
                "candidate {} is {:?}",
                info.cid, current.state
            )));
        }
        let renamed = info.nickname != current.info.nickname;
        if renamed && self.state.nicknames.contains(&info.nickname) {
            return Err(GovernanceError::Invalid(format!(
                "nickname '{}' is in use",
                info.nickname
            )));
        }

        if renamed {
            let change = SetChange::remove(&self.state.nicknames, current.info.nickname.clone());
            self.record(height, RegistryChange::Nickname(change));
            let change = SetChange::insert(&self.state.nicknames, info.nickname.clone());
            self.record(height, RegistryChange::Nickname(change));
        }
        let mut updated = current;
        updated.info.nickname = info.nickname.clone();
        updated.info.url = info.url.clone();
        updated.info.location = info.location;
        self.put_candidate(height, updated);
        Ok(())
    }

    /// Withdraws a current candidacy. Its deposit stays locked until maturation.
    pub fn unregister_cr(&mut self, cid: &ProgramHash, height: u32) -> Result<(), GovernanceError> {
        let current = self
            .state
            .candidates
            .get(cid)
            .cloned()
            .required(GovernanceError::CandidateNotFound(cid.to_string()))?;
        if !current.state.is_current() {
            return Err(GovernanceError::InvalidState(format!(
                "candidate {} is {:?}",
                cid, current.state
            )));
        }
        self.release_identity(height, &current.info);
        let mut canceled = current;
        canceled.state = CandidateState::Canceled;
        canceled.cancel_height = height;
        self.put_candidate(height, canceled);
        tracing::info!(target: "registry", cid = %cid, height, "Candidate canceled");
        Ok(())
    }

    // --- Deposits ---

    /// Credits every output of `tx` paid to a known deposit address.
    ///
    /// Returns true when at least one output was credited.
    pub fn process_deposit(&mut self, tx: &Transaction, height: u32) -> bool {
        let mut credited = false;
        for (outpoint, output) in tx.indexed_outputs() {
            let Some(cid) = self.state.deposit_hashes.get(&output.program_hash).copied() else {
                continue;
            };
            let value = output.value;
            self.update_deposit(height, cid, |d| d.total_amount += value);
            let change = MapChange::insert(&self.state.deposit_outputs, outpoint, value);
            self.record(height, RegistryChange::DepositOutput(change));
            credited = true;
        }
        credited
    }

    /// Applies a deposit-return transaction and returns the CIDs it paid out.
    ///
    /// The amount charged to a CID is the value of the tracked deposit outputs
    /// the transaction spends from that CID's deposit address, less any change
    /// paid back to it. The CIDs themselves are derived from the signing
    /// programs. A refundable deposit may be drained completely: whatever the
    /// return takes beyond the available balance settles the retained penalty.
    /// Anything more is rejected before state is touched.
    pub fn return_deposit(&mut self, tx: &Transaction, height: u32) -> Result<Vec<ProgramHash>, GovernanceError> {
        let mut spent: BTreeMap<ProgramHash, Fixed64> = BTreeMap::new();
        for input in &tx.inputs {
            if let Some(value) = self.state.deposit_outputs.get(&input.previous) {
                *spent.entry(input.output.program_hash).or_default() += *value;
            }
        }
        let mut change: BTreeMap<ProgramHash, Fixed64> = BTreeMap::new();
        for output in &tx.outputs {
            if self.state.deposit_hashes.contains_key(&output.program_hash) {
                *change.entry(output.program_hash).or_default() += output.value;
            }
        }

        let mut charges = Vec::new();
        for program in &tx.programs {
            let deposit_hash = ProgramHash::deposit_from_code(&program.code);
            let Some(cid) = self.state.deposit_hashes.get(&deposit_hash).copied() else {
                continue;
            };
            let amount = spent.remove(&deposit_hash).unwrap_or_default();
            let drawn = amount - change.get(&deposit_hash).copied().unwrap_or_default();
            let deposit = self.state.deposits.get(&cid).cloned().unwrap_or_default();
            let limit = if deposit.refundable {
                deposit.available() + deposit.penalty
            } else {
                deposit.available()
            };
            if drawn > limit.non_negative() {
                return Err(GovernanceError::Invalid(format!(
                    "return of {} from {} exceeds the refundable {}",
                    drawn, cid, limit
                )));
            }
            charges.push((cid, amount, drawn));
        }

        for input in &tx.inputs {
            if self.state.deposit_outputs.contains_key(&input.previous) {
                let removal = MapChange::remove(&self.state.deposit_outputs, input.previous);
                self.record(height, RegistryChange::DepositOutput(removal));
            }
        }

        let mut returned = Vec::new();
        for (cid, amount, drawn) in charges {
            self.update_deposit(height, cid, |d| {
                let settled = (drawn - d.available()).non_negative().min(d.penalty);
                d.penalty -= settled;
                d.total_amount -= amount;
            });
            if self.is_fully_returned(&cid) {
                self.mark_returned(&cid, height);
            }
            log::debug!("[Registry] Returned {} of deposit for {}", drawn, cid);
            returned.push(cid);
        }
        Ok(returned)
    }

    fn is_fully_returned(&self, cid: &ProgramHash) -> bool {
        self.state
            .deposits
            .get(cid)
            .map_or(false, |d| d.refundable && !(d.total_amount - d.penalty).is_positive())
    }

    fn mark_returned(&mut self, cid: &ProgramHash, height: u32) {
        if let Some(mut c) = self.state.candidates.get(cid).cloned() {
            if c.state == CandidateState::Canceled {
                c.state = CandidateState::Returned;
                self.put_candidate(height, c);
            }
        }
        let archived: Vec<(u64, Candidate)> = self
            .state
            .history_candidates
            .iter()
            .filter(|((_, c), cand)| c == cid && cand.state == CandidateState::Canceled)
            .map(|((session, _), cand)| (*session, cand.clone()))
            .collect();
        for (session, mut cand) in archived {
            cand.state = CandidateState::Returned;
            self.put_history_candidate(height, session, cand);
        }
        self.update_deposit(height, *cid, |d| d.deposit_amount = Fixed64::ZERO);
    }

    /// Charges a council member's deposit when the member leaves office or is
    /// impeached: one `min_deposit` is released from the lock and `penalty` is
    /// recorded, capped so the available balance never goes negative.
    ///
    /// The deposit stays locked if the same CID already registered for the
    /// next election.
    pub fn settle_member_deposit(&mut self, cid: &ProgramHash, penalty: Fixed64, height: u32) {
        let min_deposit = self.params.min_deposit;
        self.update_deposit(height, *cid, |d| {
            d.deposit_amount = (d.deposit_amount - min_deposit).non_negative();
            let cap = (d.total_amount - d.deposit_amount).non_negative();
            d.penalty = penalty.non_negative().min(cap);
            d.refundable = !d.deposit_amount.is_positive();
        });
    }

    // --- Votes ---

    /// Credits election votes carried by the output at `outpoint`.
    ///
    /// Only Active candidates receive votes; the credited subset is remembered
    /// so that spending the output later subtracts exactly the same amounts.
    pub fn process_votes(&mut self, outpoint: OutPoint, votes: &[CandidateVotes], height: u32) {
        let mut credited = Vec::new();
        for vote in votes {
            let Some(mut candidate) = self.state.candidates.get(&vote.cid).cloned() else {
                continue;
            };
            if candidate.state != CandidateState::Active {
                continue;
            }
            candidate.votes += vote.votes;
            self.put_candidate(height, candidate);
            credited.push(vote.clone());
        }
        if !credited.is_empty() {
            let change = MapChange::insert(&self.state.crc_votes, outpoint, credited);
            self.record(height, RegistryChange::Votes(change));
        }
    }

    /// Subtracts the votes credited for `outpoint`, if any, as the output is spent.
    pub fn cancel_votes(&mut self, outpoint: &OutPoint, height: u32) {
        let Some(credited) = self.state.crc_votes.get(outpoint).cloned() else {
            return;
        };
        for vote in &credited {
            if let Some(mut candidate) = self.state.candidates.get(&vote.cid).cloned() {
                candidate.votes -= vote.votes;
                self.put_candidate(height, candidate);
            }
        }
        let change = MapChange::remove(&self.state.crc_votes, *outpoint);
        self.record(height, RegistryChange::Votes(change));
    }

    // --- Per-block sweeps ---

    /// Promotes Pending candidates that have waited `activate_duration` blocks.
    pub fn activate_pending(&mut self, height: u32) -> usize {
        let duration = self.params.activate_duration;
        let ready: Vec<Candidate> = self
            .state
            .candidates
            .values()
            .filter(|c| {
                c.state == CandidateState::Pending
                    && height.saturating_sub(c.register_height) >= duration
            })
            .cloned()
            .collect();
        let count = ready.len();
        for mut candidate in ready {
            candidate.state = CandidateState::Active;
            tracing::debug!(target: "registry", cid = %candidate.info.cid, height, "Candidate activated");
            self.put_candidate(height, candidate);
        }
        count
    }

    /// Unlocks the deposits of candidates canceled at least `lockup` blocks ago.
    ///
    /// A CID that currently holds a Pending or Active registration keeps its
    /// lock. Idempotent: an already refundable deposit is left alone.
    pub fn mature_deposits(&mut self, height: u32) -> usize {
        let lockup = self.params.cr_deposit_lockup_blocks;
        let matured: BTreeSet<ProgramHash> = self
            .state
            .candidates
            .values()
            .chain(self.state.history_candidates.values())
            .filter(|c| {
                c.state == CandidateState::Canceled
                    && height.saturating_sub(c.cancel_height) >= lockup
            })
            .map(|c| c.info.cid)
            .collect();

        let mut count = 0;
        for cid in matured {
            let registered = self
                .state
                .candidates
                .get(&cid)
                .map_or(false, |c| c.state.is_current());
            let locked = self.state.deposits.get(&cid).map_or(false, |d| !d.refundable);
            if registered || !locked {
                continue;
            }
            self.update_deposit(height, cid, |d| {
                d.refundable = true;
                d.deposit_amount = Fixed64::ZERO;
            });
            count += 1;
        }
        count
    }

    // --- Election ---

    /// Active candidates ordered by votes (descending), ties broken by CID.
    pub fn ranked_active_candidates(&self) -> Vec<Candidate> {
        let mut ranked: Vec<Candidate> = self
            .state
            .candidates
            .values()
            .filter(|c| c.state == CandidateState::Active)
            .cloned()
            .collect();
        ranked.sort_by(|a, b| b.votes.cmp(&a.votes).then(a.info.cid.cmp(&b.info.cid)));
        ranked
    }

    /// Moves every current candidate into the archive of `session`.
    ///
    /// Candidates not in `elected` that are still Pending or Active are
    /// archived as Canceled at `height`, which starts their deposit lockup.
    pub fn archive_candidates(&mut self, session: u64, elected: &BTreeSet<ProgramHash>, height: u32) {
        let current: Vec<Candidate> = self.state.candidates.values().cloned().collect();
        for candidate in current {
            let cid = candidate.info.cid;
            if candidate.state.is_current() {
                self.release_identity(height, &candidate.info);
            }
            let mut archived = candidate;
            if archived.state.is_current() && !elected.contains(&cid) {
                archived.state = CandidateState::Canceled;
                archived.cancel_height = height;
            }
            self.put_history_candidate(height, session, archived);
            let change = MapChange::remove(&self.state.candidates, cid);
            self.record(height, RegistryChange::Candidate(change));
        }
        tracing::info!(target: "registry", session, elected = elected.len(), "Archived candidates");
    }

    // --- Queries ---

    /// The current candidate registered under `cid`.
    pub fn candidate(&self, cid: &ProgramHash) -> Option<&Candidate> {
        self.state.candidates.get(cid)
    }

    /// The current candidate registered with `code`.
    pub fn candidate_by_code(&self, code: &[u8]) -> Option<&Candidate> {
        self.state
            .code_cids
            .get(code)
            .and_then(|cid| self.state.candidates.get(cid))
    }

    /// True when a current candidate holds `nickname`.
    pub fn nickname_exists(&self, nickname: &str) -> bool {
        self.state.nicknames.contains(nickname)
    }

    /// The CID that pays collateral to `deposit_hash`.
    pub fn cid_by_deposit_hash(&self, deposit_hash: &ProgramHash) -> Option<ProgramHash> {
        self.state.deposit_hashes.get(deposit_hash).copied()
    }

    /// Current candidates in any of `states`, ordered by CID.
    pub fn candidates(&self, states: &[CandidateState]) -> Vec<Candidate> {
        self.state
            .candidates
            .values()
            .filter(|c| states.contains(&c.state))
            .cloned()
            .collect()
    }

    /// Candidates archived under `session`.
    pub fn history_candidates(&self, session: u64) -> Vec<Candidate> {
        self.state
            .history_candidates
            .range((session, ProgramHash::default())..)
            .take_while(|((s, _), _)| *s == session)
            .map(|(_, c)| c.clone())
            .collect()
    }

    /// Number of Pending and Active candidates.
    pub fn current_candidate_count(&self) -> usize {
        self.state
            .candidates
            .values()
            .filter(|c| c.state.is_current())
            .count()
    }

    /// Deposit accounting for `cid`.
    pub fn deposit_info(&self, cid: &ProgramHash) -> Option<&DepositInfo> {
        self.state.deposits.get(cid)
    }

    /// Funds of `cid` that are neither locked nor forfeited.
    pub fn available_deposit(&self, cid: &ProgramHash) -> Fixed64 {
        self.deposit_info(cid)
            .map_or(Fixed64::ZERO, DepositInfo::available)
    }

    /// Sum of all funds held at deposit addresses.
    pub fn total_deposit(&self) -> Fixed64 {
        self.state.deposits.values().map(|d| d.total_amount).sum()
    }

    /// The CID whose deposit accounting violates `total >= deposit + penalty`, if any.
    pub fn find_overdrawn_deposit(&self) -> Option<ProgramHash> {
        self.state
            .deposits
            .iter()
            .find(|(_, d)| d.available() < Fixed64::ZERO)
            .map(|(cid, _)| *cid)
    }
}
