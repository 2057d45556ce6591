// Path: crates/services/tests/common/mod.rs
//! Shared fixtures for the committee end-to-end tests.
#![allow(dead_code)]

use anyhow::{anyhow, Result};
use crgov_services::Committee;
use crgov_types::app::{
    Block, Budget, BudgetType, CandidateVotes, CrInfo, CrcProposal, CrcProposalReview,
    CrcProposalTracking, CrcProposalWithdraw, Output, Payload, Program, ProposalKind,
    ProposalVotes, TrackingType, Transaction, TxInput, VoteContent, VoteOutput, VoteResult,
};
use crgov_types::config::CommitteeParams;
use crgov_types::prelude::*;

pub const FOUNDATION: ProgramHash = ProgramHash([0xF0; 21]);
pub const COMMITTEE: ProgramHash = ProgramHash([0xC0; 21]);
pub const DESTROY: ProgramHash = ProgramHash([0xDD; 21]);
pub const DEPOSIT: i64 = 5_000;

/// A compressed calendar: voting opens at 5, the first council is seated at
/// 20 and serves 40 blocks, with the next vote in the last 10.
pub fn params() -> CommitteeParams {
    CommitteeParams {
        activate_duration: 2,
        cr_member_count: 2,
        cr_agreement_count: 2,
        cr_voting_start_height: 5,
        cr_committee_start_height: 20,
        cr_duty_period: 40,
        cr_voting_period: 10,
        cr_deposit_lockup_blocks: 5,
        proposal_cr_voting_period: 5,
        proposal_public_voting_period: 5,
        voter_reject_percentage: 10,
        cr_appropriate_percentage: 10,
        max_committee_proposal_count: 3,
        min_deposit: Fixed64(DEPOSIT),
        history_capacity: 100,
        genesis_supply: Fixed64(1_000_000),
        reward_per_block: Fixed64(0),
        foundation_address: FOUNDATION,
        committee_address: COMMITTEE,
        destroy_address: DESTROY,
    }
}

pub fn info(seed: u8) -> CrInfo {
    CrInfo::from_code(vec![seed; 35], format!("candidate-{seed}"))
}

pub fn cid(seed: u8) -> ProgramHash {
    info(seed).cid
}

pub fn deposit_hash(seed: u8) -> ProgramHash {
    ProgramHash::deposit_from_code(&info(seed).code)
}

/// Builds blocks and transactions with unique hashes.
#[derive(Debug, Default)]
pub struct Chain {
    nonce: u64,
}

impl Chain {
    pub fn tx(&mut self, payload: Payload) -> Transaction {
        self.nonce += 1;
        Transaction {
            hash: Hash256::digest(&self.nonce.to_le_bytes()),
            payload,
            inputs: vec![],
            outputs: vec![],
            programs: vec![],
        }
    }

    /// Registration paying exactly one minimum deposit to the candidate's
    /// deposit address in output 0.
    pub fn register(&mut self, seed: u8) -> Transaction {
        let mut tx = self.tx(Payload::RegisterCr(info(seed)));
        tx.outputs.push(Output::new(Fixed64(DEPOSIT), deposit_hash(seed)));
        tx
    }

    pub fn unregister(&mut self, seed: u8) -> Transaction {
        self.tx(Payload::UnregisterCr { cid: cid(seed) })
    }

    /// Spends `deposit_output` back to the owner of `seed`.
    pub fn return_deposit(&mut self, seed: u8, deposit_output: OutPoint, value: i64) -> Transaction {
        let mut tx = self.tx(Payload::ReturnCrDepositCoin);
        tx.inputs.push(TxInput {
            previous: deposit_output,
            output: Output::new(Fixed64(value), deposit_hash(seed)),
        });
        tx.outputs.push(Output::new(Fixed64(value), ProgramHash([seed; 21])));
        tx.programs.push(Program {
            code: info(seed).code,
            parameter: vec![],
        });
        tx
    }

    fn vote_tx(&mut self, content: VoteContent) -> Transaction {
        let mut tx = self.tx(Payload::TransferAsset);
        tx.outputs.push(Output {
            value: Fixed64(1),
            program_hash: ProgramHash([0x77; 21]),
            vote: Some(VoteOutput {
                contents: vec![content],
            }),
        });
        tx
    }

    pub fn election_votes(&mut self, votes: &[(u8, i64)]) -> Transaction {
        self.vote_tx(VoteContent::Crc(candidate_votes(votes)))
    }

    pub fn impeachment_votes(&mut self, votes: &[(u8, i64)]) -> Transaction {
        self.vote_tx(VoteContent::CrcImpeachment(candidate_votes(votes)))
    }

    pub fn reject_votes(&mut self, proposal: Hash256, votes: i64) -> Transaction {
        self.vote_tx(VoteContent::CrcProposal(vec![ProposalVotes {
            proposal_hash: proposal,
            votes: Fixed64(votes),
        }]))
    }

    /// Spends the vote output 0 of `vote_tx`, cancelling its votes.
    pub fn spend_votes(&mut self, vote_tx: &Transaction) -> Result<Transaction> {
        let output = vote_tx
            .outputs
            .first()
            .cloned()
            .ok_or_else(|| anyhow!("vote transaction has no outputs"))?;
        let mut tx = self.tx(Payload::TransferAsset);
        tx.inputs.push(TxInput {
            previous: vote_tx.outpoint(0),
            output,
        });
        Ok(tx)
    }

    pub fn review(&mut self, proposal: Hash256, seed: u8, vote_result: VoteResult) -> Transaction {
        self.tx(Payload::CrcProposalReview(CrcProposalReview {
            proposal_hash: proposal,
            vote_result,
            did: info(seed).did,
            opinion_hash: Hash256::default(),
        }))
    }

    pub fn tracking(&mut self, proposal: Hash256, tracking: TrackingType) -> Transaction {
        self.tx(Payload::CrcProposalTracking(CrcProposalTracking {
            proposal_hash: proposal,
            tracking,
            message_hash: Hash256::default(),
        }))
    }

    pub fn withdraw(&mut self, proposal: Hash256) -> Transaction {
        self.tx(Payload::CrcProposalWithdraw(CrcProposalWithdraw {
            proposal_hash: proposal,
            owner_public_key: vec![1; 33],
            recipient: ProgramHash([3; 21]),
            amount: Fixed64::ZERO,
        }))
    }

    pub fn treasury(&mut self, to: ProgramHash, value: i64) -> Transaction {
        let mut tx = self.tx(Payload::TransferAsset);
        tx.outputs.push(Output::new(Fixed64(value), to));
        tx
    }
}

fn candidate_votes(votes: &[(u8, i64)]) -> Vec<CandidateVotes> {
    votes
        .iter()
        .map(|(seed, v)| CandidateVotes {
            cid: cid(*seed),
            votes: Fixed64(*v),
        })
        .collect()
}

/// A five-stage Normal proposal: 100 imprest, three normal payments of 200
/// and a final payment of 300.
pub fn normal_proposal(sponsor: u8, draft: u8) -> CrcProposal {
    let budget = |budget_type, stage, amount| Budget {
        budget_type,
        stage,
        amount: Fixed64(amount),
    };
    CrcProposal {
        kind: ProposalKind::Normal,
        category_data: String::new(),
        owner_public_key: vec![1; 33],
        draft_hash: Hash256([draft; 32]),
        budgets: vec![
            budget(BudgetType::Imprest, 0, 100),
            budget(BudgetType::NormalPayment, 1, 200),
            budget(BudgetType::NormalPayment, 2, 200),
            budget(BudgetType::NormalPayment, 3, 200),
            budget(BudgetType::FinalPayment, 4, 300),
        ],
        recipient: ProgramHash([3; 21]),
        cr_council_member_did: info(sponsor).did,
    }
}

pub fn block(height: u32, transactions: Vec<Transaction>) -> Block {
    Block {
        height,
        transactions,
    }
}

/// Applies empty blocks over `from..=to`.
pub fn advance(committee: &Committee, from: u32, to: u32) -> Result<()> {
    for h in from..=to {
        committee.process_block(&block(h, vec![]))?;
    }
    Ok(())
}

/// Registers candidates 1..=3 at height 1, votes at 6 and seats 1 and 2 at 20.
/// Returns the registration transactions in seed order.
pub fn seat_first_council(committee: &Committee, chain: &mut Chain) -> Result<Vec<Transaction>> {
    let regs = vec![chain.register(1), chain.register(2), chain.register(3)];
    committee.process_block(&block(1, regs.clone()))?;
    advance(committee, 2, 5)?;
    let votes = chain.election_votes(&[(1, 300), (2, 200), (3, 100)]);
    committee.process_block(&block(6, vec![votes]))?;
    advance(committee, 7, 19)?;
    let outcome = committee.process_block(&block(20, vec![]))?;
    if !outcome.committee_changed {
        return Err(anyhow!("first council was not seated at 20"));
    }
    Ok(regs)
}
