// Path: crates/types/src/app/transaction.rs
//! Blocks and transactions as seen by the governance engine.
//!
//! Inputs arrive already resolved: each carries the output it spends, so the
//! engine never needs a UTXO lookup of its own.

use crate::app::{Fixed64, Hash256, OutPoint, Payload, ProgramHash};
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// Votes for CR candidates or council members, keyed by CID.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct CandidateVotes {
    /// The CID receiving the votes.
    pub cid: ProgramHash,
    /// Number of votes.
    pub votes: Fixed64,
}

/// Reject votes for a proposal.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct ProposalVotes {
    /// The proposal receiving the votes.
    pub proposal_hash: Hash256,
    /// Number of votes.
    pub votes: Fixed64,
}

/// One typed vote section of a vote output.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub enum VoteContent {
    /// Votes for CR candidates in the election.
    Crc(Vec<CandidateVotes>),
    /// Public reject votes against proposals.
    CrcProposal(Vec<ProposalVotes>),
    /// Impeachment votes against seated council members.
    CrcImpeachment(Vec<CandidateVotes>),
}

/// The vote payload attached to an output.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Encode, Decode, Default)]
pub struct VoteOutput {
    /// Vote sections.
    pub contents: Vec<VoteContent>,
}

/// A transaction output.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct Output {
    /// Amount carried by the output.
    pub value: Fixed64,
    /// The receiving address.
    pub program_hash: ProgramHash,
    /// Optional vote payload.
    pub vote: Option<VoteOutput>,
}

impl Output {
    /// A plain transfer output.
    pub fn new(value: Fixed64, program_hash: ProgramHash) -> Self {
        Self {
            value,
            program_hash,
            vote: None,
        }
    }

    /// Vote sections carried by the output; empty for plain transfers.
    pub fn vote_contents(&self) -> &[VoteContent] {
        self.vote.as_ref().map_or(&[], |v| v.contents.as_slice())
    }
}

/// A transaction input together with the output it spends.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct TxInput {
    /// The spent outpoint.
    pub previous: OutPoint,
    /// The resolved output being spent.
    pub output: Output,
}

/// A signing program attached to a transaction.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct Program {
    /// Redeem-script code.
    pub code: Vec<u8>,
    /// Signature parameter.
    pub parameter: Vec<u8>,
}

/// A validated transaction.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct Transaction {
    /// Transaction hash.
    pub hash: Hash256,
    /// Typed payload.
    pub payload: Payload,
    /// Resolved inputs.
    pub inputs: Vec<TxInput>,
    /// Outputs.
    pub outputs: Vec<Output>,
    /// Signing programs.
    pub programs: Vec<Program>,
}

impl Transaction {
    /// The outpoint of this transaction's output at `index`.
    pub fn outpoint(&self, index: usize) -> OutPoint {
        OutPoint::new(self.hash, u16::try_from(index).unwrap_or(u16::MAX))
    }

    /// Outputs paired with their outpoints.
    pub fn indexed_outputs(&self) -> impl Iterator<Item = (OutPoint, &Output)> + '_ {
        self.outputs
            .iter()
            .enumerate()
            .map(move |(i, o)| (self.outpoint(i), o))
    }

    /// Withdrawal transactions are applied before everything else in a block.
    pub fn is_proposal_withdraw(&self) -> bool {
        matches!(self.payload, Payload::CrcProposalWithdraw(_))
    }
}

/// A block of validated transactions.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct Block {
    /// Block height.
    pub height: u32,
    /// Transactions in block order.
    pub transactions: Vec<Transaction>,
}
