// Path: crates/services/tests/invariants.rs
//! Randomized block sequences checked against the engine's global invariants.

mod common;

use common::*;
use crgov_services::registry::CandidateRegistry;
use crgov_services::Committee;
use crgov_types::app::{Block, Payload, TrackingType, Transaction, VoteResult};
use crgov_types::prelude::*;
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
enum Op {
    Register(u8),
    Unregister(u8),
    Vote(u8, i64),
    Impeach(u8, i64),
    Fund(i64),
    Proposal { sponsor: u8, draft: u8 },
    Review { pick: u8, reviewer: u8, approve: bool },
    Reject { pick: u8, votes: i64 },
    Track { pick: u8, kind: u8, stage: u8 },
    Withdraw(u8),
    ReturnDeposit(u8),
    SpendVotes(u8),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (1u8..=4).prop_map(Op::Register),
        1 => (1u8..=4).prop_map(Op::Unregister),
        3 => ((1u8..=4), 1i64..1_000).prop_map(|(s, v)| Op::Vote(s, v)),
        1 => ((1u8..=4), 1i64..80_000).prop_map(|(s, v)| Op::Impeach(s, v)),
        1 => (1i64..50_000).prop_map(Op::Fund),
        2 => ((1u8..=4), 0u8..4).prop_map(|(sponsor, draft)| Op::Proposal { sponsor, draft }),
        3 => (any::<u8>(), 1u8..=4, any::<bool>())
            .prop_map(|(pick, reviewer, approve)| Op::Review { pick, reviewer, approve }),
        1 => (any::<u8>(), 1i64..150_000).prop_map(|(pick, votes)| Op::Reject { pick, votes }),
        3 => (any::<u8>(), 0u8..5, 0u8..5).prop_map(|(pick, kind, stage)| Op::Track { pick, kind, stage }),
        2 => any::<u8>().prop_map(Op::Withdraw),
        1 => (1u8..=4).prop_map(Op::ReturnDeposit),
        1 => any::<u8>().prop_map(Op::SpendVotes),
    ]
}

/// Turns operations into transactions, resolving references to earlier
/// proposals, vote outputs and registrations.
#[derive(Default)]
struct Builder {
    chain: Chain,
    proposals: Vec<Hash256>,
    votes: Vec<Transaction>,
    registrations: BTreeMap<u8, Transaction>,
}

impl Builder {
    fn proposal(&self, pick: u8) -> Option<Hash256> {
        if self.proposals.is_empty() {
            return None;
        }
        self.proposals.get(pick as usize % self.proposals.len()).copied()
    }

    fn register(&mut self, seed: u8) -> Transaction {
        let tx = self.chain.register(seed);
        self.registrations.insert(seed, tx.clone());
        tx
    }

    fn vote(&mut self, tx: Transaction) -> Transaction {
        self.votes.push(tx.clone());
        tx
    }

    fn tx(&mut self, op: Op) -> Option<Transaction> {
        let tx = match op {
            Op::Register(s) => self.register(s),
            Op::Unregister(s) => self.chain.unregister(s),
            Op::Vote(s, v) => {
                let tx = self.chain.election_votes(&[(s, v)]);
                self.vote(tx)
            }
            Op::Impeach(s, v) => {
                let tx = self.chain.impeachment_votes(&[(s, v)]);
                self.vote(tx)
            }
            Op::Fund(v) => self.chain.treasury(FOUNDATION, v),
            Op::Proposal { sponsor, draft } => {
                let proposal = normal_proposal(sponsor, draft);
                self.proposals.push(proposal.hash());
                self.chain.tx(Payload::CrcProposal(proposal))
            }
            Op::Review { pick, reviewer, approve } => {
                let result = if approve { VoteResult::Approve } else { VoteResult::Reject };
                let hash = self.proposal(pick)?;
                self.chain.review(hash, reviewer, result)
            }
            Op::Reject { pick, votes } => {
                let hash = self.proposal(pick)?;
                let tx = self.chain.reject_votes(hash, votes);
                self.vote(tx)
            }
            Op::Track { pick, kind, stage } => {
                let tracking = match kind {
                    0 => TrackingType::Progress { stage },
                    1 => TrackingType::Rejected { stage },
                    2 => TrackingType::Finalized,
                    3 => TrackingType::Terminated,
                    _ => TrackingType::Common,
                };
                let hash = self.proposal(pick)?;
                self.chain.tracking(hash, tracking)
            }
            Op::Withdraw(pick) => {
                let hash = self.proposal(pick)?;
                self.chain.withdraw(hash)
            }
            Op::ReturnDeposit(s) => {
                let deposit_output = self.registrations.get(&s)?.outpoint(0);
                self.chain.return_deposit(s, deposit_output, DEPOSIT)
            }
            Op::SpendVotes(pick) => {
                if self.votes.is_empty() {
                    return None;
                }
                let spent = self.votes.get(pick as usize % self.votes.len())?.clone();
                self.chain.spend_votes(&spent).ok()?
            }
        };
        Some(tx)
    }
}

/// Blocks 1..=len built from random operations on top of a fixed calendar:
/// four candidates register at 1 and are voted on at 6, and two of them
/// register again at 45 with votes at 52 so the term change at 60 can seat a
/// second council.
fn blocks(len: usize) -> impl Strategy<Value = Vec<Block>> {
    proptest::collection::vec(proptest::collection::vec(op(), 0..4), len).prop_map(|per_block| {
        let mut builder = Builder::default();
        per_block
            .into_iter()
            .enumerate()
            .map(|(i, ops)| {
                let height = i as u32 + 1;
                let mut txs: Vec<Transaction> = match height {
                    1 => (1..=4).map(|s| builder.register(s)).collect(),
                    6 => {
                        let tx = builder.chain.election_votes(&[(1, 300), (2, 200), (3, 100), (4, 50)]);
                        vec![builder.vote(tx)]
                    }
                    45 => vec![builder.register(3), builder.register(4)],
                    52 => {
                        let tx = builder.chain.election_votes(&[(3, 70), (4, 60)]);
                        vec![builder.vote(tx)]
                    }
                    _ => vec![],
                };
                txs.extend(ops.into_iter().filter_map(|op| builder.tx(op)));
                block(height, txs)
            })
            .collect()
    })
}

/// Every withdrawn stage stays within its budgeted amount.
fn budgets_are_respected(committee: &Committee) -> bool {
    let Ok(snapshot) = committee.snapshot() else {
        return false;
    };
    snapshot.proposals.proposals.values().all(|p| {
        p.withdrawn_total() <= p.proposal.total_budget()
            && p.proposal.budgets.iter().all(|b| {
                p.withdrawn_budgets
                    .get(&b.stage)
                    .map_or(true, |withdrawn| *withdrawn <= b.amount)
            })
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn rollback_then_replay_is_indistinguishable(
        chain in blocks(64),
        target in 0u32..64,
    ) {
        let committee = Committee::new(params());
        let mut encodings = vec![committee.snapshot().unwrap().encode()];
        for b in &chain {
            committee.process_block(b).unwrap();
            encodings.push(committee.snapshot().unwrap().encode());
        }
        let final_encoding = encodings.last().cloned().unwrap();

        committee.rollback_to(target).unwrap();
        prop_assert_eq!(
            &committee.snapshot().unwrap().encode(),
            &encodings[target as usize]
        );

        for b in chain.iter().skip(target as usize) {
            committee.process_block(b).unwrap();
        }
        prop_assert_eq!(committee.snapshot().unwrap().encode(), final_encoding);
    }

    #[test]
    fn deposits_and_budgets_are_never_overdrawn(chain in blocks(64)) {
        let committee = Committee::new(params());
        for b in &chain {
            committee.process_block(b).unwrap();
            prop_assert_eq!(committee.overdrawn_deposit().unwrap(), None);
            prop_assert!(budgets_are_respected(&committee));
        }
    }

    #[test]
    fn processing_is_deterministic(chain in blocks(64)) {
        let a = Committee::new(params());
        let b = Committee::new(params());
        for blk in &chain {
            let left = a.process_block(blk).unwrap();
            let right = b.process_block(blk).unwrap();
            prop_assert_eq!(left, right);
        }
        prop_assert_eq!(a.snapshot().unwrap().encode(), b.snapshot().unwrap().encode());
    }
}

#[test]
fn sweeps_are_idempotent_within_a_height() {
    let mut registry = CandidateRegistry::new(Arc::new(params()));
    registry.register_cr(&info(1), 1).unwrap();
    registry.register_cr(&info(2), 1).unwrap();

    assert_eq!(registry.activate_pending(2), 0);
    assert_eq!(registry.activate_pending(3), 2);
    let after_first = registry.state().clone();
    assert_eq!(registry.activate_pending(3), 0);
    assert_eq!(registry.state(), &after_first);

    registry.unregister_cr(&cid(1), 4).unwrap();
    assert_eq!(registry.mature_deposits(8), 0);
    assert_eq!(registry.mature_deposits(9), 1);
    let after_first = registry.state().clone();
    assert_eq!(registry.mature_deposits(9), 0);
    assert_eq!(registry.mature_deposits(10), 0);
    assert_eq!(registry.state(), &after_first);
}

#[test]
fn rollback_below_the_window_changes_nothing() {
    let committee = Committee::new(crgov_types::config::CommitteeParams {
        history_capacity: 3,
        ..params()
    });
    let mut chain = Chain::default();
    committee.process_block(&block(1, vec![chain.register(1)])).unwrap();
    advance(&committee, 2, 8).unwrap();
    let before = committee.snapshot().unwrap().encode();

    assert!(committee.rollback_to(2).is_err());
    assert_eq!(committee.snapshot().unwrap().encode(), before);
    assert_eq!(committee.tip().unwrap(), Some(8));

    committee.rollback_to(6).unwrap();
    assert_eq!(committee.tip().unwrap(), Some(6));
}
