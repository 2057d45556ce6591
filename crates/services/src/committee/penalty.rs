// Path: crates/services/src/committee/penalty.rs
//! Deposit penalty charged to a council member when their seat is settled.

use crgov_types::prelude::*;

/// Inputs to [`member_penalty`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PenaltyInput {
    pub min_deposit: Fixed64,
    /// Blocks served in the current term.
    pub served_blocks: u32,
    pub duty_period: u32,
    /// Proposals of this session the member reviewed.
    pub reviewed: usize,
    /// Proposals registered this session.
    pub proposals: usize,
    pub impeached: bool,
}

/// A pure function computing the penalty for one seat.
///
/// `penalty = min_deposit * (1 - election_rate * vote_rate)` where the election
/// rate is the served fraction of the term for an impeached member (1 otherwise)
/// and the vote rate is the fraction of this session's proposals the member
/// reviewed (1 when there were none). The product is formed in 128-bit
/// precision before the single division.
pub fn member_penalty(input: PenaltyInput) -> Fixed64 {
    let (served, duty) = if input.impeached && input.duty_period > 0 {
        (input.served_blocks.min(input.duty_period), input.duty_period)
    } else {
        (1, 1)
    };
    let (reviewed, proposals) = if input.proposals == 0 {
        (1, 1)
    } else {
        (input.reviewed.min(input.proposals), input.proposals)
    };

    let numerator = i128::from(served) * reviewed as i128;
    let denominator = i128::from(duty) * proposals as i128;
    let kept = i128::from(input.min_deposit.0) * numerator / denominator;
    let penalty = i128::from(input.min_deposit.0) - kept;
    Fixed64(i64::try_from(penalty).unwrap_or(input.min_deposit.0)).non_negative()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> PenaltyInput {
        PenaltyInput {
            min_deposit: Fixed64(5_000),
            served_blocks: 0,
            duty_period: 1_000,
            reviewed: 0,
            proposals: 0,
            impeached: false,
        }
    }

    #[test]
    fn full_term_with_no_proposals_costs_nothing() {
        assert_eq!(member_penalty(input()), Fixed64::ZERO);
    }

    #[test]
    fn missed_reviews_are_charged_proportionally() {
        let p = member_penalty(PenaltyInput {
            reviewed: 1,
            proposals: 4,
            ..input()
        });
        assert_eq!(p, Fixed64(3_750));
    }

    #[test]
    fn impeachment_charges_the_unserved_term() {
        let p = member_penalty(PenaltyInput {
            served_blocks: 250,
            impeached: true,
            ..input()
        });
        assert_eq!(p, Fixed64(3_750));
        let overserved = member_penalty(PenaltyInput {
            served_blocks: 5_000,
            impeached: true,
            ..input()
        });
        assert_eq!(overserved, Fixed64::ZERO);
    }
}
