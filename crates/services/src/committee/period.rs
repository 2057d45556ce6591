// Path: crates/services/src/committee/period.rs
//! Election calendar arithmetic over the committee counters.

use super::keyframe::CommitteeCounters;
use crgov_types::config::CommitteeParams;

/// True when CRC election votes cast at `height` are counted.
pub(crate) fn is_in_voting_period(p: &CommitteeParams, c: &CommitteeCounters, height: u32) -> bool {
    if c.last_committee_height < p.cr_committee_start_height && height <= p.cr_committee_start_height {
        return height >= p.cr_voting_start_height;
    }
    if !c.in_election_period {
        if c.last_voting_start_height == 0 {
            return true;
        }
        return height < c.last_voting_start_height.saturating_add(p.cr_voting_period);
    }
    let term_end = c.last_committee_height.saturating_add(p.cr_duty_period);
    height >= term_end.saturating_sub(p.cr_voting_period) && height < term_end
}

/// True when membership rotates at `height`.
pub(crate) fn should_change(p: &CommitteeParams, c: &CommitteeCounters, height: u32) -> bool {
    if c.in_election_period {
        height == c.last_committee_height.saturating_add(p.cr_duty_period)
    } else if c.last_voting_start_height == 0 {
        height == p.cr_committee_start_height
    } else {
        height == c.last_voting_start_height.saturating_add(p.cr_voting_period)
    }
}

/// The voting-period start to record at `height`, one block ahead of it.
pub(crate) fn next_voting_start(p: &CommitteeParams, c: &CommitteeCounters, height: u32) -> Option<u32> {
    if !c.in_election_period {
        return None;
    }
    let start = c
        .last_committee_height
        .saturating_add(p.cr_duty_period)
        .saturating_sub(p.cr_voting_period);
    (height.saturating_add(1) == start).then_some(start)
}
