// Path: crates/types/src/config/mod.rs

//! Configuration for the committee engine and its checkpoint schedule.
//!
//! Defaults mirror main-network values. Every field may be omitted from a TOML
//! file; missing fields fall back to the defaults below.

use crate::app::{Fixed64, ProgramHash, PREFIX_STANDARD};
use crate::error::GovernanceError;
use serde::{Deserialize, Serialize};

/// Consensus parameters of the CR committee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitteeParams {
    /// Confirmations before a Pending candidate becomes Active, and before an
    /// inactive member's activation request takes effect.
    pub activate_duration: u32,
    /// Number of council seats.
    pub cr_member_count: u32,
    /// Approvals required for council decisions.
    pub cr_agreement_count: u32,
    /// First height at which CRC votes are counted.
    pub cr_voting_start_height: u32,
    /// Height at which the first committee is seated.
    pub cr_committee_start_height: u32,
    /// Length of a council term in blocks.
    pub cr_duty_period: u32,
    /// Length of the voting period preceding a term.
    pub cr_voting_period: u32,
    /// Blocks a canceled candidate's deposit stays locked.
    pub cr_deposit_lockup_blocks: u32,
    /// Length of the council review window of a proposal.
    pub proposal_cr_voting_period: u32,
    /// Length of the public vote window of a proposal.
    pub proposal_public_voting_period: u32,
    /// Percentage of circulation needed to reject a proposal or impeach a member.
    pub voter_reject_percentage: u32,
    /// Percentage of the foundation balance appropriated per term.
    pub cr_appropriate_percentage: u32,
    /// Proposals a council member may sponsor per session.
    pub max_committee_proposal_count: u32,
    /// Collateral locked per registration.
    pub min_deposit: Fixed64,
    /// Frames retained by every undo log.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    /// Supply at genesis.
    pub genesis_supply: Fixed64,
    /// Block reward added to circulation per height.
    pub reward_per_block: Fixed64,
    /// The foundation treasury address.
    pub foundation_address: ProgramHash,
    /// The committee treasury address.
    pub committee_address: ProgramHash,
    /// Outputs paid here are destroyed.
    pub destroy_address: ProgramHash,
}

fn default_history_capacity() -> usize {
    720
}

impl Default for CommitteeParams {
    fn default() -> Self {
        Self {
            activate_duration: 6,
            cr_member_count: 12,
            cr_agreement_count: 8,
            cr_voting_start_height: 537_670,
            cr_committee_start_height: 658_930,
            cr_duty_period: 262_800, // ~1 year at 2 min/block
            cr_voting_period: 21_600, // ~30 days
            cr_deposit_lockup_blocks: 2_160,
            proposal_cr_voting_period: 5_040, // ~7 days
            proposal_public_voting_period: 5_040,
            voter_reject_percentage: 10,
            cr_appropriate_percentage: 10,
            max_committee_proposal_count: 128,
            min_deposit: Fixed64::from_coins(5_000),
            history_capacity: default_history_capacity(),
            genesis_supply: Fixed64::from_coins(33_000_000),
            reward_per_block: Fixed64(502_283_105),
            foundation_address: ProgramHash::from_code(PREFIX_STANDARD, b"crc-foundation"),
            committee_address: ProgramHash::from_code(PREFIX_STANDARD, b"crc-committee"),
            destroy_address: ProgramHash([0; 21]),
        }
    }
}

impl CommitteeParams {
    /// Parses parameters from TOML, filling omitted fields with defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// Rejects parameter sets the engine cannot run with.
    pub fn validate(&self) -> Result<(), GovernanceError> {
        if self.cr_member_count == 0 {
            return Err(GovernanceError::Invalid("cr_member_count must be > 0".into()));
        }
        if self.cr_agreement_count == 0 || self.cr_agreement_count > self.cr_member_count {
            return Err(GovernanceError::Invalid(format!(
                "cr_agreement_count {} must be in 1..={}",
                self.cr_agreement_count, self.cr_member_count
            )));
        }
        if self.cr_voting_period >= self.cr_duty_period {
            return Err(GovernanceError::Invalid(
                "cr_voting_period must be shorter than cr_duty_period".into(),
            ));
        }
        if self.cr_voting_start_height > self.cr_committee_start_height {
            return Err(GovernanceError::Invalid(
                "cr_voting_start_height must not follow cr_committee_start_height".into(),
            ));
        }
        if self.history_capacity == 0 {
            return Err(GovernanceError::Invalid("history_capacity must be > 0".into()));
        }
        Ok(())
    }
}

/// Checkpoint scheduling and retention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// A checkpoint is written at every height divisible by this interval.
    #[serde(default = "default_checkpoint_interval")]
    pub interval: u32,
    /// Number of checkpoint files kept on disk.
    #[serde(default = "default_checkpoint_keep")]
    pub keep: usize,
    /// Directory holding checkpoint files.
    #[serde(default = "default_checkpoint_dir")]
    pub dir: String,
}

fn default_checkpoint_interval() -> u32 {
    720
}
fn default_checkpoint_keep() -> usize {
    3
}
fn default_checkpoint_dir() -> String {
    "checkpoints".to_string()
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            interval: default_checkpoint_interval(),
            keep: default_checkpoint_keep(),
            dir: default_checkpoint_dir(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let params = CommitteeParams::from_toml_str(
            r#"
            cr_member_count = 3
            cr_agreement_count = 2
            min_deposit = 500
            "#,
        )
        .unwrap();
        assert_eq!(params.cr_member_count, 3);
        assert_eq!(params.min_deposit, Fixed64(500));
        assert_eq!(params.activate_duration, 6);
        assert_eq!(params.history_capacity, 720);
        params.validate().unwrap();
    }

    #[test]
    fn validate_rejects_bad_agreement_count() {
        let params = CommitteeParams {
            cr_agreement_count: 13,
            ..Default::default()
        };
        assert!(params.validate().is_err());
        CommitteeParams::default().validate().unwrap();
    }

    #[test]
    fn checkpoint_config_defaults() {
        let cfg: CheckpointConfig = toml::from_str("keep = 5").unwrap();
        assert_eq!(cfg.interval, 720);
        assert_eq!(cfg.keep, 5);
        assert_eq!(cfg.dir, "checkpoints");
    }
}
