//! Choosing one motor command among competing proposals.
//!
//! Every producer that targets a motor writes to its own input slot, so no
//! proposal is ever overwritten by another. The motor then picks a winner
//! with an [`ArbitrationPolicy`]. Proposals that cannot be ordered under the
//! policy raise [`CodeletError::ConflictingMotorWrite`]; the motor keeps the
//! command it effected last and tries again on the next tick.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::CodeletRole;
use crate::error::CodeletError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArbitrationPolicy {
    /// Highest proposal activation wins. Equal top activations carrying
    /// different commands conflict.
    #[default]
    HighestActivation,
    /// The most recently written proposal wins.
    MostRecent,
    /// Behavior beats ActionFromPlanning beats ActionFromPerception; within
    /// a role, highest activation wins and ties conflict.
    RolePrecedence,
}

impl fmt::Display for ArbitrationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HighestActivation => write!(f, "highest_activation"),
            Self::MostRecent => write!(f, "most_recent"),
            Self::RolePrecedence => write!(f, "role_precedence"),
        }
    }
}

impl FromStr for ArbitrationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "highest_activation" => Ok(Self::HighestActivation),
            "most_recent" => Ok(Self::MostRecent),
            "role_precedence" => Ok(Self::RolePrecedence),
            other => Err(format!("unknown arbitration policy: {other}")),
        }
    }
}

/// A non-empty command read from one motor input.
#[derive(Debug, Clone, PartialEq)]
pub struct Proposal {
    pub producer: String,
    pub role: CodeletRole,
    /// Action label recorded in the history if this proposal is effected.
    pub label: String,
    pub command: Value,
    pub activation: f64,
    /// Global write sequence of the proposal.
    pub sequence: u64,
}

fn precedence(role: CodeletRole) -> u8 {
    match role {
        CodeletRole::Behavior => 3,
        CodeletRole::ActionFromPlanning => 2,
        CodeletRole::ActionFromPerception => 1,
        _ => 0,
    }
}

impl ArbitrationPolicy {
    /// Pick the winning proposal, `None` when there are none.
    pub fn select<'a>(
        &self,
        motor: &str,
        proposals: &'a [Proposal],
    ) -> Result<Option<&'a Proposal>, CodeletError> {
        if proposals.is_empty() {
            return Ok(None);
        }
        match self {
            Self::MostRecent => Ok(proposals.iter().max_by_key(|p| p.sequence)),
            Self::HighestActivation => {
                let all: Vec<&Proposal> = proposals.iter().collect();
                strongest(motor, &all).map(Some)
            }
            Self::RolePrecedence => {
                let top = proposals
                    .iter()
                    .map(|p| precedence(p.role))
                    .max()
                    .unwrap_or_default();
                let ranked: Vec<&Proposal> = proposals
                    .iter()
                    .filter(|p| precedence(p.role) == top)
                    .collect();
                strongest(motor, &ranked).map(Some)
            }
        }
    }
}

/// Highest activation among `candidates`; identical commands at the top are
/// not a conflict, the most recent one is returned.
fn strongest<'a>(motor: &str, candidates: &[&'a Proposal]) -> Result<&'a Proposal, CodeletError> {
    let top = candidates
        .iter()
        .map(|p| p.activation)
        .max_by(f64::total_cmp)
        .unwrap_or_default();
    let mut tied: Vec<&'a Proposal> = candidates
        .iter()
        .copied()
        .filter(|p| p.activation == top)
        .collect();
    tied.sort_by_key(|p| std::cmp::Reverse(p.sequence));

    let Some(&winner) = tied.first().or_else(|| candidates.first()) else {
        return Err(CodeletError::ConflictingMotorWrite {
            motor: motor.to_string(),
            producers: Vec::new(),
        });
    };
    if tied.iter().any(|p| p.command != winner.command) {
        return Err(CodeletError::ConflictingMotorWrite {
            motor: motor.to_string(),
            producers: tied.iter().map(|p| p.producer.clone()).collect(),
        });
    }
    Ok(winner)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
