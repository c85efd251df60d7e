//! Degrees of success for d20 checks.
//!
//! A check is classified in two phases: first by its margin against the DC,
//! then a natural 20 or natural 1 on the die moves that result one degree up
//! or down.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome tier of a d20 check, ordered from worst to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DegreeOfSuccess {
    CriticalFailure,
    Failure,
    Success,
    CriticalSuccess,
}

impl DegreeOfSuccess {
    /// Resolve a check: `roll` is the raw die face, `modifier` the total bonus.
    pub fn resolve(roll: u32, modifier: i32, dc: i32) -> Self {
        let base = Self::from_margin((roll as i32).saturating_add(modifier), dc);
        match roll {
            20 => base.step_up(),
            1 => base.step_down(),
            _ => base,
        }
    }

    /// Classification by margin alone, ignoring the natural roll.
    pub fn from_margin(result: i32, dc: i32) -> Self {
        let margin = i64::from(result) - i64::from(dc);
        if margin >= 10 {
            DegreeOfSuccess::CriticalSuccess
        } else if margin >= 0 {
            DegreeOfSuccess::Success
        } else if margin <= -10 {
            DegreeOfSuccess::CriticalFailure
        } else {
            DegreeOfSuccess::Failure
        }
    }

    pub fn step_up(self) -> Self {
        match self {
            DegreeOfSuccess::CriticalFailure => DegreeOfSuccess::Failure,
            DegreeOfSuccess::Failure => DegreeOfSuccess::Success,
            DegreeOfSuccess::Success | DegreeOfSuccess::CriticalSuccess => {
                DegreeOfSuccess::CriticalSuccess
            }
        }
    }

    pub fn step_down(self) -> Self {
        match self {
            DegreeOfSuccess::CriticalSuccess => DegreeOfSuccess::Success,
            DegreeOfSuccess::Success => DegreeOfSuccess::Failure,
            DegreeOfSuccess::Failure | DegreeOfSuccess::CriticalFailure => {
                DegreeOfSuccess::CriticalFailure
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self,
            DegreeOfSuccess::Success | DegreeOfSuccess::CriticalSuccess
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            DegreeOfSuccess::CriticalFailure => "Critical Failure",
            DegreeOfSuccess::Failure => "Failure",
            DegreeOfSuccess::Success => "Success",
            DegreeOfSuccess::CriticalSuccess => "Critical Success",
        }
    }
}

impl fmt::Display for DegreeOfSuccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
