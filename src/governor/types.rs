use crate::listener::QualityChange;
use crate::quality::{QualityLevel, QualitySettings};
use serde::Serialize;

/// Governor lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    Uninitialized,
    Running,
    Stopped,
}

/// Result of one governor tick
#[derive(Debug)]
pub enum TickOutcome<S = QualitySettings> {
    /// The governor is not running; nothing was read or recorded
    Skipped,
    /// The source had no new measurement; nothing was recorded
    NoSample { consecutive: u32 },
    /// The sample was negative or not a number and was discarded
    Rejected { sample: f64 },
    /// The sample was recorded and the policy consulted
    Evaluated {
        sample: f64,
        average: f64,
        level: QualityLevel,
        /// True when the minimum-sample guard held the policy back
        guarded: bool,
        change: Option<QualityChange<S>>,
    },
}

impl<S> TickOutcome<S> {
    pub fn change(&self) -> Option<&QualityChange<S>> {
        match self {
            TickOutcome::Evaluated { change, .. } => change.as_ref(),
            _ => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, TickOutcome::Skipped)
    }

    pub fn is_evaluated(&self) -> bool {
        matches!(self, TickOutcome::Evaluated { .. })
    }
}
