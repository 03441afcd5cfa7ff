use chrono::{DateTime, Utc};
use serde::Serialize;

/// Governor activity counters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GovernorStats {
    /// Ticks that reached the frame-rate source
    pub ticks: u64,
    pub samples_recorded: u64,
    /// Negative or non-finite samples discarded
    pub samples_rejected: u64,
    /// Ticks where the source had nothing new
    pub empty_ticks: u64,
    pub consecutive_empty_ticks: u32,
    /// Evaluations held back by the minimum-sample guard
    pub guarded_evaluations: u64,
    pub upgrades: u64,
    pub downgrades: u64,
    pub last_change: Option<DateTime<Utc>>,
}

impl GovernorStats {
    pub fn record_sample(&mut self) {
        self.ticks += 1;
        self.samples_recorded += 1;
        self.consecutive_empty_ticks = 0;
    }

    /// A rejected value still shows the source is producing, so it ends a stall
    pub fn record_rejected(&mut self) {
        self.ticks += 1;
        self.samples_rejected += 1;
        self.consecutive_empty_ticks = 0;
    }

    pub fn record_empty(&mut self) -> u32 {
        self.ticks += 1;
        self.empty_ticks += 1;
        self.consecutive_empty_ticks = self.consecutive_empty_ticks.saturating_add(1);
        self.consecutive_empty_ticks
    }

    pub fn record_guarded(&mut self) {
        self.guarded_evaluations += 1;
    }

    pub fn record_change(&mut self, downgrade: bool, at: DateTime<Utc>) {
        if downgrade {
            self.downgrades += 1;
        } else {
            self.upgrades += 1;
        }
        self.last_change = Some(at);
    }

    pub fn transitions(&self) -> u64 {
        self.upgrades + self.downgrades
    }
}
