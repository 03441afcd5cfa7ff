use super::stats::GovernorStats;
use super::types::TickOutcome;
use crate::history::SampleHistory;
use crate::listener::QualityChange;
use crate::policy::ThresholdPolicy;
use crate::quality::{QualityLevel, QualityProfiles, QualitySettings};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Synchronous governor state machine: history, policy and current level
///
/// Has no timer and no listeners. [`super::Governor`] wraps it for periodic
/// use; it can also be driven directly, one sample at a time.
#[derive(Debug)]
pub struct GovernorCore<S = QualitySettings> {
    level: QualityLevel,
    history: SampleHistory,
    policy: ThresholdPolicy,
    profiles: QualityProfiles<S>,
    stats: GovernorStats,
}

impl<S> GovernorCore<S> {
    pub fn new(
        initial_level: QualityLevel,
        history_capacity: usize,
        policy: ThresholdPolicy,
        profiles: QualityProfiles<S>,
    ) -> Self {
        Self {
            level: initial_level,
            history: SampleHistory::new(history_capacity),
            policy,
            profiles,
            stats: GovernorStats::default(),
        }
    }

    pub fn level(&self) -> QualityLevel {
        self.level
    }

    /// Settings bundle for the current level
    pub fn settings(&self) -> Arc<S> {
        self.profiles.get(self.level)
    }

    pub fn history(&self) -> &SampleHistory {
        &self.history
    }

    pub fn policy(&self) -> &ThresholdPolicy {
        &self.policy
    }

    pub fn stats(&self) -> &GovernorStats {
        &self.stats
    }

    /// Record one frame-rate sample and apply any resulting transition
    pub fn process_sample(&mut self, sample: f64) -> TickOutcome<S> {
        if !sample.is_finite() || sample < 0.0 {
            warn!("Discarding invalid frame-rate sample: {}", sample);
            self.stats.record_rejected();
            return TickOutcome::Rejected { sample };
        }

        self.history.record(sample);
        self.stats.record_sample();

        let average = self.history.average();
        let held = self.history.len();

        if !self.policy.has_enough_samples(held) {
            debug!(
                "Holding at {}: {} of {} samples needed (avg {:.1} fps)",
                self.level,
                held,
                self.policy.min_samples(),
                average
            );
            self.stats.record_guarded();
            return TickOutcome::Evaluated {
                sample,
                average,
                level: self.level,
                guarded: true,
                change: None,
            };
        }

        debug!(
            "Average {:.1} fps over {} samples at {} quality",
            average, held, self.level
        );

        let change = self
            .policy
            .evaluate(average, self.level)
            .map(|next| self.apply(next, average));

        TickOutcome::Evaluated {
            sample,
            average,
            level: self.level,
            guarded: false,
            change,
        }
    }

    /// Note a tick with no sample. Returns the consecutive empty-tick count.
    pub fn record_empty_tick(&mut self) -> u32 {
        self.stats.record_empty()
    }

    fn apply(&mut self, next: QualityLevel, average: f64) -> QualityChange<S> {
        let previous = self.level;
        self.level = next;

        let changed_at = Utc::now();
        self.stats.record_change(next < previous, changed_at);

        info!(
            "Quality adjusted from {} to {} (avg {:.1} fps)",
            previous, next, average
        );

        QualityChange {
            previous,
            level: next,
            settings: self.profiles.get(next),
            average_fps: average,
            changed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Thresholds;

    fn core(initial: QualityLevel, capacity: usize, min_samples: usize) -> GovernorCore {
        GovernorCore::new(
            initial,
            capacity,
            ThresholdPolicy::new(Thresholds::default(), min_samples),
            QualityProfiles::default(),
        )
    }

    #[test]
    fn test_single_low_sample_downgrades_when_guard_disabled() {
        let mut core = core(QualityLevel::High, 10, 1);
        let outcome = core.process_sample(10.0);

        let change = outcome.change().expect("expected a transition");
        assert_eq!(change.previous, QualityLevel::High);
        assert_eq!(change.level, QualityLevel::Low);
        assert_eq!(change.settings.shadow_map_size, 512);
        assert_eq!(core.level(), QualityLevel::Low);
    }

    #[test]
    fn test_guard_holds_first_sample() {
        let mut core = core(QualityLevel::High, 10, 2);

        let first = core.process_sample(10.0);
        assert!(matches!(
            first,
            TickOutcome::Evaluated { guarded: true, change: None, .. }
        ));
        assert_eq!(core.level(), QualityLevel::High);

        let second = core.process_sample(10.0);
        assert_eq!(second.change().map(|c| c.level), Some(QualityLevel::Low));
        assert_eq!(core.stats().guarded_evaluations, 1);
    }

    #[test]
    fn test_invalid_samples_are_rejected() {
        let mut core = core(QualityLevel::High, 10, 1);

        assert!(matches!(core.process_sample(-1.0), TickOutcome::Rejected { .. }));
        assert!(matches!(core.process_sample(f64::NAN), TickOutcome::Rejected { .. }));
        assert!(matches!(
            core.process_sample(f64::INFINITY),
            TickOutcome::Rejected { .. }
        ));

        assert!(core.history().is_empty());
        assert_eq!(core.stats().samples_rejected, 3);
        assert_eq!(core.level(), QualityLevel::High);
    }

    #[test]
    fn test_zero_is_a_low_reading() {
        let mut core = core(QualityLevel::Medium, 10, 1);
        let outcome = core.process_sample(0.0);
        assert_eq!(outcome.change().map(|c| c.level), Some(QualityLevel::Low));
    }

    #[test]
    fn test_empty_ticks_record_nothing() {
        let mut core = core(QualityLevel::High, 10, 1);
        assert_eq!(core.record_empty_tick(), 1);
        assert_eq!(core.record_empty_tick(), 2);
        assert!(core.history().is_empty());

        core.process_sample(60.0);
        assert_eq!(core.stats().consecutive_empty_ticks, 0);
        assert_eq!(core.stats().empty_ticks, 2);
        assert_eq!(core.stats().ticks, 3);
    }

    #[test]
    fn test_rejected_sample_ends_empty_streak() {
        let mut core = core(QualityLevel::High, 10, 1);
        assert_eq!(core.record_empty_tick(), 1);
        assert_eq!(core.record_empty_tick(), 2);

        core.process_sample(f64::NAN);
        assert_eq!(core.stats().consecutive_empty_ticks, 0);
        assert_eq!(core.record_empty_tick(), 1);
        assert_eq!(core.stats().empty_ticks, 3);
    }

    #[test]
    fn test_smoothing_delays_recovery() {
        let mut core = core(QualityLevel::High, 4, 1);

        core.process_sample(20.0);
        assert_eq!(core.level(), QualityLevel::Low);

        // Average climbs 20 -> 40 -> 46.7 -> 50 -> 60: still not above 55 until the 20 is evicted
        for _ in 0..3 {
            core.process_sample(60.0);
            assert_eq!(core.level(), QualityLevel::Low);
        }
        let outcome = core.process_sample(60.0);
        assert_eq!(outcome.change().map(|c| c.level), Some(QualityLevel::High));
        assert_eq!(core.stats().upgrades, 1);
        assert_eq!(core.stats().downgrades, 1);
    }
}
