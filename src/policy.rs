//! Hysteresis policy mapping a smoothed frame rate to a quality level.
//!
//! The up-threshold sits above the medium down-threshold, leaving a dead zone
//! where no transition happens. With the defaults an average between 50 and
//! 55 never moves the level in either direction.

use crate::quality::QualityLevel;
use serde::{Deserialize, Serialize};

/// Frame-rate thresholds driving level transitions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Below this average any level drops to low
    #[serde(default = "default_down_low")]
    pub down_low: f64,

    /// Below this average high drops to medium
    #[serde(default = "default_down_medium")]
    pub down_medium: f64,

    /// Above this average any level rises to high
    #[serde(default = "default_up")]
    pub up: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            down_low: default_down_low(),
            down_medium: default_down_medium(),
            up: default_up(),
        }
    }
}

pub(crate) fn default_down_low() -> f64 {
    30.0
}
pub(crate) fn default_down_medium() -> f64 {
    50.0
}
pub(crate) fn default_up() -> f64 {
    55.0
}

/// Threshold evaluator with a minimum-sample guard
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdPolicy {
    thresholds: Thresholds,
    min_samples: usize,
}

impl ThresholdPolicy {
    /// `min_samples` of 0 or 1 evaluates on every sample
    pub fn new(thresholds: Thresholds, min_samples: usize) -> Self {
        Self {
            thresholds,
            min_samples,
        }
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    pub fn min_samples(&self) -> usize {
        self.min_samples
    }

    /// Whether enough samples have accumulated to act on the average
    pub fn has_enough_samples(&self, held: usize) -> bool {
        held >= self.min_samples.max(1)
    }

    /// Decide the next level. First matching rule wins.
    pub fn evaluate(&self, average: f64, current: QualityLevel) -> Option<QualityLevel> {
        let t = &self.thresholds;

        if average < t.down_low && current != QualityLevel::Low {
            Some(QualityLevel::Low)
        } else if average < t.down_medium && current == QualityLevel::High {
            Some(QualityLevel::Medium)
        } else if average > t.up && current != QualityLevel::High {
            Some(QualityLevel::High)
        } else {
            None
        }
    }

    /// Guarded evaluation over `held` samples
    pub fn decide(&self, average: f64, held: usize, current: QualityLevel) -> Option<QualityLevel> {
        if !self.has_enough_samples(held) {
            return None;
        }
        self.evaluate(average, current)
    }
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self::new(Thresholds::default(), 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use QualityLevel::*;

    #[test]
    fn test_drop_to_low_from_any_level() {
        let policy = ThresholdPolicy::default();
        assert_eq!(policy.evaluate(25.0, High), Some(Low));
        assert_eq!(policy.evaluate(25.0, Medium), Some(Low));
        assert_eq!(policy.evaluate(25.0, Low), None);
    }

    #[test]
    fn test_high_drops_to_medium() {
        let policy = ThresholdPolicy::default();
        assert_eq!(policy.evaluate(45.0, High), Some(Medium));
        assert_eq!(policy.evaluate(45.0, Medium), None);
        assert_eq!(policy.evaluate(45.0, Low), None);
    }

    #[test]
    fn test_rise_skips_medium() {
        let policy = ThresholdPolicy::default();
        assert_eq!(policy.evaluate(60.0, Low), Some(High));
        assert_eq!(policy.evaluate(60.0, Medium), Some(High));
        assert_eq!(policy.evaluate(60.0, High), None);
    }

    #[test]
    fn test_dead_zone_holds_every_level() {
        let policy = ThresholdPolicy::default();
        for level in QualityLevel::ALL {
            for _ in 0..100 {
                assert_eq!(policy.evaluate(52.0, level), None);
            }
        }
    }

    #[test]
    fn test_boundaries_are_strict() {
        let policy = ThresholdPolicy::default();
        assert_eq!(policy.evaluate(30.0, Medium), None);
        assert_eq!(policy.evaluate(50.0, High), None);
        assert_eq!(policy.evaluate(55.0, Medium), None);
    }

    #[test]
    fn test_low_holds_between_thresholds() {
        let policy = ThresholdPolicy::default();
        assert_eq!(policy.evaluate(40.0, Low), None);
        assert_eq!(policy.evaluate(54.9, Low), None);
    }

    #[test]
    fn test_min_sample_guard() {
        let policy = ThresholdPolicy::new(Thresholds::default(), 3);
        assert_eq!(policy.decide(10.0, 1, High), None);
        assert_eq!(policy.decide(10.0, 2, High), None);
        assert_eq!(policy.decide(10.0, 3, High), Some(Low));
    }

    #[test]
    fn test_guard_disabled() {
        for min_samples in [0, 1] {
            let policy = ThresholdPolicy::new(Thresholds::default(), min_samples);
            assert_eq!(policy.decide(10.0, 1, High), Some(Low));
            assert_eq!(policy.decide(10.0, 0, High), None);
        }
    }

    #[test]
    fn test_custom_thresholds() {
        let policy = ThresholdPolicy::new(
            Thresholds {
                down_low: 20.0,
                down_medium: 100.0,
                up: 110.0,
            },
            1,
        );
        assert_eq!(policy.evaluate(90.0, High), Some(Medium));
        assert_eq!(policy.evaluate(120.0, Medium), Some(High));
    }
}
