use super::state_machine::GovernorCore;
use super::handle::{Governor, Shared};
use crate::config::GovernorConfig;
use crate::error::{GovernorError, Result};
use crate::events::EventBus;
use crate::monitor::FrameRateSource;
use crate::policy::{ThresholdPolicy, Thresholds};
use crate::quality::{QualityLevel, QualityProfiles, QualitySettings};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Builder for [`Governor`]
pub struct GovernorBuilder<S = QualitySettings> {
    history_capacity: usize,
    sample_interval: Duration,
    thresholds: Thresholds,
    min_samples: usize,
    initial_level: QualityLevel,
    enabled: bool,
    stall_warning_ticks: u32,
    profiles: QualityProfiles<S>,
    source: Option<Arc<dyn FrameRateSource>>,
    event_bus: Option<Arc<EventBus>>,
}

impl GovernorBuilder<QualitySettings> {
    /// Builder with default parameters and the built-in quality profiles
    pub fn new() -> Self {
        Self::with_profiles(QualityProfiles::default())
    }

    /// Builder preloaded from configuration
    pub fn from_config(config: &GovernorConfig) -> Self {
        let adaptive = &config.adaptive;
        Self::with_profiles(config.profiles.to_profiles())
            .enabled(adaptive.enabled)
            .history_capacity(adaptive.history_capacity)
            .sample_interval(adaptive.sample_interval())
            .min_samples(adaptive.min_samples)
            .initial_level(adaptive.initial_level)
            .stall_warning_ticks(adaptive.stall_warning_ticks)
            .thresholds(config.thresholds)
    }
}

impl Default for GovernorBuilder<QualitySettings> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Send + Sync + 'static> GovernorBuilder<S> {
    /// Builder carrying a caller-supplied level-to-settings mapping
    pub fn with_profiles(profiles: QualityProfiles<S>) -> Self {
        Self {
            history_capacity: 10,
            sample_interval: Duration::from_millis(5000),
            thresholds: Thresholds::default(),
            min_samples: 2,
            initial_level: QualityLevel::High,
            enabled: true,
            stall_warning_ticks: 3,
            profiles,
            source: None,
            event_bus: None,
        }
    }

    pub fn history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    pub fn sample_interval(mut self, interval: Duration) -> Self {
        self.sample_interval = interval;
        self
    }

    pub fn thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Samples required before any transition; 0 or 1 disables the guard
    pub fn min_samples(mut self, min_samples: usize) -> Self {
        self.min_samples = min_samples;
        self
    }

    pub fn initial_level(mut self, level: QualityLevel) -> Self {
        self.initial_level = level;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Consecutive empty ticks before a stall is reported; 0 never reports
    pub fn stall_warning_ticks(mut self, ticks: u32) -> Self {
        self.stall_warning_ticks = ticks;
        self
    }

    pub fn source(mut self, source: Arc<dyn FrameRateSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn build(self) -> Result<Governor<S>> {
        let source = self
            .source
            .ok_or_else(|| GovernorError::system("Frame-rate source must be specified"))?;

        if self.history_capacity == 0 {
            return Err(GovernorError::invalid_config(
                "History capacity must be greater than 0",
            ));
        }

        if self.sample_interval.is_zero() {
            return Err(GovernorError::invalid_config(
                "Sample interval must be greater than 0",
            ));
        }

        if self.min_samples > self.history_capacity {
            return Err(GovernorError::invalid_config(format!(
                "min_samples ({}) cannot exceed history capacity ({})",
                self.min_samples, self.history_capacity
            )));
        }

        let t = self.thresholds;
        if [t.down_low, t.down_medium, t.up]
            .iter()
            .any(|v| !v.is_finite() || *v < 0.0)
        {
            return Err(GovernorError::invalid_config(
                "Thresholds must be non-negative numbers",
            ));
        }
        if t.down_low > t.down_medium || t.up < t.down_medium {
            return Err(GovernorError::invalid_config(
                "Thresholds must satisfy down_low <= down_medium <= up",
            ));
        }

        debug!(
            "Building governor: capacity {}, interval {:?}, min samples {}, initial {}",
            self.history_capacity, self.sample_interval, self.min_samples, self.initial_level
        );

        let core = GovernorCore::new(
            self.initial_level,
            self.history_capacity,
            ThresholdPolicy::new(self.thresholds, self.min_samples),
            self.profiles,
        );

        Ok(Governor {
            shared: Arc::new(Shared::new(
                core,
                self.enabled,
                self.sample_interval,
                self.stall_warning_ticks,
                source,
                self.event_bus,
            )),
        })
    }
}
