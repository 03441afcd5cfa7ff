use crate::error::GovernorError;
use crate::policy::{default_down_low, default_down_medium, default_up, Thresholds};
use crate::quality::{QualityLevel, QualityProfiles, QualitySettings};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct GovernorConfig {
    pub adaptive: AdaptiveConfig,
    pub thresholds: Thresholds,
    pub monitor: MonitorConfig,
    pub profiles: ProfilesConfig,
    pub events: EventConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AdaptiveConfig {
    /// Enable adaptive quality (a disabled governor refuses to start)
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Number of recent samples kept for smoothing
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Milliseconds between sampling ticks
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,

    /// Samples required before any transition (0 or 1 disables the guard)
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,

    /// Level the governor starts at
    #[serde(default)]
    pub initial_level: QualityLevel,

    /// Consecutive empty ticks before the source is reported as stalled
    #[serde(default = "default_stall_warning_ticks")]
    pub stall_warning_ticks: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MonitorConfig {
    /// Frame rate considered excellent
    #[serde(default = "default_target_fps")]
    pub target_fps: f64,

    /// Below this frame rate performance is reported as poor
    #[serde(default = "default_warning_threshold")]
    pub warning_threshold: f64,

    /// Length of one FPS measurement window in milliseconds
    #[serde(default = "default_measurement_window_ms")]
    pub measurement_window_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ProfilesConfig {
    #[serde(default = "default_low_profile")]
    pub low: QualitySettings,

    #[serde(default = "default_medium_profile")]
    pub medium: QualitySettings,

    #[serde(default = "default_high_profile")]
    pub high: QualitySettings,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct EventConfig {
    /// Broadcast channel capacity for governor events
    #[serde(default = "default_bus_capacity")]
    pub bus_capacity: usize,

    /// Log every published event at debug level
    #[serde(default)]
    pub debug_logging: bool,
}

impl GovernorConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("quality-governor.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let mut builder = Config::builder()
            // Start with default values
            .set_default("adaptive.enabled", default_enabled())?
            .set_default(
                "adaptive.history_capacity",
                default_history_capacity() as i64,
            )?
            .set_default(
                "adaptive.sample_interval_ms",
                default_sample_interval_ms() as i64,
            )?
            .set_default("adaptive.min_samples", default_min_samples() as i64)?
            .set_default("adaptive.initial_level", QualityLevel::default().as_str())?
            .set_default(
                "adaptive.stall_warning_ticks",
                default_stall_warning_ticks() as i64,
            )?
            .set_default("thresholds.down_low", default_down_low())?
            .set_default("thresholds.down_medium", default_down_medium())?
            .set_default("thresholds.up", default_up())?
            .set_default("monitor.target_fps", default_target_fps())?
            .set_default("monitor.warning_threshold", default_warning_threshold())?
            .set_default(
                "monitor.measurement_window_ms",
                default_measurement_window_ms() as i64,
            )?
            .set_default("events.bus_capacity", default_bus_capacity() as i64)?
            .set_default("events.debug_logging", false)?;

        for level in QualityLevel::ALL {
            let settings = QualitySettings::for_level(level);
            let key = |field: &str| format!("profiles.{}.{}", level, field);
            builder = builder
                .set_default(key("shadow_map_size"), settings.shadow_map_size as i64)?
                .set_default(key("antialias"), settings.antialias)?
                .set_default(key("parallax"), settings.parallax)?
                .set_default(key("auto_rotate"), settings.auto_rotate)?;
        }

        let settings = builder
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // Environment overrides, e.g. QUALITY_GOVERNOR_ADAPTIVE__MIN_SAMPLES=3
            .add_source(
                Environment::with_prefix("QUALITY_GOVERNOR")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: GovernorConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let adaptive = &self.adaptive;

        if adaptive.history_capacity == 0 {
            return Err(ConfigError::Message(
                "History capacity must be greater than 0".to_string(),
            ));
        }

        if adaptive.sample_interval_ms == 0 {
            return Err(ConfigError::Message(
                "Sample interval must be greater than 0".to_string(),
            ));
        }

        if adaptive.min_samples > adaptive.history_capacity {
            return Err(ConfigError::Message(format!(
                "min_samples ({}) cannot exceed history capacity ({})",
                adaptive.min_samples, adaptive.history_capacity
            )));
        }

        let t = &self.thresholds;
        for (name, value) in [
            ("down_low", t.down_low),
            ("down_medium", t.down_medium),
            ("up", t.up),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Message(format!(
                    "Threshold {} must be a non-negative number",
                    name
                )));
            }
        }

        if t.down_low > t.down_medium {
            return Err(ConfigError::Message(
                "Threshold down_low must not exceed down_medium".to_string(),
            ));
        }

        if t.up < t.down_medium {
            return Err(ConfigError::Message(
                "Threshold up must not be below down_medium".to_string(),
            ));
        }

        if self.monitor.measurement_window_ms == 0 {
            return Err(ConfigError::Message(
                "Monitor measurement window must be greater than 0".to_string(),
            ));
        }

        if self.monitor.warning_threshold > self.monitor.target_fps {
            return Err(ConfigError::Message(
                "Monitor warning threshold must not exceed target fps".to_string(),
            ));
        }

        if self.events.bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String, GovernorError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Parse a configuration from a TOML string without consulting the environment
    pub fn from_toml(source: &str) -> Result<Self, GovernorError> {
        Ok(toml::from_str(source)?)
    }
}

impl AdaptiveConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }
}

impl MonitorConfig {
    pub fn measurement_window(&self) -> Duration {
        Duration::from_millis(self.measurement_window_ms)
    }
}

impl ProfilesConfig {
    pub fn get(&self, level: QualityLevel) -> QualitySettings {
        match level {
            QualityLevel::Low => self.low,
            QualityLevel::Medium => self.medium,
            QualityLevel::High => self.high,
        }
    }

    pub fn to_profiles(&self) -> QualityProfiles<QualitySettings> {
        QualityProfiles::from_fn(|level| self.get(level))
    }
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            history_capacity: default_history_capacity(),
            sample_interval_ms: default_sample_interval_ms(),
            min_samples: default_min_samples(),
            initial_level: QualityLevel::default(),
            stall_warning_ticks: default_stall_warning_ticks(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            target_fps: default_target_fps(),
            warning_threshold: default_warning_threshold(),
            measurement_window_ms: default_measurement_window_ms(),
        }
    }
}

impl Default for ProfilesConfig {
    fn default() -> Self {
        Self {
            low: default_low_profile(),
            medium: default_medium_profile(),
            high: default_high_profile(),
        }
    }
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            bus_capacity: default_bus_capacity(),
            debug_logging: false,
        }
    }
}

// Default value functions
fn default_enabled() -> bool {
    true
}
fn default_history_capacity() -> usize {
    10
}
fn default_sample_interval_ms() -> u64 {
    5000
}
fn default_min_samples() -> usize {
    2
}
fn default_stall_warning_ticks() -> u32 {
    3
}

fn default_target_fps() -> f64 {
    60.0
}
fn default_warning_threshold() -> f64 {
    50.0
}
fn default_measurement_window_ms() -> u64 {
    1000
}

fn default_low_profile() -> QualitySettings {
    QualitySettings::for_level(QualityLevel::Low)
}
fn default_medium_profile() -> QualitySettings {
    QualitySettings::for_level(QualityLevel::Medium)
}
fn default_high_profile() -> QualitySettings {
    QualitySettings::for_level(QualityLevel::High)
}

fn default_bus_capacity() -> usize {
    32
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = GovernorConfig::default();

        assert!(config.validate().is_ok());
        assert!(config.adaptive.enabled);
        assert_eq!(config.adaptive.history_capacity, 10);
        assert_eq!(config.adaptive.sample_interval(), Duration::from_secs(5));
        assert_eq!(config.adaptive.initial_level, QualityLevel::High);
        assert_eq!(config.thresholds.down_low, 30.0);
        assert_eq!(config.thresholds.down_medium, 50.0);
        assert_eq!(config.thresholds.up, 55.0);
        assert_eq!(config.profiles.low.shadow_map_size, 512);
    }

    #[test]
    fn test_config_validation() {
        let mut config = GovernorConfig::default();

        config.adaptive.history_capacity = 0;
        assert!(config.validate().is_err());
        config.adaptive.history_capacity = 10;

        config.adaptive.sample_interval_ms = 0;
        assert!(config.validate().is_err());
        config.adaptive.sample_interval_ms = 5000;

        config.adaptive.min_samples = 11;
        assert!(config.validate().is_err());
        config.adaptive.min_samples = 0;
        assert!(config.validate().is_ok());

        config.thresholds.up = 40.0;
        assert!(config.validate().is_err());
        config.thresholds.up = 55.0;

        config.thresholds.down_low = 60.0;
        assert!(config.validate().is_err());
        config.thresholds.down_low = f64::NAN;
        assert!(config.validate().is_err());
        config.thresholds.down_low = 30.0;

        config.monitor.warning_threshold = 90.0;
        assert!(config.validate().is_err());
        config.monitor.warning_threshold = 50.0;

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        let config = GovernorConfig::load_from_file(&path).unwrap();
        assert_eq!(config, GovernorConfig::default());
    }

    #[test]
    fn test_load_from_file_overrides() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[adaptive]
history_capacity = 4
min_samples = 1
initial_level = "medium"

[thresholds]
up = 70.0

[profiles.low]
shadow_map_size = 256
antialias = false
parallax = false
auto_rotate = false
"#
        )
        .unwrap();

        let config = GovernorConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.adaptive.history_capacity, 4);
        assert_eq!(config.adaptive.min_samples, 1);
        assert_eq!(config.adaptive.initial_level, QualityLevel::Medium);
        assert_eq!(config.adaptive.sample_interval_ms, 5000);
        assert_eq!(config.thresholds.up, 70.0);
        assert_eq!(config.thresholds.down_medium, 50.0);
        assert_eq!(config.profiles.low.shadow_map_size, 256);
        assert_eq!(config.profiles.high.shadow_map_size, 2048);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = GovernorConfig::default();
        config.adaptive.initial_level = QualityLevel::Low;
        config.events.debug_logging = true;

        let rendered = config.to_toml().unwrap();
        assert!(rendered.contains("initial_level = \"low\""));

        let parsed = GovernorConfig::from_toml(&rendered).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_profiles_config_conversion() {
        let mut profiles = ProfilesConfig::default();
        profiles.medium.auto_rotate = false;

        let converted = profiles.to_profiles();
        assert!(!converted.get(QualityLevel::Medium).auto_rotate);
        assert!(converted.get(QualityLevel::High).auto_rotate);
    }
}
