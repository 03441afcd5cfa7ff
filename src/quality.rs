use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Rendering fidelity tier. Ordered `Low < Medium < High`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum QualityLevel {
    Low,
    Medium,
    #[default]
    High,
}

impl QualityLevel {
    pub const ALL: [QualityLevel; 3] =
        [QualityLevel::Low, QualityLevel::Medium, QualityLevel::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityLevel::Low => "low",
            QualityLevel::Medium => "medium",
            QualityLevel::High => "high",
        }
    }
}

impl fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(QualityLevel::Low),
            "medium" => Ok(QualityLevel::Medium),
            "high" => Ok(QualityLevel::High),
            other => Err(format!("Unknown quality level '{}'", other)),
        }
    }
}

/// Renderer and animation knobs applied for one quality level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualitySettings {
    /// Shadow map resolution in texels (512, 1024, 2048)
    pub shadow_map_size: u32,

    /// Enable anti-aliasing
    pub antialias: bool,

    /// Enable pointer-driven parallax effects
    pub parallax: bool,

    /// Enable model auto-rotation
    pub auto_rotate: bool,
}

impl QualitySettings {
    pub fn for_level(level: QualityLevel) -> Self {
        match level {
            QualityLevel::Low => Self {
                shadow_map_size: 512,
                antialias: false,
                parallax: false,
                auto_rotate: false,
            },
            QualityLevel::Medium => Self {
                shadow_map_size: 1024,
                antialias: true,
                parallax: true,
                auto_rotate: true,
            },
            QualityLevel::High => Self {
                shadow_map_size: 2048,
                antialias: true,
                parallax: true,
                auto_rotate: true,
            },
        }
    }
}

/// Level-to-settings mapping handed to the governor at construction.
///
/// The governor never looks inside `S`; it only hands out the bundle for the
/// level it switched to.
#[derive(Debug)]
pub struct QualityProfiles<S = QualitySettings> {
    low: Arc<S>,
    medium: Arc<S>,
    high: Arc<S>,
}

impl<S> QualityProfiles<S> {
    pub fn new(low: S, medium: S, high: S) -> Self {
        Self {
            low: Arc::new(low),
            medium: Arc::new(medium),
            high: Arc::new(high),
        }
    }

    /// Build profiles by calling `f` once per level
    pub fn from_fn<F: FnMut(QualityLevel) -> S>(mut f: F) -> Self {
        Self::new(
            f(QualityLevel::Low),
            f(QualityLevel::Medium),
            f(QualityLevel::High),
        )
    }

    pub fn get(&self, level: QualityLevel) -> Arc<S> {
        match level {
            QualityLevel::Low => Arc::clone(&self.low),
            QualityLevel::Medium => Arc::clone(&self.medium),
            QualityLevel::High => Arc::clone(&self.high),
        }
    }
}

impl<S> Clone for QualityProfiles<S> {
    fn clone(&self) -> Self {
        Self {
            low: Arc::clone(&self.low),
            medium: Arc::clone(&self.medium),
            high: Arc::clone(&self.high),
        }
    }
}

impl Default for QualityProfiles<QualitySettings> {
    fn default() -> Self {
        Self::from_fn(QualitySettings::for_level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(QualityLevel::Low < QualityLevel::Medium);
        assert!(QualityLevel::Medium < QualityLevel::High);
        assert_eq!(QualityLevel::ALL.iter().max(), Some(&QualityLevel::High));
    }

    #[test]
    fn test_level_parse_and_display() {
        assert_eq!("Medium".parse::<QualityLevel>(), Ok(QualityLevel::Medium));
        assert_eq!(" low ".parse::<QualityLevel>(), Ok(QualityLevel::Low));
        assert!("ultra".parse::<QualityLevel>().is_err());
        assert_eq!(QualityLevel::High.to_string(), "high");
    }

    #[test]
    fn test_level_serde_lowercase() {
        let json = serde_json::to_string(&QualityLevel::Medium).unwrap();
        assert_eq!(json, "\"medium\"");
        let level: QualityLevel = serde_json::from_str("\"low\"").unwrap();
        assert_eq!(level, QualityLevel::Low);
    }

    #[test]
    fn test_default_profiles() {
        let profiles: QualityProfiles = QualityProfiles::default();

        let low = profiles.get(QualityLevel::Low);
        assert_eq!(low.shadow_map_size, 512);
        assert!(!low.antialias);
        assert!(!low.parallax);
        assert!(!low.auto_rotate);

        assert_eq!(profiles.get(QualityLevel::Medium).shadow_map_size, 1024);
        assert_eq!(profiles.get(QualityLevel::High).shadow_map_size, 2048);
        assert!(profiles.get(QualityLevel::High).antialias);
    }

    #[test]
    fn test_profiles_share_bundles() {
        let profiles = QualityProfiles::new("a", "b", "c");
        let first = profiles.get(QualityLevel::Medium);
        let second = profiles.clone().get(QualityLevel::Medium);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*first, "b");
    }
}
