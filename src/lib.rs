pub mod config;
pub mod error;
pub mod events;
pub mod governor;
pub mod history;
pub mod listener;
pub mod monitor;
pub mod policy;
pub mod quality;

pub use config::GovernorConfig;
pub use error::{EventBusError, GovernorError, ListenerError, Result};
pub use events::{EventBus, EventFilter, EventReceiver, GovernorEvent};
pub use governor::{Governor, GovernorBuilder, GovernorCore, GovernorStats, Lifecycle, TickOutcome};
pub use history::{HistoryStats, SampleHistory};
pub use listener::{DeliveryReport, ListenerId, ListenerRegistry, QualityChange, QualityListener};
pub use monitor::{
    FrameMetrics, FrameRateSource, PerformanceMonitor, PerformanceStatus, SampleQueue,
};
pub use policy::{ThresholdPolicy, Thresholds};
pub use quality::{QualityLevel, QualityProfiles, QualitySettings};
