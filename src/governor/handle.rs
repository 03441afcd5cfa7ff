use super::state_machine::GovernorCore;
use super::stats::GovernorStats;
use super::types::Lifecycle;
use crate::config::GovernorConfig;
use crate::error::Result;
use crate::events::EventBus;
use crate::listener::{ListenerId, ListenerRegistry, QualityChange, QualityListener};
use crate::monitor::FrameRateSource;
use crate::quality::{QualityLevel, QualitySettings};
use parking_lot::{Mutex, ReentrantMutex};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

/// Closed-loop quality governor for one rendering surface
///
/// Owns the sampling timer, the state machine and the listener registry.
/// Create one per surface and keep it alive for as long as the surface is
/// mounted; dropping it cancels the timer.
pub struct Governor<S = QualitySettings> {
    pub(super) shared: Arc<Shared<S>>,
}

pub(super) struct Shared<S> {
    pub(super) id: Uuid,
    pub(super) enabled: bool,
    pub(super) sample_interval: Duration,
    pub(super) stall_warning_ticks: u32,
    pub(super) source: Arc<dyn FrameRateSource>,
    pub(super) event_bus: Option<Arc<EventBus>>,
    /// Held for the whole of every tick, start and stop
    pub(super) tick_lock: ReentrantMutex<()>,
    pub(super) state: Mutex<State<S>>,
    pub(super) listeners: Mutex<ListenerRegistry<S>>,
    pub(super) timer: Mutex<Option<JoinHandle<()>>>,
}

pub(super) struct State<S> {
    pub(super) core: GovernorCore<S>,
    pub(super) lifecycle: Lifecycle,
    /// Bumped on every start so a superseded timer task cannot tick
    pub(super) generation: u64,
}

impl<S> Shared<S> {
    pub(super) fn new(
        core: GovernorCore<S>,
        enabled: bool,
        sample_interval: Duration,
        stall_warning_ticks: u32,
        source: Arc<dyn FrameRateSource>,
        event_bus: Option<Arc<EventBus>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            enabled,
            sample_interval,
            stall_warning_ticks,
            source,
            event_bus,
            tick_lock: ReentrantMutex::new(()),
            state: Mutex::new(State {
                core,
                lifecycle: Lifecycle::Uninitialized,
                generation: 0,
            }),
            listeners: Mutex::new(ListenerRegistry::new()),
            timer: Mutex::new(None),
        }
    }
}

impl<S> Drop for Shared<S> {
    fn drop(&mut self) {
        if let Some(task) = self.timer.get_mut().take() {
            task.abort();
            debug!("Governor {} dropped, sampling timer cancelled", self.id);
        }
    }
}

impl Governor<QualitySettings> {
    /// Build a governor from loaded configuration
    pub fn from_config(
        config: &GovernorConfig,
        source: Arc<dyn FrameRateSource>,
    ) -> Result<Self> {
        super::GovernorBuilder::from_config(config)
            .source(source)
            .build()
    }
}

impl<S: Send + Sync + 'static> Governor<S> {
    /// Unique id used in logs and events
    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    pub fn level(&self) -> QualityLevel {
        self.shared.state.lock().core.level()
    }

    /// Settings bundle for the current level
    pub fn settings(&self) -> Arc<S> {
        self.shared.state.lock().core.settings()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.shared.state.lock().lifecycle
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle() == Lifecycle::Running
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.enabled
    }

    pub fn sample_interval(&self) -> Duration {
        self.shared.sample_interval
    }

    /// Smoothed frame rate over the held history
    pub fn average_fps(&self) -> f64 {
        self.shared.state.lock().core.history().average()
    }

    /// Held samples, oldest first
    pub fn history(&self) -> Vec<f64> {
        self.shared.state.lock().core.history().samples()
    }

    pub fn stats(&self) -> GovernorStats {
        self.shared.state.lock().core.stats().clone()
    }

    pub fn event_bus(&self) -> Option<Arc<EventBus>> {
        self.shared.event_bus.clone()
    }

    /// Whether a sampling timer task is currently held
    pub fn has_timer(&self) -> bool {
        self.shared.timer.lock().is_some()
    }

    /// Register a listener; it is called on every level change
    pub fn subscribe(&self, listener: Arc<dyn QualityListener<S>>) -> ListenerId {
        self.shared.listeners.lock().add(listener)
    }

    /// Register a closure listener
    pub fn subscribe_fn<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&QualityChange<S>) + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(listener))
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.shared.listeners.lock().remove(id)
    }

    pub fn listener_count(&self) -> usize {
        self.shared.listeners.lock().len()
    }
}
