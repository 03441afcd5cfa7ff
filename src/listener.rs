use crate::error::ListenerError;
use crate::quality::{QualityLevel, QualitySettings};
use chrono::{DateTime, Utc};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{trace, warn};

/// A completed level transition
#[derive(Debug)]
pub struct QualityChange<S = QualitySettings> {
    pub previous: QualityLevel,
    pub level: QualityLevel,
    /// Settings bundle for `level`
    pub settings: Arc<S>,
    /// Smoothed frame rate that triggered the change
    pub average_fps: f64,
    pub changed_at: DateTime<Utc>,
}

impl<S> Clone for QualityChange<S> {
    fn clone(&self) -> Self {
        Self {
            previous: self.previous,
            level: self.level,
            settings: Arc::clone(&self.settings),
            average_fps: self.average_fps,
            changed_at: self.changed_at,
        }
    }
}

impl<S> QualityChange<S> {
    pub fn is_downgrade(&self) -> bool {
        self.level < self.previous
    }
}

/// Observer notified synchronously on every level change
pub trait QualityListener<S = QualitySettings>: Send + Sync {
    fn on_quality_change(&self, change: &QualityChange<S>) -> Result<(), ListenerError>;

    /// Name used in logs when this listener fails
    fn name(&self) -> &str {
        "anonymous"
    }
}

impl<S, F> QualityListener<S> for F
where
    F: Fn(&QualityChange<S>) + Send + Sync,
{
    fn on_quality_change(&self, change: &QualityChange<S>) -> Result<(), ListenerError> {
        self(change);
        Ok(())
    }
}

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// Outcome of delivering one change to every listener
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Ordered set of listeners
pub struct ListenerRegistry<S = QualitySettings> {
    listeners: Vec<(ListenerId, Arc<dyn QualityListener<S>>)>,
    next_id: u64,
}

impl<S> ListenerRegistry<S> {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
            next_id: 0,
        }
    }

    pub fn add(&mut self, listener: Arc<dyn QualityListener<S>>) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        trace!("Registered quality listener '{}' as {:?}", listener.name(), id);
        self.listeners.push((id, listener));
        id
    }

    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        before != self.listeners.len()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Cheap copy of the current listeners, in registration order
    pub fn snapshot(&self) -> Vec<Arc<dyn QualityListener<S>>> {
        self.listeners
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect()
    }
}

impl<S> Default for ListenerRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Deliver `change` to each listener in order.
///
/// A listener that returns an error or panics is logged and skipped; the
/// remaining listeners still receive the change.
pub fn notify_all<S>(
    listeners: &[Arc<dyn QualityListener<S>>],
    change: &QualityChange<S>,
) -> DeliveryReport {
    let mut report = DeliveryReport::default();

    for listener in listeners {
        let outcome = catch_unwind(AssertUnwindSafe(|| listener.on_quality_change(change)));
        match outcome {
            Ok(Ok(())) => report.delivered += 1,
            Ok(Err(e)) => {
                warn!("Quality listener '{}' failed: {}", listener.name(), e);
                report.failed += 1;
            }
            Err(payload) => {
                warn!(
                    "Quality listener '{}' panicked: {}",
                    listener.name(),
                    panic_message(payload.as_ref())
                );
                report.failed += 1;
            }
        }
    }

    report
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
