use crate::config::EventConfig;
use crate::error::EventBusError;
use crate::quality::QualityLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};
use uuid::Uuid;

/// Events published by a governor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GovernorEvent {
    /// The quality level changed
    QualityChanged {
        governor_id: Uuid,
        previous: QualityLevel,
        level: QualityLevel,
        average_fps: f64,
        timestamp: DateTime<Utc>,
    },
    /// Periodic sampling started
    Started {
        governor_id: Uuid,
        level: QualityLevel,
        timestamp: DateTime<Utc>,
    },
    /// Periodic sampling stopped
    Stopped {
        governor_id: Uuid,
        level: QualityLevel,
        timestamp: DateTime<Utc>,
    },
    /// The frame-rate source produced nothing for several ticks in a row
    SourceStalled {
        governor_id: Uuid,
        empty_ticks: u32,
        timestamp: DateTime<Utc>,
    },
}

impl GovernorEvent {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            GovernorEvent::QualityChanged { timestamp, .. }
            | GovernorEvent::Started { timestamp, .. }
            | GovernorEvent::Stopped { timestamp, .. }
            | GovernorEvent::SourceStalled { timestamp, .. } => *timestamp,
        }
    }

    pub fn governor_id(&self) -> Uuid {
        match self {
            GovernorEvent::QualityChanged { governor_id, .. }
            | GovernorEvent::Started { governor_id, .. }
            | GovernorEvent::Stopped { governor_id, .. }
            | GovernorEvent::SourceStalled { governor_id, .. } => *governor_id,
        }
    }

    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            GovernorEvent::QualityChanged {
                previous,
                level,
                average_fps,
                ..
            } => format!(
                "Quality adjusted from {} to {} (avg {:.1} fps)",
                previous, level, average_fps
            ),
            GovernorEvent::Started { level, .. } => {
                format!("Governor started at {} quality", level)
            }
            GovernorEvent::Stopped { level, .. } => {
                format!("Governor stopped at {} quality", level)
            }
            GovernorEvent::SourceStalled { empty_ticks, .. } => {
                format!("Frame-rate source silent for {} ticks", empty_ticks)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            GovernorEvent::QualityChanged { .. } => "quality_changed",
            GovernorEvent::Started { .. } => "started",
            GovernorEvent::Stopped { .. } => "stopped",
            GovernorEvent::SourceStalled { .. } => "source_stalled",
        }
    }
}

/// Broadcast bus for asynchronous consumers of governor events
///
/// Listeners registered on a governor run synchronously inside the tick;
/// the bus is the decoupled path for tasks that only need to observe.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<GovernorEvent>,
    log_events: bool,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            log_events: false,
        }
    }

    /// Bus sized and logged according to the `[events]` section
    pub fn from_config(config: &EventConfig) -> Self {
        Self {
            log_events: config.debug_logging,
            ..Self::new(config.bus_capacity)
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GovernorEvent> {
        self.sender.subscribe()
    }

    /// Subscribe with a filter applied on receive
    pub fn subscribe_filtered<S: Into<String>>(
        &self,
        filter: EventFilter,
        name: S,
    ) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
            filter,
            name: name.into(),
        }
    }

    /// Publish to every receiver. Returns how many received it; fails when
    /// nobody is subscribed.
    pub fn publish(&self, event: GovernorEvent) -> Result<usize, EventBusError> {
        if self.log_events {
            debug!(event = event.event_type(), "{}", event.description());
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    /// Governor-side publish: an empty bus is normal, not a failure
    pub(crate) fn publish_best_effort(&self, event: GovernorEvent) {
        if let Err(e) = self.publish(event) {
            trace!("Governor event dropped: {}", e);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn has_subscribers(&self) -> bool {
        self.subscriber_count() > 0
    }
}

/// Which events an [`EventReceiver`] passes through
#[derive(Debug, Clone)]
pub enum EventFilter {
    All,
    /// Only these `event_type()` names
    EventTypes(Vec<&'static str>),
    /// Only events from one governor
    Governor(Uuid),
}

impl EventFilter {
    pub fn matches(&self, event: &GovernorEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
            EventFilter::Governor(id) => event.governor_id() == *id,
        }
    }
}

/// Named broadcast receiver that skips events its filter rejects
pub struct EventReceiver {
    receiver: broadcast::Receiver<GovernorEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wait for the next matching event
    pub async fn recv(&mut self) -> Result<GovernorEvent, EventBusError> {
        loop {
            let event = match self.receiver.recv().await {
                Ok(event) => event,
                Err(e) => return Err(self.receive_failed(e.into())),
            };
            if self.filter.matches(&event) {
                return Ok(event);
            }
        }
    }

    /// Next matching event already queued, or `None`
    pub fn try_recv(&mut self) -> Result<Option<GovernorEvent>, EventBusError> {
        loop {
            let error = match self.receiver.try_recv() {
                Ok(event) if self.filter.matches(&event) => return Ok(Some(event)),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    EventBusError::Lagged { skipped }
                }
                Err(broadcast::error::TryRecvError::Closed) => EventBusError::ChannelClosed,
            };
            return Err(self.receive_failed(error));
        }
    }

    fn receive_failed(&self, error: EventBusError) -> EventBusError {
        match &error {
            EventBusError::Lagged { .. } => warn!("Receiver '{}': {}", self.name, error),
            _ => debug!("Receiver '{}': {}", self.name, error),
        }
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    fn changed(governor_id: Uuid) -> GovernorEvent {
        GovernorEvent::QualityChanged {
            governor_id,
            previous: QualityLevel::High,
            level: QualityLevel::Medium,
            average_fps: 45.0,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_event_bus_publish_subscribe() {
        let bus = EventBus::new(10);
        let mut receiver = bus.subscribe();
        let id = Uuid::new_v4();

        assert_eq!(bus.publish(changed(id)).unwrap(), 1);

        let event = timeout(Duration::from_millis(100), receiver.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.event_type(), "quality_changed");
        assert_eq!(event.governor_id(), id);
    }

    #[test]
    fn test_publish_without_subscribers_fails() {
        let bus = EventBus::new(4);
        assert!(!bus.has_subscribers());
        assert!(matches!(
            bus.publish(changed(Uuid::new_v4())),
            Err(EventBusError::PublishFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_filtered_receiver() {
        let bus = EventBus::new(10);
        let mut receiver = bus.subscribe_filtered(
            EventFilter::EventTypes(vec!["stopped"]),
            "stop-watcher",
        );
        let id = Uuid::new_v4();

        bus.publish(changed(id)).unwrap();
        bus.publish(GovernorEvent::Stopped {
            governor_id: id,
            level: QualityLevel::Medium,
            timestamp: Utc::now(),
        })
        .unwrap();

        let event = timeout(Duration::from_millis(100), receiver.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.event_type(), "stopped");
        assert_eq!(receiver.try_recv().unwrap(), None);
    }

    #[test]
    fn test_bus_from_config() {
        let config = EventConfig {
            bus_capacity: 2,
            debug_logging: true,
        };
        let bus = EventBus::from_config(&config);
        let mut receiver = bus.subscribe_filtered(EventFilter::All, "small");
        assert_eq!(receiver.name(), "small");
        assert_eq!(bus.subscriber_count(), 1);

        for _ in 0..3 {
            bus.publish(changed(Uuid::new_v4())).unwrap();
        }
        // Capacity two: the oldest of three events was overwritten
        assert!(matches!(
            receiver.try_recv(),
            Err(EventBusError::Lagged { skipped: 1 })
        ));
        assert!(receiver.try_recv().unwrap().is_some());
    }

    #[test]
    fn test_governor_filter() {
        let mine = Uuid::new_v4();
        let filter = EventFilter::Governor(mine);
        assert!(filter.matches(&changed(mine)));
        assert!(!filter.matches(&changed(Uuid::new_v4())));
    }

    #[test]
    fn test_event_description() {
        let event = changed(Uuid::new_v4());
        assert_eq!(
            event.description(),
            "Quality adjusted from high to medium (avg 45.0 fps)"
        );

        let stalled = GovernorEvent::SourceStalled {
            governor_id: Uuid::new_v4(),
            empty_ticks: 3,
            timestamp: Utc::now(),
        };
        assert_eq!(stalled.event_type(), "source_stalled");
    }
}
