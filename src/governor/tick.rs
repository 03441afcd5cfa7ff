use super::handle::{Governor, Shared};
use super::types::{Lifecycle, TickOutcome};
use crate::events::GovernorEvent;
use crate::listener::notify_all;
use chrono::Utc;
use tracing::{debug, warn};

impl<S: Send + Sync + 'static> Governor<S> {
    /// Run one sampling cycle now
    ///
    /// Pulls a sample from the source, records it and applies the policy.
    /// Returns [`TickOutcome::Skipped`] unless the governor is running.
    pub fn tick(&self) -> TickOutcome<S> {
        self.shared.tick_for_generation(None)
    }
}

impl<S> Shared<S> {
    /// `generation` is set by timer tasks; manual ticks pass `None`
    pub(super) fn tick_for_generation(&self, generation: Option<u64>) -> TickOutcome<S> {
        let _tick = self.tick_lock.lock();

        {
            let state = self.state.lock();
            if state.lifecycle != Lifecycle::Running {
                return TickOutcome::Skipped;
            }
            if generation.is_some_and(|g| g != state.generation) {
                return TickOutcome::Skipped;
            }
        }

        let sample = self.source.sample();

        let outcome = {
            let mut state = self.state.lock();
            match sample {
                Some(fps) => state.core.process_sample(fps),
                None => TickOutcome::NoSample {
                    consecutive: state.core.record_empty_tick(),
                },
            }
        };

        match &outcome {
            TickOutcome::NoSample { consecutive } => self.report_missing_sample(*consecutive),
            TickOutcome::Evaluated {
                change: Some(change),
                ..
            } => {
                // Listeners run without the state lock so they may query the governor
                let listeners = self.listeners.lock().snapshot();
                let report = notify_all(&listeners, change);
                if report.failed > 0 {
                    warn!(
                        "Governor {}: {} of {} listeners failed on change to {}",
                        self.id,
                        report.failed,
                        listeners.len(),
                        change.level
                    );
                }

                if let Some(bus) = &self.event_bus {
                    bus.publish_best_effort(GovernorEvent::QualityChanged {
                        governor_id: self.id,
                        previous: change.previous,
                        level: change.level,
                        average_fps: change.average_fps,
                        timestamp: change.changed_at,
                    });
                }
            }
            _ => {}
        }

        outcome
    }

    fn report_missing_sample(&self, consecutive: u32) {
        debug!(
            "Governor {}: no frame-rate sample available ({} in a row)",
            self.id, consecutive
        );

        if self.stall_warning_ticks == 0 || consecutive != self.stall_warning_ticks {
            return;
        }

        warn!(
            "Governor {}: frame-rate source silent for {} ticks",
            self.id, consecutive
        );

        if let Some(bus) = &self.event_bus {
            bus.publish_best_effort(GovernorEvent::SourceStalled {
                governor_id: self.id,
                empty_ticks: consecutive,
                timestamp: Utc::now(),
            });
        }
    }
}
