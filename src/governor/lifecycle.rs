use super::handle::{Governor, Shared};
use super::types::Lifecycle;
use crate::error::{GovernorError, Result};
use crate::events::GovernorEvent;
use chrono::Utc;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

impl<S: Send + Sync + 'static> Governor<S> {
    /// Begin periodic sampling on the current tokio runtime
    ///
    /// The first tick fires one interval after start. Calling `start` on a
    /// running governor does nothing. History is kept across stop/start.
    pub fn start(&self) -> Result<()> {
        let shared = &self.shared;
        let _tick = shared.tick_lock.lock();

        if !shared.enabled {
            info!("Adaptive quality disabled, governor {} not started", shared.id);
            return Err(GovernorError::Disabled);
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| GovernorError::NoRuntime)?;

        let (generation, level) = {
            let mut state = shared.state.lock();
            if state.lifecycle == Lifecycle::Running {
                debug!("Governor {} is already running", shared.id);
                return Ok(());
            }
            state.lifecycle = Lifecycle::Running;
            state.generation += 1;
            (state.generation, state.core.level())
        };

        let task = runtime.spawn(run_sampling_loop(
            Arc::downgrade(shared),
            shared.sample_interval,
            generation,
        ));

        if let Some(stale) = shared.timer.lock().replace(task) {
            stale.abort();
        }

        info!(
            "Governor {} started at {} quality (sampling every {:?})",
            shared.id, level, shared.sample_interval
        );

        if let Some(bus) = &shared.event_bus {
            bus.publish_best_effort(GovernorEvent::Started {
                governor_id: shared.id,
                level,
                timestamp: Utc::now(),
            });
        }

        Ok(())
    }

    /// Stop periodic sampling
    ///
    /// Waits for an in-flight tick to finish; once this returns no further
    /// tick is processed. Calling `stop` when not running does nothing.
    pub fn stop(&self) {
        let shared = &self.shared;
        let _tick = shared.tick_lock.lock();

        let level = {
            let mut state = shared.state.lock();
            if state.lifecycle != Lifecycle::Running {
                debug!("Governor {} is not running", shared.id);
                return;
            }
            state.lifecycle = Lifecycle::Stopped;
            state.core.level()
        };

        if let Some(task) = shared.timer.lock().take() {
            task.abort();
        }

        info!("Governor {} stopped at {} quality", shared.id, level);

        if let Some(bus) = &shared.event_bus {
            bus.publish_best_effort(GovernorEvent::Stopped {
                governor_id: shared.id,
                level,
                timestamp: Utc::now(),
            });
        }
    }
}

async fn run_sampling_loop<S: Send + Sync + 'static>(
    shared: Weak<Shared<S>>,
    period: Duration,
    generation: u64,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let Some(shared) = shared.upgrade() else {
            break;
        };

        if shared.tick_for_generation(Some(generation)).is_skipped() {
            debug!("Sampling loop for governor {} exiting", shared.id);
            break;
        }
    }
}
