//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Periodic per-asset measurement loop."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use vasset_rt::{ContextError, RateLimiter, RunContext};
use vasset_sim::{EnergyType, MeasurementGenerator, MIN_MEASUREMENT_INTERVAL};

use crate::errors::{PublishError, RunnerError};
use crate::publisher::Publisher;

/// Upper bound for a single publish call.
pub const PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Created,
    Running,
    Stopped,
}

/// Drives one generator on a fixed interval and publishes every measurement.
///
/// A runner runs at most once. Restarting an asset means building a new runner.
pub struct Runner {
    id: String,
    interval: Duration,
    energy_type: EnergyType,
    generator: Mutex<Box<dyn MeasurementGenerator>>,
    publisher: Arc<dyn Publisher>,
    stop: CancellationToken,
    state: watch::Sender<RunnerState>,
}

impl Runner {
    pub fn new(
        id: impl Into<String>,
        interval: Duration,
        generator: Box<dyn MeasurementGenerator>,
        publisher: Arc<dyn Publisher>,
    ) -> Result<Self, RunnerError> {
        Self::builder()
            .id(id)
            .interval(interval)
            .generator(generator)
            .publisher(publisher)
            .build()
    }

    pub fn builder() -> RunnerBuilder {
        RunnerBuilder::default()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn energy_type(&self) -> EnergyType {
        self.energy_type
    }

    pub fn state(&self) -> RunnerState {
        *self.state.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.state() == RunnerState::Running
    }

    /// Run the measurement loop until stopped or the context is done.
    ///
    /// Cancellation of `ctx` is a normal shutdown; an expired deadline is
    /// returned as [`RunnerError::DeadlineExceeded`].
    pub async fn start(&self, ctx: &RunContext) -> Result<(), RunnerError> {
        let mut observed = RunnerState::Created;
        self.state.send_if_modified(|state| {
            observed = *state;
            if *state == RunnerState::Created {
                *state = RunnerState::Running;
                true
            } else {
                false
            }
        });
        match observed {
            RunnerState::Created => {}
            RunnerState::Running => return Err(RunnerError::AlreadyRunning(self.id.clone())),
            RunnerState::Stopped => {
                debug!(asset_id = %self.id, "runner already stopped; not starting");
                return Ok(());
            }
        }

        let _running = RunningGuard { runner: self };
        info!(
            asset_id = %self.id,
            energy_type = %self.energy_type,
            interval_ms = self.interval.as_millis() as u64,
            "runner started"
        );

        let mut limiter = RateLimiter::new(self.interval);
        let result = loop {
            tokio::select! {
                biased;
                _ = self.stop.cancelled() => break Ok(()),
                reason = ctx.done() => {
                    break match reason {
                        ContextError::Cancelled => Ok(()),
                        ContextError::DeadlineExceeded => {
                            Err(RunnerError::DeadlineExceeded(self.id.clone()))
                        }
                    };
                }
                _ = limiter.tick() => self.tick(ctx).await,
            }
        };

        match &result {
            Ok(()) => info!(asset_id = %self.id, "runner stopped"),
            Err(err) => warn!(asset_id = %self.id, error = %err, "runner terminated"),
        }
        result
    }

    /// Request the loop to exit. Safe to call any number of times.
    ///
    /// A runner stopped before it was started never runs.
    pub fn stop(&self) {
        self.stop.cancel();
        self.state.send_if_modified(|state| {
            if *state == RunnerState::Created {
                *state = RunnerState::Stopped;
                true
            } else {
                false
            }
        });
    }

    /// Resolves once the runner is not inside its loop.
    pub async fn wait_idle(&self) {
        let mut state = self.state.subscribe();
        let idle = state
            .wait_for(|state| *state != RunnerState::Running)
            .await
            .is_ok();
        if !idle {
            trace!(asset_id = %self.id, "runner state channel closed");
        }
    }

    async fn tick(&self, ctx: &RunContext) {
        let generated = self.generator.lock().generate_measurement();
        let measurement = match generated {
            Ok(measurement) => measurement,
            Err(err) => {
                warn!(asset_id = %self.id, error = %err, "measurement generation failed; skipping tick");
                return;
            }
        };

        let budget = ctx
            .remaining()
            .map_or(PUBLISH_TIMEOUT, |remaining| remaining.min(PUBLISH_TIMEOUT));
        let outcome =
            tokio::time::timeout(budget, self.publisher.publish(&measurement, &self.id)).await;
        let err = match outcome {
            Ok(Ok(())) => {
                trace!(
                    asset_id = %self.id,
                    power_w = measurement.power.value,
                    state_of_energy = measurement.state_of_energy,
                    "measurement published"
                );
                return;
            }
            Ok(Err(err)) => err,
            Err(_) => PublishError::Timeout(budget),
        };
        warn!(
            asset_id = %self.id,
            publisher = self.publisher.name(),
            error = %err,
            "failed to publish measurement"
        );
    }
}

impl fmt::Debug for Runner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runner")
            .field("id", &self.id)
            .field("interval", &self.interval)
            .field("energy_type", &self.energy_type)
            .field("publisher", &self.publisher.name())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Marks the runner stopped when the loop exits, including on panic.
struct RunningGuard<'a> {
    runner: &'a Runner,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.runner.stop.cancel();
        self.runner.state.send_replace(RunnerState::Stopped);
    }
}

#[derive(Default)]
pub struct RunnerBuilder {
    id: Option<String>,
    interval: Option<Duration>,
    generator: Option<Box<dyn MeasurementGenerator>>,
    publisher: Option<Arc<dyn Publisher>>,
}

impl RunnerBuilder {
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn generator(mut self, generator: Box<dyn MeasurementGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn build(self) -> Result<Runner, RunnerError> {
        let generator = self.generator.ok_or(RunnerError::MissingGenerator)?;
        let publisher = self.publisher.ok_or(RunnerError::MissingPublisher)?;
        let interval = self.interval.unwrap_or_default();
        if interval <= MIN_MEASUREMENT_INTERVAL {
            return Err(RunnerError::IntervalTooShort {
                interval,
                minimum: MIN_MEASUREMENT_INTERVAL,
            });
        }
        let id = self.id.unwrap_or_default();
        if id.trim().is_empty() {
            return Err(RunnerError::EmptyId);
        }

        let (state, _) = watch::channel(RunnerState::Created);
        Ok(Runner {
            id,
            interval,
            energy_type: generator.energy_type(),
            generator: Mutex::new(generator),
            publisher,
            stop: CancellationToken::new(),
            state,
        })
    }
}

impl fmt::Debug for RunnerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunnerBuilder")
            .field("id", &self.id)
            .field("interval", &self.interval)
            .field("generator", &self.generator.is_some())
            .field("publisher", &self.publisher.as_ref().map(|p| p.name()))
            .finish()
    }
}
