//! Cron-driven tick loop
//!
//! Runs one job sequentially on every fire time of a [`CronSchedule`] until a
//! shutdown signal arrives. A tick that overruns the next fire time is never
//! run concurrently or queued: the missed fire times are skipped and the loop
//! waits for the first fire time after the job finished.

use super::CronSchedule;
use crate::health::{components, HealthRegistry};
use crate::observability::ChaosMetrics;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Source of wall-clock time for computing fire times
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Work invoked on every scheduler tick
#[async_trait]
pub trait ScheduledJob: Send {
    /// Run one tick. `fired_at` is the scheduled fire time.
    async fn on_tick(&mut self, fired_at: DateTime<Utc>);
}

/// Blocking cron scheduler for a single job
pub struct CronScheduler {
    schedule: CronSchedule,
    clock: Arc<dyn Clock>,
    health: Option<HealthRegistry>,
    metrics: ChaosMetrics,
}

impl CronScheduler {
    pub fn new(schedule: CronSchedule) -> Self {
        Self {
            schedule,
            clock: Arc::new(SystemClock),
            health: None,
            metrics: ChaosMetrics::new(),
        }
    }

    /// Replace the wall clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Report liveness and the last fire time to a health registry
    pub fn with_health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    pub fn schedule(&self) -> &CronSchedule {
        &self.schedule
    }

    /// Run `job` on every fire time until `shutdown` fires or is closed.
    ///
    /// Returns the number of ticks that were started.
    pub async fn run<J: ScheduledJob>(
        &self,
        job: &mut J,
        mut shutdown: broadcast::Receiver<()>,
    ) -> u64 {
        info!(schedule = %self.schedule, "Starting cron scheduler");
        if let Some(health) = &self.health {
            health.set_healthy(components::SCHEDULER).await;
        }

        let mut ticks = 0u64;
        let mut last_fired: Option<DateTime<Utc>> = None;

        loop {
            let now = self.clock.now();
            let reference = match last_fired {
                Some(last) if last > now => last,
                _ => now,
            };

            let Some(next) = self.schedule.next_after(&reference) else {
                warn!(schedule = %self.schedule, "Schedule has no upcoming fire times");
                if let Some(health) = &self.health {
                    health
                        .set_unhealthy(components::SCHEDULER, "no upcoming fire times")
                        .await;
                }
                break;
            };

            let delay = (next - now).to_std().unwrap_or_default();
            debug!(next = %next, delay_secs = delay.as_secs(), "Waiting for next fire time");

            tokio::select! {
                _ = sleep(delay) => {}
                _ = shutdown.recv() => {
                    info!("Shutting down cron scheduler");
                    break;
                }
            }

            ticks += 1;
            last_fired = Some(next);
            self.metrics.inc_ticks();
            if let Some(health) = &self.health {
                health.record_tick(next.timestamp()).await;
            }

            tokio::select! {
                _ = job.on_tick(next) => {}
                _ = shutdown.recv() => {
                    info!(fired_at = %next, "Shutting down cron scheduler during tick");
                    break;
                }
            }

            let finished = self.clock.now();
            let missed = self.schedule.fires_between(&next, &finished);
            if missed > 0 {
                warn!(
                    fired_at = %next,
                    finished_at = %finished,
                    missed = missed,
                    "Tick overran the schedule, skipping missed fire times"
                );
                self.metrics.inc_ticks_skipped(missed);
            }
        }

        ticks
    }
}
