//! Polling admission loop.
//!
//! Each cycle reads the running count, computes free capacity, claims the
//! oldest pending records up to that capacity and hands each claimed record
//! to the spawner. Execution is never awaited by the loop.

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn, Instrument};

use super::error::SchedulerError;
use super::executor::TaskRunner;
use super::store::TaskStore;
use crate::config::SchedulerConfig;

/// Abstraction for spawning task execution on a runtime.
pub trait Spawn {
    /// Spawn a detached future.
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static;
}

/// What one polling cycle observed and did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    /// `Running` records at the start of the cycle.
    pub running: usize,
    /// Free slots, `max_concurrent_tasks - running` floored at zero.
    pub capacity: usize,
    /// `Pending` records seen (zero when no capacity was free).
    pub candidates: usize,
    /// Records claimed and handed to the spawner.
    pub dispatched: usize,
    /// Batch members another claimant took first.
    pub lost_claims: usize,
}

/// The scheduler loop.
pub struct Scheduler<S> {
    config: SchedulerConfig,
    store: Arc<dyn TaskStore>,
    runner: Arc<TaskRunner>,
    spawner: S,
}

impl<S> Scheduler<S>
where
    S: Spawn,
{
    /// Build a scheduler; the runner's store is the one polled.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::InvalidConfig`] if `config` does not validate.
    pub fn new(config: SchedulerConfig, runner: TaskRunner, spawner: S) -> Result<Self, SchedulerError> {
        config.validate().map_err(SchedulerError::InvalidConfig)?;
        Ok(Self {
            store: Arc::clone(runner.store()),
            runner: Arc::new(runner),
            config,
            spawner,
        })
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Run one admission cycle without sleeping.
    ///
    /// # Errors
    ///
    /// Store failures abort the rest of the cycle; records already claimed
    /// in it stay dispatched.
    pub async fn run_cycle(&self) -> Result<CycleReport, SchedulerError> {
        let running = self.store.count_running().await?;
        let capacity = self.config.max_concurrent_tasks.saturating_sub(running);
        let mut report = CycleReport {
            running,
            capacity,
            ..CycleReport::default()
        };
        debug!(running, capacity, "open slots for processes");
        if capacity == 0 {
            return Ok(report);
        }

        let candidates = self.store.list_pending().await?;
        report.candidates = candidates.len();
        if !candidates.is_empty() {
            info!(count = candidates.len().min(capacity), "starting new processes");
        }

        for record in candidates.into_iter().take(capacity) {
            let Some(claimed) = self.runner.try_claim(&record).await? else {
                report.lost_claims += 1;
                continue;
            };
            let runner = Arc::clone(&self.runner);
            let task_id = claimed.id;
            self.spawner.spawn(
                async move {
                    if let Err(err) = runner.execute(claimed).await {
                        warn!(task_id, error = %err, "task execution ended with a store error");
                    }
                }
                .in_current_span(),
            );
            report.dispatched += 1;
        }
        Ok(report)
    }

    /// Poll until `signal` resolves, surfacing a listener failure.
    ///
    /// A signal that fails on its first poll (e.g. the handler could not be
    /// installed) returns before any cycle runs, so nothing gets claimed.
    ///
    /// # Errors
    ///
    /// Whatever error `signal` resolves to.
    pub async fn run_until_signal<F, E>(&self, signal: F) -> Result<(), E>
    where
        F: Future<Output = Result<(), E>>,
    {
        let mut signal = std::pin::pin!(signal);
        if let Some(early) = signal.as_mut().now_or_never() {
            early?;
            return Ok(());
        }
        let mut outcome = Ok(());
        self.run_until(async {
            outcome = signal.await;
        })
        .await;
        outcome
    }

    /// Poll until `shutdown` resolves.
    ///
    /// A failed cycle is logged and retried after the next sleep. Shutdown
    /// stops the loop at its next suspension point and does not wait for
    /// in-flight executions.
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let log_name = self.config.logging.log_name.as_deref().unwrap_or("process_server");
        let span = info_span!("scheduler", log_name);
        async {
            let mut shutdown = std::pin::pin!(shutdown);
            info!(
                max_concurrent_tasks = self.config.max_concurrent_tasks,
                poll_interval_secs = self.config.poll_interval_secs,
                "starting processing loop"
            );
            loop {
                match self.run_cycle().await {
                    Ok(report) => debug!(?report, "cycle finished"),
                    Err(err) => warn!(error = %err, "cycle failed; retrying on next poll"),
                }
                tokio::select! {
                    () = shutdown.as_mut() => {
                        info!("shutdown requested; leaving processing loop");
                        break;
                    }
                    () = tokio::time::sleep(self.config.poll_interval()) => {}
                }
            }
        }
        .instrument(span)
        .await;
    }
}
