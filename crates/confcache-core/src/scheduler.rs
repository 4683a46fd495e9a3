//! Periodic trigger for background refresh sweeps.
//!
//! The scheduler knows nothing about caches. It owns one background loop that
//! invokes a task once per interval and survives panics inside that task.

use crate::error::SchedulerError;
use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

type Task = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Longest accepted tick period; longer requests are clamped to it.
pub const MAX_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Created,
    Running,
    Stopped,
}

/// Cancellable periodic trigger with a runtime-adjustable interval.
pub struct RefreshScheduler {
    /// The work to run on every tick.
    task: Task,
    /// Current tick period; the loop watches it for resets.
    interval_tx: watch::Sender<Duration>,
    /// Stops the loop.
    cancel: CancellationToken,
    /// Created, running or stopped.
    state: Mutex<Lifecycle>,
}

impl fmt::Debug for RefreshScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshScheduler")
            .field("interval", &self.interval())
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

impl RefreshScheduler {
    /// Creates a scheduler without starting it.
    ///
    /// # Arguments
    /// * `interval` - Time between two task invocations, clamped to [`MAX_INTERVAL`]
    /// * `task` - Async work to run on every tick
    ///
    /// # Errors
    /// Returns `SchedulerError::InvalidInterval` if `interval` is zero.
    pub fn new<F, Fut>(interval: Duration, task: F) -> Result<Self, SchedulerError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (interval_tx, _) = watch::channel(checked_interval(interval)?);
        Ok(Self {
            task: Arc::new(move || task().boxed()),
            interval_tx,
            cancel: CancellationToken::new(),
            state: Mutex::new(Lifecycle::Created),
        })
    }

    /// Spawns the background loop on the current Tokio runtime.
    ///
    /// The first tick fires one interval after this call. Each invocation runs
    /// in its own task; a panic is logged and the next tick still fires.
    ///
    /// # Errors
    /// Returns `SchedulerError` if the scheduler is already running or was stopped.
    pub fn start(&self) -> Result<(), SchedulerError> {
        {
            let mut state = self.state.lock();
            match *state {
                Lifecycle::Running => return Err(SchedulerError::AlreadyStarted),
                Lifecycle::Stopped => return Err(SchedulerError::Stopped),
                Lifecycle::Created => *state = Lifecycle::Running,
            }
        }

        let task = Arc::clone(&self.task);
        let cancel = self.cancel.clone();
        let mut interval_rx = self.interval_tx.subscribe();

        tokio::spawn(async move {
            let mut period = *interval_rx.borrow_and_update();
            let mut ticker = new_ticker(period);
            info!(interval_ms = period.as_millis() as u64, "Refresh scheduler started");

            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    changed = interval_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        period = *interval_rx.borrow_and_update();
                        ticker = new_ticker(period);
                        debug!(interval_ms = period.as_millis() as u64, "Refresh interval reset");
                    }
                    _ = ticker.tick() => {
                        run_supervised(&task).await;
                    }
                }
            }

            info!("Refresh scheduler stopped");
        });

        Ok(())
    }

    /// Halts future ticks.
    ///
    /// Does not wait for, or cancel, an invocation that is already running.
    pub fn stop(&self) {
        *self.state.lock() = Lifecycle::Stopped;
        self.cancel.cancel();
    }

    /// Changes the tick period and returns the previous one.
    ///
    /// The next tick fires one new interval after the reset.
    ///
    /// # Errors
    /// Returns `SchedulerError::InvalidInterval` if `interval` is zero; the
    /// current period is kept.
    pub fn reset(&self, interval: Duration) -> Result<Duration, SchedulerError> {
        Ok(self.interval_tx.send_replace(checked_interval(interval)?))
    }

    /// Current tick period.
    pub fn interval(&self) -> Duration {
        *self.interval_tx.borrow()
    }

    /// Whether the background loop has been started and not stopped.
    pub fn is_running(&self) -> bool {
        *self.state.lock() == Lifecycle::Running
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn checked_interval(interval: Duration) -> Result<Duration, SchedulerError> {
    if interval.is_zero() {
        return Err(SchedulerError::InvalidInterval);
    }
    if interval > MAX_INTERVAL {
        warn!(
            requested_secs = interval.as_secs(),
            max_secs = MAX_INTERVAL.as_secs(),
            "Refresh interval too long, clamping"
        );
        return Ok(MAX_INTERVAL);
    }
    Ok(interval)
}

fn new_ticker(period: Duration) -> Interval {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

/// Runs one invocation in its own task so a panic ends that task, not the loop.
async fn run_supervised(task: &Task) {
    let task = Arc::clone(task);
    if let Err(e) = tokio::spawn(async move { task().await }).await {
        if e.is_panic() {
            error!(error = %e, "Scheduled task panicked");
        } else {
            warn!(error = %e, "Scheduled task was cancelled");
        }
    }
}
