//! Review interval controller: decides when a review runs and guarantees at
//! most one run is in flight.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::application::orchestrator::{ReviewOrchestrator, ReviewRequest, RunProgress, RunReport};
use crate::domain::error::ReviewError;
use crate::domain::values::review::ReviewType;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Runs exceeding this wall-clock duration are force-failed.
    pub max_run_duration: Duration,
    /// Interval used when a run ends without having assessed the market.
    pub fallback_interval_minutes: u32,
    pub tick_every: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_run_duration: Duration::from_secs(15 * 60),
            fallback_interval_minutes: 60,
            tick_every: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveRun {
    pub review_type: ReviewType,
    pub started_at: DateTime<Utc>,
}

/// Scheduling state owned by one controller. `active` is the run lock.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SchedulerState {
    pub last_run_at: Option<DateTime<Utc>>,
    /// `None` until the first run finishes, meaning due immediately.
    pub next_due_at: Option<DateTime<Utc>>,
    pub active: Option<ActiveRun>,
    pub last_interval_minutes: Option<u32>,
    pub runs_started: u64,
}

impl SchedulerState {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_due_at.map_or(true, |due| now >= due)
    }

    pub fn is_busy(&self) -> bool {
        self.active.is_some()
    }

    pub fn try_acquire(&mut self, review_type: ReviewType, now: DateTime<Utc>) -> Result<(), ReviewError> {
        if self.is_busy() {
            return Err(ReviewError::LockBusy);
        }
        self.active = Some(ActiveRun {
            review_type,
            started_at: now,
        });
        self.runs_started += 1;
        Ok(())
    }

    /// Release the lock and schedule the next run `interval_minutes` after completion.
    pub fn release(&mut self, completed_at: DateTime<Utc>, interval_minutes: u32) {
        self.active = None;
        self.last_run_at = Some(completed_at);
        self.last_interval_minutes = Some(interval_minutes);
        self.next_due_at = Some(completed_at + chrono::Duration::minutes(i64::from(interval_minutes)));
    }
}

pub enum TickOutcome {
    Started(RunHandle),
    NotDue { next_due_at: DateTime<Utc> },
    Busy,
}

/// A run executing on its own task.
pub struct RunHandle {
    pub review_type: ReviewType,
    join: JoinHandle<Result<RunReport, ReviewError>>,
}

impl RunHandle {
    pub async fn wait(self) -> Result<RunReport, ReviewError> {
        self.join
            .await
            .map_err(|e| ReviewError::Fatal(format!("review task failed: {e}")))?
    }
}

/// Releases the run lock when dropped, including while a panicking task unwinds.
struct LockGuard {
    state: Arc<Mutex<SchedulerState>>,
    interval_minutes: Option<u32>,
    fallback_minutes: u32,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let interval = self.interval_minutes.unwrap_or(self.fallback_minutes);
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.release(Utc::now(), interval);
        debug!(interval_minutes = interval, next_due_at = ?state.next_due_at, "Run lock released");
    }
}

pub struct ReviewIntervalController {
    orchestrator: Arc<ReviewOrchestrator>,
    state: Arc<Mutex<SchedulerState>>,
    config: SchedulerConfig,
}

impl ReviewIntervalController {
    pub fn new(orchestrator: Arc<ReviewOrchestrator>, config: SchedulerConfig) -> Self {
        Self::with_state(orchestrator, config, SchedulerState::default())
    }

    pub fn with_state(orchestrator: Arc<ReviewOrchestrator>, config: SchedulerConfig, state: SchedulerState) -> Self {
        Self {
            orchestrator,
            state: Arc::new(Mutex::new(state)),
            config,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.lock_state().clone()
    }

    fn lock_state(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a scheduled run if idle and due. Never blocks on a run.
    pub fn tick(&self, now: DateTime<Utc>) -> TickOutcome {
        {
            let mut state = self.lock_state();
            if !state.is_busy() && !state.is_due(now) {
                return TickOutcome::NotDue {
                    next_due_at: state.next_due_at.unwrap_or(now),
                };
            }
            if state.try_acquire(ReviewType::Scheduled, now).is_err() {
                return TickOutcome::Busy;
            }
        }
        TickOutcome::Started(self.spawn(ReviewRequest::scheduled()))
    }

    /// Start a run immediately, regardless of due time. Returns
    /// [`ReviewError::LockBusy`] when a run is already in flight.
    pub fn trigger(&self, request: ReviewRequest) -> Result<RunHandle, ReviewError> {
        self.lock_state().try_acquire(request.review_type, Utc::now())?;
        Ok(self.spawn(request))
    }

    pub fn trigger_manual(&self, requested_by: &str) -> Result<RunHandle, ReviewError> {
        self.trigger(ReviewRequest::manual(requested_by))
    }

    pub fn trigger_event(&self, reason: &str) -> Result<RunHandle, ReviewError> {
        self.trigger(ReviewRequest::triggered(reason))
    }

    /// Spawn the run. The caller must already hold the run lock.
    fn spawn(&self, request: ReviewRequest) -> RunHandle {
        let guard = LockGuard {
            state: Arc::clone(&self.state),
            interval_minutes: None,
            fallback_minutes: self.config.fallback_interval_minutes,
        };
        let orchestrator = Arc::clone(&self.orchestrator);
        let max_duration = self.config.max_run_duration;
        let review_type = request.review_type;

        let join = tokio::spawn(async move {
            // Owned by the task so the lock is held until the run ends.
            let mut guard = guard;
            let progress = RunProgress::new();
            let run = AssertUnwindSafe(orchestrator.execute(&request, &progress)).catch_unwind();
            let result = match tokio::time::timeout(max_duration, run).await {
                Ok(Ok(result)) => result,
                Ok(Err(_)) => {
                    error!(review_type = %request.review_type, "Review run panicked");
                    orchestrator.abort(&progress, &ReviewError::Fatal("review run panicked".into()));
                    Ok(progress.report())
                }
                Err(_) => {
                    let err = ReviewError::Timeout(max_duration.as_secs());
                    orchestrator.abort(&progress, &err);
                    Ok(progress.report())
                }
            };
            guard.interval_minutes = progress.conditions().map(|c| c.review_interval_minutes);
            result
        });

        RunHandle { review_type, join }
    }

    /// Tick until `shutdown` resolves. A run still in flight at shutdown is
    /// abandoned; a later start recovers it as interrupted once it is older
    /// than `max_run_duration`.
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.config.tick_every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!(tick_secs = self.config.tick_every.as_secs(), "Review scheduler started");
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    if self.state().is_busy() {
                        warn!("Shutting down with a review run in flight");
                    }
                    info!("Review scheduler stopped");
                    break;
                }
                _ = ticker.tick() => match self.tick(Utc::now()) {
                    TickOutcome::Started(handle) => {
                        debug!(review_type = %handle.review_type, "Scheduled review started");
                    }
                    TickOutcome::NotDue { next_due_at } => {
                        debug!(%next_due_at, "Review not due");
                    }
                    TickOutcome::Busy => debug!("Review in flight, tick skipped"),
                },
            }
        }
    }

    pub async fn run_forever(&self) {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for ctrl-c: {e}");
                std::future::pending::<()>().await;
            }
        })
        .await
    }
}
