//! Per-task time tracking sessions with a live local tick.
//!
//! The manager is a specialised caller of [`TaskStoreClient`]: session
//! start and stop go through the same versioned write path as any other
//! task mutation, while a local tokio task recomputes the elapsed display
//! value at sub-second granularity without touching the store. A session
//! stopped from another device is noticed on the document feed and the
//! local tick is cancelled without double-counting.

use crate::task::domain::{
    ActiveTrackingSession, HourlyRate, Task, TaskDomainError, TaskId, TaskPatch, TimeEntry,
};
use crate::task::ports::ProjectStore;
use crate::task::services::{TaskServiceError, TaskServiceResult, TaskStoreClient};
use mockable::Clock;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Default local tick period for live elapsed display.
const DEFAULT_TICK_PERIOD: Duration = Duration::from_millis(100);

/// A running local ticker for one task's session.
///
/// Dropping the timer aborts the tokio task, so removal from the timer
/// map is the cancellation point.
#[derive(Debug)]
struct LocalTimer {
    handle: JoinHandle<()>,
    elapsed_rx: watch::Receiver<u64>,
}

impl Drop for LocalTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Time tracking orchestration over the task store client.
pub struct TrackingSessionManager<S, C>
where
    S: ProjectStore + 'static,
    C: Clock + Send + Sync + 'static,
{
    client: Arc<TaskStoreClient<S, C>>,
    clock: Arc<C>,
    tick_period: Duration,
    timers: Mutex<HashMap<TaskId, LocalTimer>>,
}

impl<S, C> TrackingSessionManager<S, C>
where
    S: ProjectStore + 'static,
    C: Clock + Send + Sync + 'static,
{
    /// Creates a manager ticking at the default 100 ms period.
    #[must_use]
    pub fn new(client: Arc<TaskStoreClient<S, C>>) -> Self {
        Self::with_tick_period(client, DEFAULT_TICK_PERIOD)
    }

    /// Creates a manager with an explicit tick period.
    #[must_use]
    pub fn with_tick_period(client: Arc<TaskStoreClient<S, C>>, tick_period: Duration) -> Self {
        let clock = client.clock();
        Self {
            client,
            clock,
            tick_period,
            timers: Mutex::new(HashMap::new()),
        }
    }

    /// Returns whether this manager is ticking for the task.
    #[must_use]
    pub fn is_tracking(&self, task_id: TaskId) -> bool {
        self.timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&task_id)
    }

    /// Returns the latest locally computed elapsed milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self, task_id: TaskId) -> Option<u64> {
        self.timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&task_id)
            .map(|timer| *timer.elapsed_rx.borrow())
    }

    /// Returns a live feed of the elapsed display value for the task.
    #[must_use]
    pub fn elapsed_watch(&self, task_id: TaskId) -> Option<watch::Receiver<u64>> {
        self.timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&task_id)
            .map(|timer| timer.elapsed_rx.clone())
    }

    /// Starts tracking time against a task.
    ///
    /// Writes the session into the shared document, then starts the local
    /// tick. `Idle -> Running`; starting while running is an error, not a
    /// silent no-op.
    ///
    /// # Errors
    ///
    /// Returns [`TaskServiceError::Conflict`] when a session is already
    /// active locally or in the document, and
    /// [`TaskServiceError::NotFound`] for an unknown task.
    pub async fn start_tracking(&self, task_id: TaskId) -> TaskServiceResult<()> {
        if self.is_tracking(task_id) {
            return Err(TaskServiceError::Conflict(
                TaskDomainError::SessionAlreadyActive(task_id),
            ));
        }
        let clock = Arc::clone(&self.clock);
        let stored = self
            .client
            .mutate_task(task_id, |task| {
                task.start_session(&*clock)?;
                Ok(true)
            })
            .await?;
        let Some(session) = stored.active_session().copied() else {
            // The accepted write always carries the session just started.
            return Err(TaskServiceError::Conflict(
                TaskDomainError::NoActiveSession(task_id),
            ));
        };
        info!(%task_id, "tracking started");
        self.install_timer(task_id, session);
        Ok(())
    }

    /// Stops tracking and records the billable entry.
    ///
    /// The local tick is cancelled synchronously before the remote write,
    /// so a stale display can never keep climbing past Stop. The session
    /// clear, the time accounting, and the ledger append commit as one
    /// store operation; a failed stop leaves the document unchanged while
    /// still clearing the local running flag, so the UI never shows a
    /// permanently stuck timer. `Running -> Idle`; stopping while idle is
    /// an error.
    ///
    /// # Errors
    ///
    /// Returns [`TaskServiceError::NotFound`] for an unknown task and
    /// [`TaskServiceError::Conflict`] when no session is active.
    pub async fn stop_tracking(&self, task_id: TaskId) -> TaskServiceResult<TimeEntry> {
        // Cancel the display tick first, regardless of what the store says.
        drop(
            self.timers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&task_id),
        );

        let (_, entry) = self.client.commit_session_stop(task_id).await?;
        info!(
            %task_id,
            duration_secs = entry.duration_secs(),
            cost_cents = entry.cost_cents(),
            "tracking stopped"
        );
        Ok(entry)
    }

    /// Changes the task's billing rate.
    ///
    /// Rejected while a session is active, locally or in the document, so
    /// an in-flight session can never be re-costed retroactively.
    ///
    /// # Errors
    ///
    /// Returns [`TaskServiceError::Conflict`] while tracking and
    /// [`TaskServiceError::NotFound`] for an unknown task.
    pub async fn set_hourly_rate(
        &self,
        task_id: TaskId,
        rate: HourlyRate,
    ) -> TaskServiceResult<Task> {
        if self.is_tracking(task_id) {
            return Err(TaskServiceError::Conflict(
                TaskDomainError::RateChangeWhileTracking(task_id),
            ));
        }
        self.client
            .update_task(task_id, TaskPatch::new().with_hourly_rate(rate))
            .await
    }

    /// Spawns the loop reconciling local timers against the document.
    ///
    /// When a session this manager believes is running disappears from a
    /// snapshot (stopped on another device, or the task removed), the
    /// local tick is cancelled and the document's accounting adopted
    /// as-is; the session is not resumed and nothing is double-counted.
    /// The returned handle must be aborted on teardown.
    #[must_use]
    pub fn spawn_reconciliation(self: &Arc<Self>) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        let mut changes = manager.client.store().watch();
        tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                let snapshot = changes.borrow_and_update().clone();
                let mut timers = manager.timers.lock().unwrap_or_else(PoisonError::into_inner);
                timers.retain(|task_id, _| {
                    let still_running = snapshot
                        .task(*task_id)
                        .is_some_and(|record| record.task.active_session().is_some());
                    if !still_running {
                        debug!(%task_id, "session ended remotely, cancelling local tick");
                    }
                    still_running
                });
            }
        })
    }

    /// Cancels every local ticker. Idempotent.
    pub fn shutdown(&self) {
        self.timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Spawns the 100 ms (by default) display tick for a session.
    fn install_timer(&self, task_id: TaskId, session: ActiveTrackingSession) {
        let clock = Arc::clone(&self.clock);
        let tick_period = self.tick_period;
        let (elapsed_tx, elapsed_rx) = watch::channel(session.base_time_spent_ms());
        let handle = tokio::spawn(async move {
            let mut ticks = tokio::time::interval(tick_period);
            loop {
                ticks.tick().await;
                let _ = elapsed_tx.send_replace(session.elapsed_total_ms(clock.utc()));
            }
        });
        self.timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(task_id, LocalTimer { handle, elapsed_rx });
    }
}

impl<S, C> Drop for TrackingSessionManager<S, C>
where
    S: ProjectStore + 'static,
    C: Clock + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.shutdown();
    }
}
