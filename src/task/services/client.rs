//! Optimistic task store client.
//!
//! Each UI surface talks to the shared project document through this
//! client. Mutations apply to a local cache first (so the surface renders
//! immediately), then go to the store as a per-task compare-and-swap; a
//! rejected write rolls the cache back and surfaces the error. Status
//! changes are validated against the transition table before any
//! optimistic mutation and re-validated against the freshly read record
//! inside the write loop, so history is always appended to the
//! then-current confirmed history.

use crate::bus::{ChangeOrigin, EventBus, TaskEvent};
use crate::task::domain::{
    NewTask, ProjectSnapshot, RecordVersion, Task, TaskDomainError, TaskId, TaskPatch, TaskRecord,
    TaskStatus, TimeEntry,
};
use crate::task::ports::{ProjectStore, ProjectStoreError};
use chrono::{DateTime, Utc};
use mockable::Clock;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Bounded retry budget for stale writes before giving up.
const MAX_WRITE_ATTEMPTS: u32 = 3;

/// Role a collaborator holds within a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorRole {
    /// Project owner; may use privileged overrides.
    Owner,
    /// Regular collaborator.
    Member,
}

/// A collaborator performing an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    name: String,
    role: ActorRole,
}

impl Actor {
    /// Creates an actor with the given name and role.
    #[must_use]
    pub fn new(name: impl Into<String>, role: ActorRole) -> Self {
        Self {
            name: name.into(),
            role,
        }
    }

    /// Returns the actor's display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the actor's project role.
    #[must_use]
    pub const fn role(&self) -> ActorRole {
        self.role
    }
}

/// Service-level errors for task store operations.
#[derive(Debug, Clone, Error)]
pub enum TaskServiceError {
    /// A required field is missing or empty.
    #[error(transparent)]
    Validation(TaskDomainError),

    /// The task does not exist.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// The requested status is not reachable from the current status.
    #[error(transparent)]
    InvalidTransition(TaskDomainError),

    /// The operation clashes with an active tracking session.
    #[error(transparent)]
    Conflict(TaskDomainError),

    /// A privileged operation was attempted without the required role.
    #[error("permission denied: {actor} is not a project owner")]
    PermissionDenied {
        /// Actor whose request was refused.
        actor: String,
    },

    /// The write kept losing to concurrent writers.
    #[error("concurrent write conflict on task {task_id} after {attempts} attempts")]
    ConcurrentWrite {
        /// Task whose write was abandoned.
        task_id: TaskId,
        /// How many attempts were made.
        attempts: u32,
    },

    /// The store itself failed.
    #[error(transparent)]
    Store(ProjectStoreError),
}

impl From<TaskDomainError> for TaskServiceError {
    fn from(err: TaskDomainError) -> Self {
        match err {
            TaskDomainError::EmptyTitle => Self::Validation(err),
            TaskDomainError::InvalidTransition { .. } => Self::InvalidTransition(err),
            TaskDomainError::SessionAlreadyActive(_)
            | TaskDomainError::NoActiveSession(_)
            | TaskDomainError::RateChangeWhileTracking(_) => Self::Conflict(err),
        }
    }
}

impl From<ProjectStoreError> for TaskServiceError {
    fn from(err: ProjectStoreError) -> Self {
        match err {
            ProjectStoreError::TaskNotFound(id) => Self::NotFound(id),
            other => Self::Store(other),
        }
    }
}

/// Result type for task store client operations.
pub type TaskServiceResult<T> = Result<T, TaskServiceError>;

/// Outcome of one retried store write.
struct WriteOutcome {
    record: TaskRecord,
    applied: bool,
}

/// Optimistically cached client over the shared project document.
pub struct TaskStoreClient<S, C>
where
    S: ProjectStore,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    clock: Arc<C>,
    bus: Arc<EventBus>,
    cache: RwLock<HashMap<TaskId, TaskRecord>>,
}

impl<S, C> TaskStoreClient<S, C>
where
    S: ProjectStore,
    C: Clock + Send + Sync,
{
    /// Creates a client over the given store, clock, and event bus.
    #[must_use]
    pub fn new(store: Arc<S>, clock: Arc<C>, bus: Arc<EventBus>) -> Self {
        Self {
            store,
            clock,
            bus,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the event bus surfaces should subscribe to.
    #[must_use]
    pub fn bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.bus)
    }

    /// Returns the store this client writes through.
    #[must_use]
    pub fn store(&self) -> Arc<S> {
        Arc::clone(&self.store)
    }

    /// Returns the clock this client stamps mutations with.
    #[must_use]
    pub fn clock(&self) -> Arc<C> {
        Arc::clone(&self.clock)
    }

    /// Subscribes to full project snapshots as the document changes.
    ///
    /// Surfaces that render the whole task list (board, calendar) read
    /// this feed; per-change notifications go out on the [`EventBus`].
    #[must_use]
    pub fn watch_project(&self) -> tokio::sync::watch::Receiver<ProjectSnapshot> {
        self.store.watch()
    }

    /// Returns the cached view of one task.
    #[must_use]
    pub fn task(&self, id: TaskId) -> Option<Task> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .map(|record| record.task.clone())
    }

    /// Returns the cached view of all tasks.
    #[must_use]
    pub fn tasks(&self) -> Vec<Task> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|record| record.task.clone())
            .collect()
    }

    /// Creates a task and persists it.
    ///
    /// The task appears in the local cache immediately; a failed store
    /// insert removes it again before the error propagates.
    ///
    /// # Errors
    ///
    /// Returns [`TaskServiceError::Validation`] for a blank title and
    /// [`TaskServiceError::Store`] when persistence rejects the insert.
    pub async fn add_task(&self, data: NewTask) -> TaskServiceResult<Task> {
        let task = Task::create(data, &*self.clock)?;
        let task_id = task.id();
        self.cache_record(TaskRecord::new(task.clone(), RecordVersion::initial()));

        match self.store.insert_task(&task).await {
            Ok(record) => {
                info!(%task_id, title = record.task.title(), "task created");
                let stored = record.task.clone();
                self.cache_record(record);
                self.bus.publish(&TaskEvent::Created {
                    task: stored.clone(),
                });
                Ok(stored)
            }
            Err(err) => {
                warn!(%task_id, error = %err, "task insert failed, dropping optimistic entry");
                self.evict(task_id);
                Err(err.into())
            }
        }
    }

    /// Merges partial fields into a task and persists the result.
    ///
    /// # Errors
    ///
    /// Returns [`TaskServiceError::NotFound`] for an unknown task,
    /// [`TaskServiceError::Validation`]/[`TaskServiceError::Conflict`]
    /// when the patch is rejected by the domain, and
    /// [`TaskServiceError::ConcurrentWrite`] when retries are exhausted.
    pub async fn update_task(&self, task_id: TaskId, patch: TaskPatch) -> TaskServiceResult<Task> {
        let previous = self.current_record(task_id).await?;

        // Reject domain-invalid patches before any optimistic mutation.
        let mut optimistic = previous.task.clone();
        optimistic.apply_patch(patch.clone(), &*self.clock)?;
        self.cache_record(TaskRecord::new(optimistic, previous.version));

        let outcome = self
            .write_with_retry(task_id, |task| {
                task.apply_patch(patch.clone(), &*self.clock)?;
                Ok(true)
            })
            .await;

        match outcome {
            Ok(written) => {
                let stored = written.record.task.clone();
                self.cache_record(written.record);
                self.bus.publish(&TaskEvent::Updated {
                    task: stored.clone(),
                });
                Ok(stored)
            }
            Err(err) => {
                self.cache_record(previous);
                Err(err)
            }
        }
    }

    /// Moves a task to a new status, validating the transition first.
    ///
    /// `raw_status` is normalised (trimmed, uppercased, spaces mapped to
    /// underscores; unrecognised input becomes `TODO`) before validation.
    ///
    /// # Errors
    ///
    /// Returns [`TaskServiceError::InvalidTransition`] before any
    /// optimistic mutation when the transition table rejects the move,
    /// [`TaskServiceError::NotFound`] for an unknown task, and
    /// [`TaskServiceError::ConcurrentWrite`] when retries are exhausted.
    pub async fn update_task_status(
        &self,
        task_id: TaskId,
        raw_status: &str,
        updated_by: &str,
    ) -> TaskServiceResult<Task> {
        let timestamp = self.clock.utc();
        self.update_task_status_at(task_id, TaskStatus::normalize(raw_status), updated_by, timestamp)
            .await
    }

    /// Moves a task to a new status at an explicit submission timestamp.
    ///
    /// Resubmitting an identical `{status, actor, timestamp}` triple is
    /// an idempotent no-op: the current task is returned and no second
    /// history entry is appended.
    ///
    /// # Errors
    ///
    /// As [`Self::update_task_status`].
    pub async fn update_task_status_at(
        &self,
        task_id: TaskId,
        status: TaskStatus,
        updated_by: &str,
        timestamp: DateTime<Utc>,
    ) -> TaskServiceResult<Task> {
        let previous = self.current_record(task_id).await?;

        // Validate against the current confirmed status before touching
        // the cache; an invalid transition must leave no trace.
        let mut optimistic = previous.task.clone();
        if !optimistic.apply_status(status, updated_by, timestamp)? {
            debug!(%task_id, status = %status, "duplicate status submission ignored");
            return Ok(previous.task);
        }
        self.cache_record(TaskRecord::new(optimistic, previous.version));

        let outcome = self
            .write_with_retry(task_id, |task| {
                Ok(task.apply_status(status, updated_by, timestamp)?)
            })
            .await;

        match outcome {
            Ok(written) => {
                info!(%task_id, status = %status, updated_by, "task status updated");
                self.confirm_status_change(written, status)
            }
            Err(err) => {
                self.cache_record(previous);
                Err(err)
            }
        }
    }

    /// Forces a task into a status, bypassing the transition table.
    ///
    /// Privileged override for project owners: the review panel uses it
    /// to pull work back from sign-off. The appended history entry is
    /// always marked as forced, and the call is logged distinctly.
    ///
    /// # Errors
    ///
    /// Returns [`TaskServiceError::PermissionDenied`] unless `actor` is
    /// an [`ActorRole::Owner`]; otherwise as [`Self::update_task_status`]
    /// minus the transition check.
    pub async fn force_status(
        &self,
        task_id: TaskId,
        status: TaskStatus,
        actor: &Actor,
    ) -> TaskServiceResult<Task> {
        if actor.role() != ActorRole::Owner {
            return Err(TaskServiceError::PermissionDenied {
                actor: actor.name().to_owned(),
            });
        }
        let timestamp = self.clock.utc();
        let previous = self.current_record(task_id).await?;
        warn!(%task_id, status = %status, actor = actor.name(), "forced status override");

        let mut optimistic = previous.task.clone();
        if !optimistic.force_status(status, actor.name(), timestamp) {
            return Ok(previous.task);
        }
        self.cache_record(TaskRecord::new(optimistic, previous.version));

        let outcome = self
            .write_with_retry(task_id, |task| {
                Ok(task.force_status(status, actor.name(), timestamp))
            })
            .await;

        match outcome {
            Ok(written) => self.confirm_status_change(written, status),
            Err(err) => {
                self.cache_record(previous);
                Err(err)
            }
        }
    }

    /// Applies a caller-supplied mutation through the versioned write loop.
    ///
    /// Used by the tracking session manager for session start/stop, which
    /// need the same stale-write defence as field updates.
    ///
    /// # Errors
    ///
    /// Propagates domain rejections from `mutate` and
    /// [`TaskServiceError::ConcurrentWrite`] when retries are exhausted.
    pub(crate) async fn mutate_task<F>(&self, task_id: TaskId, mutate: F) -> TaskServiceResult<Task>
    where
        F: FnMut(&mut Task) -> TaskServiceResult<bool>,
    {
        let previous = self.current_record(task_id).await?;
        match self.write_with_retry(task_id, mutate).await {
            Ok(written) => {
                let stored = written.record.task.clone();
                self.cache_record(written.record);
                Ok(stored)
            }
            Err(err) => {
                self.cache_record(previous);
                Err(err)
            }
        }
    }

    /// Stops the task's tracking session through the versioned write loop.
    ///
    /// The cleared session, the updated cumulative time, and the ledger
    /// entry commit to the store as one atomic operation; a rejected stop
    /// leaves the document exactly as it was, session included.
    ///
    /// # Errors
    ///
    /// Returns [`TaskServiceError::Conflict`] when no session is active,
    /// [`TaskServiceError::NotFound`] for an unknown task, and
    /// [`TaskServiceError::ConcurrentWrite`] when retries are exhausted.
    pub(crate) async fn commit_session_stop(
        &self,
        task_id: TaskId,
    ) -> TaskServiceResult<(Task, TimeEntry)> {
        let mut attempts = 0_u32;
        loop {
            attempts += 1;
            let record = self
                .store
                .read_task(task_id)
                .await?
                .ok_or(TaskServiceError::NotFound(task_id))?;
            let mut task = record.task.clone();
            let entry = task.stop_session(&*self.clock)?;
            match self
                .store
                .compare_and_update_with_entry(record.version, &task, &entry)
                .await
            {
                Ok(stored) => {
                    let stopped = stored.task.clone();
                    self.cache_record(stored);
                    return Ok((stopped, entry));
                }
                Err(ProjectStoreError::VersionMismatch { actual, expected, .. })
                    if attempts < MAX_WRITE_ATTEMPTS =>
                {
                    debug!(%task_id, %expected, %actual, attempts, "stale stop, retrying");
                }
                Err(ProjectStoreError::VersionMismatch { .. }) => {
                    return Err(TaskServiceError::ConcurrentWrite { task_id, attempts });
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Spawns the background loop absorbing remote document changes.
    ///
    /// Each remote snapshot replaces the cache wholesale (last confirmed
    /// write wins) and remote status changes are republished on the bus
    /// with [`ChangeOrigin::Remote`]. The returned handle must be aborted
    /// on teardown.
    #[must_use]
    pub fn spawn_sync(self: &Arc<Self>) -> JoinHandle<()>
    where
        S: 'static,
        C: 'static,
    {
        let client = Arc::clone(self);
        let mut changes = client.store.watch();
        tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                let snapshot = changes.borrow_and_update().clone();
                client.absorb_snapshot(&snapshot);
            }
        })
    }

    /// Replaces the cache from a remote snapshot, announcing status moves.
    ///
    /// The cache lock is released before events go out so that handlers
    /// may read the client without deadlocking.
    fn absorb_snapshot(&self, snapshot: &ProjectSnapshot) {
        let status_moves: Vec<TaskRecord> = {
            let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            snapshot
                .tasks
                .iter()
                .filter(|record| {
                    cache
                        .get(&record.task_id())
                        .is_some_and(|cached| cached.task.status() != record.task.status())
                })
                .cloned()
                .collect()
        };
        {
            let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
            cache.clear();
            for record in &snapshot.tasks {
                cache.insert(record.task_id(), record.clone());
            }
        }
        for record in status_moves {
            self.bus.publish(&TaskEvent::StatusUpdated {
                task_id: record.task_id(),
                new_status: record.task.status(),
                task: record.task.clone(),
                origin: ChangeOrigin::Remote,
            });
        }
    }

    /// Re-reads and re-applies `mutate` until the store accepts the write.
    async fn write_with_retry<F>(
        &self,
        task_id: TaskId,
        mut mutate: F,
    ) -> TaskServiceResult<WriteOutcome>
    where
        F: FnMut(&mut Task) -> TaskServiceResult<bool>,
    {
        let mut attempts = 0_u32;
        loop {
            attempts += 1;
            let record = self
                .store
                .read_task(task_id)
                .await?
                .ok_or(TaskServiceError::NotFound(task_id))?;
            let mut task = record.task.clone();
            if !mutate(&mut task)? {
                return Ok(WriteOutcome {
                    record,
                    applied: false,
                });
            }
            match self.store.compare_and_update(record.version, &task).await {
                Ok(stored) => {
                    return Ok(WriteOutcome {
                        record: stored,
                        applied: true,
                    });
                }
                Err(ProjectStoreError::VersionMismatch { actual, expected, .. })
                    if attempts < MAX_WRITE_ATTEMPTS =>
                {
                    debug!(%task_id, %expected, %actual, attempts, "stale write, retrying");
                }
                Err(ProjectStoreError::VersionMismatch { .. }) => {
                    return Err(TaskServiceError::ConcurrentWrite { task_id, attempts });
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Confirms a status write in the cache and notifies subscribers.
    ///
    /// A write that resolved into an idempotent no-op on retry refreshes
    /// the cache without announcing anything.
    fn confirm_status_change(
        &self,
        outcome: WriteOutcome,
        status: TaskStatus,
    ) -> TaskServiceResult<Task> {
        let stored = outcome.record.task.clone();
        self.cache_record(outcome.record);
        if outcome.applied {
            self.bus.publish(&TaskEvent::StatusUpdated {
                task_id: stored.id(),
                new_status: status,
                task: stored.clone(),
                origin: ChangeOrigin::Local,
            });
        }
        Ok(stored)
    }

    /// Returns the freshest record available: store first, cache fallback.
    async fn current_record(&self, task_id: TaskId) -> TaskServiceResult<TaskRecord> {
        if let Some(record) = self.store.read_task(task_id).await? {
            return Ok(record);
        }
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&task_id)
            .cloned()
            .ok_or(TaskServiceError::NotFound(task_id))
    }

    fn cache_record(&self, record: TaskRecord) {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(record.task_id(), record);
    }

    fn evict(&self, task_id: TaskId) {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&task_id);
    }
}
