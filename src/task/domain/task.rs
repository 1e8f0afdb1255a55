//! Task aggregate root and related task lifecycle types.

use super::{ActiveTrackingSession, HourlyRate, TaskDomainError, TaskId, TaskStatus, TimeEntry};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

/// One accepted status change, recorded in append-only order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    /// Status the task moved to.
    pub status: TaskStatus,
    /// Actor who made the change.
    pub updated_by: String,
    /// When the change was accepted.
    pub timestamp: DateTime<Utc>,
    /// Optional reviewer note attached to the change.
    pub comment: Option<String>,
}

impl StatusHistoryEntry {
    /// Creates a history entry without a comment.
    #[must_use]
    pub fn new(status: TaskStatus, updated_by: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            status,
            updated_by: updated_by.into(),
            timestamp,
            comment: None,
        }
    }

    /// Attaches a comment to the entry.
    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Returns whether `other` is a duplicate submission of this entry.
    ///
    /// Duplicate means identical status, actor, and timestamp; comments do
    /// not participate so a retried submission cannot double-append by
    /// varying its note.
    #[must_use]
    pub fn is_duplicate_of(&self, other: &Self) -> bool {
        self.status == other.status
            && self.updated_by == other.updated_by
            && self.timestamp == other.timestamp
    }
}

/// A checklist item nested under a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    /// Subtask label.
    pub title: String,
    /// Whether the subtask has been ticked off.
    pub completed: bool,
}

impl Subtask {
    /// Creates an unticked subtask.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            completed: false,
        }
    }
}

/// Parameter object for creating a task.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewTask {
    title: String,
    created_by: String,
    description: Option<String>,
    status: Option<TaskStatus>,
    assigned_to: Option<String>,
    deadline: Option<DateTime<Utc>>,
    notify_before_minutes: Option<u32>,
    hourly_rate: Option<HourlyRate>,
    subtasks: Vec<Subtask>,
}

impl NewTask {
    /// Creates a request with the required fields.
    #[must_use]
    pub fn new(title: impl Into<String>, created_by: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            created_by: created_by.into(),
            ..Self::default()
        }
    }

    /// Sets the task description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the initial status; omitted statuses default to `TODO`.
    #[must_use]
    pub const fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Assigns the task to a collaborator.
    #[must_use]
    pub fn with_assignee(mut self, assigned_to: impl Into<String>) -> Self {
        self.assigned_to = Some(assigned_to.into());
        self
    }

    /// Sets the deadline and an optional reminder lead time in minutes.
    #[must_use]
    pub const fn with_deadline(
        mut self,
        deadline: DateTime<Utc>,
        notify_before_minutes: Option<u32>,
    ) -> Self {
        self.deadline = Some(deadline);
        self.notify_before_minutes = notify_before_minutes;
        self
    }

    /// Sets the billing rate.
    #[must_use]
    pub const fn with_hourly_rate(mut self, rate: HourlyRate) -> Self {
        self.hourly_rate = Some(rate);
        self
    }

    /// Sets the initial subtask checklist.
    #[must_use]
    pub fn with_subtasks(mut self, subtasks: impl IntoIterator<Item = Subtask>) -> Self {
        self.subtasks = subtasks.into_iter().collect();
        self
    }
}

/// Partial update applied to an existing task.
///
/// Absent fields are left untouched; present fields replace the current
/// value. Status changes go through [`Task::apply_status`] instead so the
/// transition table cannot be bypassed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaskPatch {
    title: Option<String>,
    description: Option<String>,
    assigned_to: Option<String>,
    deadline: Option<DateTime<Utc>>,
    notify_before_minutes: Option<u32>,
    hourly_rate: Option<HourlyRate>,
    subtasks: Option<Vec<Subtask>>,
}

impl TaskPatch {
    /// Creates an empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Replaces the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Replaces the assignee.
    #[must_use]
    pub fn with_assignee(mut self, assigned_to: impl Into<String>) -> Self {
        self.assigned_to = Some(assigned_to.into());
        self
    }

    /// Replaces the deadline.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Replaces the reminder lead time in minutes.
    #[must_use]
    pub const fn with_notify_before_minutes(mut self, minutes: u32) -> Self {
        self.notify_before_minutes = Some(minutes);
        self
    }

    /// Replaces the billing rate.
    #[must_use]
    pub const fn with_hourly_rate(mut self, rate: HourlyRate) -> Self {
        self.hourly_rate = Some(rate);
        self
    }

    /// Replaces the subtask checklist.
    #[must_use]
    pub fn with_subtasks(mut self, subtasks: impl IntoIterator<Item = Subtask>) -> Self {
        self.subtasks = Some(subtasks.into_iter().collect());
        self
    }

    /// Returns whether the patch changes the billing rate.
    #[must_use]
    pub const fn changes_hourly_rate(&self) -> bool {
        self.hourly_rate.is_some()
    }
}

/// Task aggregate root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    title: String,
    description: Option<String>,
    status: TaskStatus,
    status_history: Vec<StatusHistoryEntry>,
    subtasks: Vec<Subtask>,
    assigned_to: Option<String>,
    deadline: Option<DateTime<Utc>>,
    notify_before_minutes: Option<u32>,
    created_at: DateTime<Utc>,
    last_modified: DateTime<Utc>,
    time_spent_ms: u64,
    hourly_rate: Option<HourlyRate>,
    active_session: Option<ActiveTrackingSession>,
}

/// Parameter object for reconstructing a persisted task aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedTaskData {
    /// Persisted task identifier.
    pub id: TaskId,
    /// Persisted title.
    pub title: String,
    /// Persisted description, if any.
    pub description: Option<String>,
    /// Persisted lifecycle status.
    pub status: TaskStatus,
    /// Persisted append-only status history.
    pub status_history: Vec<StatusHistoryEntry>,
    /// Persisted subtask checklist.
    pub subtasks: Vec<Subtask>,
    /// Persisted assignee, if any.
    pub assigned_to: Option<String>,
    /// Persisted deadline, if any.
    pub deadline: Option<DateTime<Utc>>,
    /// Persisted reminder lead time in minutes, if any.
    pub notify_before_minutes: Option<u32>,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Persisted latest mutation timestamp.
    pub last_modified: DateTime<Utc>,
    /// Persisted cumulative tracked milliseconds.
    pub time_spent_ms: u64,
    /// Persisted billing rate, if any.
    pub hourly_rate: Option<HourlyRate>,
    /// Persisted in-flight tracking session, if any.
    pub active_session: Option<ActiveTrackingSession>,
}

impl Task {
    /// Creates a new task from caller-supplied fields.
    ///
    /// Assigns the identifier and timestamps and records the first status
    /// history entry, attributed to the creator.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::EmptyTitle`] when the title is blank
    /// after trimming.
    pub fn create(data: NewTask, clock: &impl Clock) -> Result<Self, TaskDomainError> {
        if data.title.trim().is_empty() {
            return Err(TaskDomainError::EmptyTitle);
        }
        let timestamp = clock.utc();
        let status = data.status.unwrap_or(TaskStatus::Todo);
        Ok(Self {
            id: TaskId::new(),
            title: data.title,
            description: data.description,
            status,
            status_history: vec![StatusHistoryEntry::new(status, data.created_by, timestamp)],
            subtasks: data.subtasks,
            assigned_to: data.assigned_to,
            deadline: data.deadline,
            notify_before_minutes: data.notify_before_minutes,
            created_at: timestamp,
            last_modified: timestamp,
            time_spent_ms: 0,
            hourly_rate: data.hourly_rate,
            active_session: None,
        })
    }

    /// Reconstructs a task from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedTaskData) -> Self {
        Self {
            id: data.id,
            title: data.title,
            description: data.description,
            status: data.status,
            status_history: data.status_history,
            subtasks: data.subtasks,
            assigned_to: data.assigned_to,
            deadline: data.deadline,
            notify_before_minutes: data.notify_before_minutes,
            created_at: data.created_at,
            last_modified: data.last_modified,
            time_spent_ms: data.time_spent_ms,
            hourly_rate: data.hourly_rate,
            active_session: data.active_session,
        }
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the task title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the task description, if any.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the current lifecycle status.
    #[must_use]
    pub const fn status(&self) -> TaskStatus {
        self.status
    }

    /// Returns the append-only status history, oldest first.
    #[must_use]
    pub fn status_history(&self) -> &[StatusHistoryEntry] {
        &self.status_history
    }

    /// Returns the subtask checklist.
    #[must_use]
    pub fn subtasks(&self) -> &[Subtask] {
        &self.subtasks
    }

    /// Returns the assignee, if any.
    #[must_use]
    pub fn assigned_to(&self) -> Option<&str> {
        self.assigned_to.as_deref()
    }

    /// Returns the deadline, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    /// Returns the reminder lead time in minutes, if any.
    #[must_use]
    pub const fn notify_before_minutes(&self) -> Option<u32> {
        self.notify_before_minutes
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest mutation timestamp.
    #[must_use]
    pub const fn last_modified(&self) -> DateTime<Utc> {
        self.last_modified
    }

    /// Returns cumulative tracked time in milliseconds.
    #[must_use]
    pub const fn time_spent_ms(&self) -> u64 {
        self.time_spent_ms
    }

    /// Returns the billing rate, if any.
    #[must_use]
    pub const fn hourly_rate(&self) -> Option<HourlyRate> {
        self.hourly_rate
    }

    /// Returns the in-flight tracking session, if any.
    #[must_use]
    pub const fn active_session(&self) -> Option<&ActiveTrackingSession> {
        self.active_session.as_ref()
    }

    /// Merges a partial update into the task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::EmptyTitle`] for a blank replacement
    /// title and [`TaskDomainError::RateChangeWhileTracking`] when the
    /// patch changes the billing rate while a session is active.
    pub fn apply_patch(&mut self, patch: TaskPatch, clock: &impl Clock) -> Result<(), TaskDomainError> {
        if let Some(title) = &patch.title
            && title.trim().is_empty()
        {
            return Err(TaskDomainError::EmptyTitle);
        }
        if patch.changes_hourly_rate() && self.active_session.is_some() {
            return Err(TaskDomainError::RateChangeWhileTracking(self.id));
        }
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(description) = patch.description {
            self.description = Some(description);
        }
        if let Some(assigned_to) = patch.assigned_to {
            self.assigned_to = Some(assigned_to);
        }
        if let Some(deadline) = patch.deadline {
            self.deadline = Some(deadline);
        }
        if let Some(minutes) = patch.notify_before_minutes {
            self.notify_before_minutes = Some(minutes);
        }
        if let Some(rate) = patch.hourly_rate {
            self.hourly_rate = Some(rate);
        }
        if let Some(subtasks) = patch.subtasks {
            self.subtasks = subtasks;
        }
        self.touch(clock);
        Ok(())
    }

    /// Moves the task to `to`, appending a history entry.
    ///
    /// Validation happens against the task's current status before any
    /// field changes. Resubmitting an entry the history already ends with
    /// (same status, actor, and timestamp) is an idempotent no-op and
    /// returns `Ok(false)`; an accepted append returns `Ok(true)`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidTransition`] when `to` is not
    /// reachable from the current status.
    pub fn apply_status(
        &mut self,
        to: TaskStatus,
        updated_by: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Result<bool, TaskDomainError> {
        let entry = StatusHistoryEntry::new(to, updated_by, timestamp);
        if self.is_resubmission(&entry) {
            return Ok(false);
        }
        self.status.validate_transition(to)?;
        self.append_history(entry);
        Ok(true)
    }

    /// Moves the task to `to` without consulting the transition table.
    ///
    /// Privileged override for project owners; the appended history entry
    /// always carries a comment marking it as forced. The caller is
    /// responsible for authorisation.
    ///
    /// Returns `false` for an idempotent resubmission, `true` otherwise.
    pub fn force_status(
        &mut self,
        to: TaskStatus,
        updated_by: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> bool {
        let entry =
            StatusHistoryEntry::new(to, updated_by, timestamp).with_comment("forced override");
        if self.is_resubmission(&entry) {
            return false;
        }
        self.append_history(entry);
        true
    }

    /// Starts a tracking session for this task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::SessionAlreadyActive`] when a session is
    /// already running.
    pub fn start_session(&mut self, clock: &impl Clock) -> Result<ActiveTrackingSession, TaskDomainError> {
        if self.active_session.is_some() {
            return Err(TaskDomainError::SessionAlreadyActive(self.id));
        }
        let session = ActiveTrackingSession::begin(self.time_spent_ms, self.hourly_rate, clock);
        self.active_session = Some(session);
        self.touch(clock);
        Ok(session)
    }

    /// Stops the tracking session, producing the billable entry.
    ///
    /// This is the only operation that clears the session; it adds the
    /// measured duration to `time_spent_ms` in the same step.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::NoActiveSession`] when no session is
    /// running.
    pub fn stop_session(&mut self, clock: &impl Clock) -> Result<TimeEntry, TaskDomainError> {
        let session = self
            .active_session
            .take()
            .ok_or(TaskDomainError::NoActiveSession(self.id))?;
        let now = clock.utc();
        self.time_spent_ms = self
            .time_spent_ms
            .saturating_add(session.elapsed_session_ms(now));
        self.touch(clock);
        Ok(TimeEntry::from_session(self.id, &session, now))
    }

    /// Returns whether `entry` duplicates the latest accepted entry.
    fn is_resubmission(&self, entry: &StatusHistoryEntry) -> bool {
        self.status == entry.status
            && self
                .status_history
                .last()
                .is_some_and(|last| last.is_duplicate_of(entry))
    }

    /// Appends to the history, keeping entry timestamps non-decreasing.
    fn append_history(&mut self, mut entry: StatusHistoryEntry) {
        if let Some(last) = self.status_history.last()
            && entry.timestamp < last.timestamp
        {
            entry.timestamp = last.timestamp;
        }
        self.status = entry.status;
        self.last_modified = entry.timestamp.max(self.last_modified);
        self.status_history.push(entry);
    }

    /// Updates the `last_modified` timestamp to the current clock time.
    fn touch(&mut self, clock: &impl Clock) {
        self.last_modified = clock.utc();
    }
}
