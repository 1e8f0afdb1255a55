//! Project document shape and per-task optimistic versioning.

use super::{Task, TaskId, TimeEntry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Monotonic per-task version used for optimistic concurrency control.
///
/// Every accepted write of a task record bumps its version; writers
/// present the version they read and the store rejects the write when it
/// no longer matches, instead of letting a stale read-modify-write
/// silently discard a concurrent change.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RecordVersion(u64);

impl RecordVersion {
    /// Version assigned to a freshly inserted record.
    #[must_use]
    pub const fn initial() -> Self {
        Self(0)
    }

    /// Returns the version that follows this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Returns the raw counter value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RecordVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// A task together with the version the store holds it at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// The task payload.
    pub task: Task,
    /// Store version of the payload.
    pub version: RecordVersion,
}

impl TaskRecord {
    /// Wraps a task at the given version.
    #[must_use]
    pub const fn new(task: Task, version: RecordVersion) -> Self {
        Self { task, version }
    }

    /// Returns the identifier of the wrapped task.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        self.task.id()
    }
}

/// Observable state of one project document.
///
/// Delivered in full to subscribers whenever the document changes, so
/// every surface showing the project renders from the same snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    /// Versioned task records, in insertion order.
    pub tasks: Vec<TaskRecord>,
    /// Billable entries recorded against the project, oldest first.
    pub time_entries: Vec<TimeEntry>,
    /// When the document last changed, if it ever has.
    pub last_modified: Option<DateTime<Utc>>,
}

impl ProjectSnapshot {
    /// Looks up a task record by identifier.
    #[must_use]
    pub fn task(&self, id: TaskId) -> Option<&TaskRecord> {
        self.tasks.iter().find(|record| record.task_id() == id)
    }
}
