//! Store port for the shared project document.
//!
//! The document store itself is an external system; this port exposes it
//! as per-task versioned records with compare-and-swap writes plus an
//! atomic time-entry append, rather than whole-document replacement, so
//! concurrent clients cannot lose each other's updates.

use crate::task::domain::{ProjectSnapshot, RecordVersion, Task, TaskId, TaskRecord, TimeEntry};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

/// Result type for project store operations.
pub type ProjectStoreResult<T> = Result<T, ProjectStoreError>;

/// Shared project document persistence contract.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Returns the full current document state.
    async fn snapshot(&self) -> ProjectStoreResult<ProjectSnapshot>;

    /// Inserts a new task record at [`RecordVersion::initial`].
    ///
    /// # Errors
    ///
    /// Returns [`ProjectStoreError::DuplicateTask`] when the task ID
    /// already exists.
    async fn insert_task(&self, task: &Task) -> ProjectStoreResult<TaskRecord>;

    /// Reads one task record.
    ///
    /// Returns `None` when the task does not exist.
    async fn read_task(&self, id: TaskId) -> ProjectStoreResult<Option<TaskRecord>>;

    /// Replaces a task record if its stored version still matches.
    ///
    /// Returns the record at its new version on success.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectStoreError::VersionMismatch`] when another writer
    /// got there first, and [`ProjectStoreError::TaskNotFound`] when the
    /// record has disappeared.
    async fn compare_and_update(
        &self,
        expected: RecordVersion,
        task: &Task,
    ) -> ProjectStoreResult<TaskRecord>;

    /// Replaces a task record and appends a billable entry in one atomic
    /// step, if the stored version still matches.
    ///
    /// Stopping a tracking session commits through this operation so the
    /// cleared session, the bumped cumulative time, and the ledger entry
    /// land together or not at all.
    ///
    /// # Errors
    ///
    /// As [`Self::compare_and_update`].
    async fn compare_and_update_with_entry(
        &self,
        expected: RecordVersion,
        task: &Task,
        entry: &TimeEntry,
    ) -> ProjectStoreResult<TaskRecord>;

    /// Subscribes to document changes.
    ///
    /// The receiver always holds the latest full snapshot; intermediate
    /// states may be coalesced.
    fn watch(&self) -> watch::Receiver<ProjectSnapshot>;
}

/// Errors returned by project store implementations.
#[derive(Debug, Clone, Error)]
pub enum ProjectStoreError {
    /// A task with the same identifier already exists.
    #[error("duplicate task identifier: {0}")]
    DuplicateTask(TaskId),

    /// The task was not found.
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    /// The record changed since it was read.
    #[error("stale write for task {task_id}: expected {expected}, store holds {actual}")]
    VersionMismatch {
        /// Task whose write was rejected.
        task_id: TaskId,
        /// Version the writer read.
        expected: RecordVersion,
        /// Version the store currently holds.
        actual: RecordVersion,
    },

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Unavailable(Arc<dyn std::error::Error + Send + Sync>),
}

impl ProjectStoreError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Unavailable(Arc::new(err))
    }
}
