//! Error types for task domain validation and parsing.

use super::{TaskId, TaskStatus};
use thiserror::Error;

/// Errors returned while constructing or mutating domain task values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskDomainError {
    /// The task title is empty after trimming.
    #[error("task title must not be empty")]
    EmptyTitle,

    /// The requested status is not reachable from the current status.
    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition {
        /// Status the task currently holds.
        from: TaskStatus,
        /// Status that was requested.
        to: TaskStatus,
    },

    /// A tracking session is already running for the task.
    #[error("tracking session already active for task {0}")]
    SessionAlreadyActive(TaskId),

    /// No tracking session is running for the task.
    #[error("no active tracking session for task {0}")]
    NoActiveSession(TaskId),

    /// The hourly rate cannot change while a session is being tracked.
    #[error("hourly rate cannot change while task {0} is being tracked")]
    RateChangeWhileTracking(TaskId),
}

/// Error returned while strictly parsing task statuses from raw input.
///
/// Lossy call sites use [`TaskStatus::normalize`] instead, which maps
/// unrecognised input to [`TaskStatus::Todo`].
///
/// [`TaskStatus::normalize`]: super::TaskStatus::normalize
/// [`TaskStatus::Todo`]: super::TaskStatus::Todo
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown task status: {0}")]
pub struct ParseTaskStatusError(pub String);
