//! Domain model for the task/review lifecycle.
//!
//! The task domain models task creation and mutation, the status state
//! machine, append-only status history, and per-task time tracking
//! while keeping all infrastructure concerns outside of the domain
//! boundary.

mod error;
mod ids;
mod project;
mod status;
mod task;
mod time_entry;

pub use error::{ParseTaskStatusError, TaskDomainError};
pub use ids::{TaskId, TimeEntryId};
pub use project::{ProjectSnapshot, RecordVersion, TaskRecord};
pub use status::TaskStatus;
pub use task::{NewTask, PersistedTaskData, StatusHistoryEntry, Subtask, Task, TaskPatch};
pub use time_entry::{ActiveTrackingSession, HourlyRate, TimeEntry};
