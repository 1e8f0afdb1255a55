//! Task status state machine and transition table.

use super::{ParseTaskStatusError, TaskDomainError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Task lifecycle status.
///
/// No status is terminal: `Completed` and `Approved` both loop back
/// through `NeedsRevision`, modelling rework after sign-off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Work has not started.
    Todo,
    /// Work is underway.
    InProgress,
    /// Work is awaiting review.
    InReview,
    /// Review found problems that need rework.
    NeedsRevision,
    /// Work has been finished by the assignee.
    Completed,
    /// Finished work has been signed off.
    Approved,
}

impl TaskStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Todo => "TODO",
            Self::InProgress => "IN_PROGRESS",
            Self::InReview => "IN_REVIEW",
            Self::NeedsRevision => "NEEDS_REVISION",
            Self::Completed => "COMPLETED",
            Self::Approved => "APPROVED",
        }
    }

    /// Normalises raw status input, defaulting unrecognised values.
    ///
    /// Trims, uppercases, and maps interior spaces to underscores before
    /// matching, so `"in progress"` and `"IN_PROGRESS"` both resolve to
    /// [`Self::InProgress`]. Anything still unrecognised becomes
    /// [`Self::Todo`], which also gives unmapped legacy statuses `Todo`'s
    /// outgoing transition set.
    #[must_use]
    pub fn normalize(value: &str) -> Self {
        Self::try_from(value).unwrap_or(Self::Todo)
    }

    /// Returns the statuses reachable from this status in one step.
    #[must_use]
    pub const fn allowed_transitions(self) -> &'static [Self] {
        match self {
            Self::Todo => &[Self::InProgress],
            Self::InProgress => &[Self::InReview, Self::Todo],
            Self::InReview => &[Self::Completed, Self::NeedsRevision],
            Self::NeedsRevision => &[Self::InProgress, Self::InReview],
            Self::Completed => &[Self::Approved, Self::NeedsRevision],
            Self::Approved => &[Self::Completed, Self::NeedsRevision],
        }
    }

    /// Returns whether the given status is reachable in one step.
    #[must_use]
    pub fn can_transition_to(self, to: Self) -> bool {
        self.allowed_transitions().contains(&to)
    }

    /// Validates a transition, without mutating anything.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidTransition`] naming both statuses
    /// when `to` is not reachable from `self`.
    pub fn validate_transition(self, to: Self) -> Result<(), TaskDomainError> {
        if !self.can_transition_to(to) {
            return Err(TaskDomainError::InvalidTransition { from: self, to });
        }
        Ok(())
    }
}

impl TryFrom<&str> for TaskStatus {
    type Error = ParseTaskStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_uppercase().replace(' ', "_");
        match normalized.as_str() {
            "TODO" => Ok(Self::Todo),
            "IN_PROGRESS" => Ok(Self::InProgress),
            "IN_REVIEW" => Ok(Self::InReview),
            "NEEDS_REVISION" => Ok(Self::NeedsRevision),
            "COMPLETED" => Ok(Self::Completed),
            "APPROVED" => Ok(Self::Approved),
            _ => Err(ParseTaskStatusError(value.to_owned())),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
