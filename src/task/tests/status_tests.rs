//! Unit tests for the status state machine and its transition table.

#![expect(
    clippy::expect_used,
    reason = "Test code uses expect for assertion clarity"
)]

use crate::task::domain::{ParseTaskStatusError, TaskDomainError, TaskStatus};
use eyre::ensure;
use rstest::rstest;
use serde_json::Value;

const ALL_STATUSES: [TaskStatus; 6] = [
    TaskStatus::Todo,
    TaskStatus::InProgress,
    TaskStatus::InReview,
    TaskStatus::NeedsRevision,
    TaskStatus::Completed,
    TaskStatus::Approved,
];

#[rstest]
#[case(TaskStatus::Todo, TaskStatus::Todo, false)]
#[case(TaskStatus::Todo, TaskStatus::InProgress, true)]
#[case(TaskStatus::Todo, TaskStatus::InReview, false)]
#[case(TaskStatus::Todo, TaskStatus::NeedsRevision, false)]
#[case(TaskStatus::Todo, TaskStatus::Completed, false)]
#[case(TaskStatus::Todo, TaskStatus::Approved, false)]
#[case(TaskStatus::InProgress, TaskStatus::Todo, true)]
#[case(TaskStatus::InProgress, TaskStatus::InProgress, false)]
#[case(TaskStatus::InProgress, TaskStatus::InReview, true)]
#[case(TaskStatus::InProgress, TaskStatus::NeedsRevision, false)]
#[case(TaskStatus::InProgress, TaskStatus::Completed, false)]
#[case(TaskStatus::InProgress, TaskStatus::Approved, false)]
#[case(TaskStatus::InReview, TaskStatus::Todo, false)]
#[case(TaskStatus::InReview, TaskStatus::InProgress, false)]
#[case(TaskStatus::InReview, TaskStatus::InReview, false)]
#[case(TaskStatus::InReview, TaskStatus::NeedsRevision, true)]
#[case(TaskStatus::InReview, TaskStatus::Completed, true)]
#[case(TaskStatus::InReview, TaskStatus::Approved, false)]
#[case(TaskStatus::NeedsRevision, TaskStatus::Todo, false)]
#[case(TaskStatus::NeedsRevision, TaskStatus::InProgress, true)]
#[case(TaskStatus::NeedsRevision, TaskStatus::InReview, true)]
#[case(TaskStatus::NeedsRevision, TaskStatus::NeedsRevision, false)]
#[case(TaskStatus::NeedsRevision, TaskStatus::Completed, false)]
#[case(TaskStatus::NeedsRevision, TaskStatus::Approved, false)]
#[case(TaskStatus::Completed, TaskStatus::Todo, false)]
#[case(TaskStatus::Completed, TaskStatus::InProgress, false)]
#[case(TaskStatus::Completed, TaskStatus::InReview, false)]
#[case(TaskStatus::Completed, TaskStatus::NeedsRevision, true)]
#[case(TaskStatus::Completed, TaskStatus::Completed, false)]
#[case(TaskStatus::Completed, TaskStatus::Approved, true)]
#[case(TaskStatus::Approved, TaskStatus::Todo, false)]
#[case(TaskStatus::Approved, TaskStatus::InProgress, false)]
#[case(TaskStatus::Approved, TaskStatus::InReview, false)]
#[case(TaskStatus::Approved, TaskStatus::NeedsRevision, true)]
#[case(TaskStatus::Approved, TaskStatus::Completed, true)]
#[case(TaskStatus::Approved, TaskStatus::Approved, false)]
fn can_transition_to_returns_expected(
    #[case] from: TaskStatus,
    #[case] to: TaskStatus,
    #[case] expected: bool,
) {
    assert_eq!(from.can_transition_to(to), expected);
}

#[rstest]
fn no_status_is_terminal() -> eyre::Result<()> {
    for status in ALL_STATUSES {
        ensure!(
            !status.allowed_transitions().is_empty(),
            "{status} has no outgoing transitions"
        );
    }
    Ok(())
}

#[rstest]
fn completed_and_approved_loop_back_through_needs_revision() {
    assert!(TaskStatus::Completed.can_transition_to(TaskStatus::NeedsRevision));
    assert!(TaskStatus::Approved.can_transition_to(TaskStatus::NeedsRevision));
    assert!(TaskStatus::NeedsRevision.can_transition_to(TaskStatus::InProgress));
}

#[rstest]
#[case("TODO", TaskStatus::Todo)]
#[case("in progress", TaskStatus::InProgress)]
#[case("  In Review  ", TaskStatus::InReview)]
#[case("needs_revision", TaskStatus::NeedsRevision)]
#[case("completed", TaskStatus::Completed)]
#[case("APPROVED", TaskStatus::Approved)]
fn normalize_accepts_loose_casing_and_spacing(#[case] raw: &str, #[case] expected: TaskStatus) {
    assert_eq!(TaskStatus::normalize(raw), expected);
}

#[rstest]
#[case("")]
#[case("archived")]
#[case("DONE")]
fn normalize_defaults_unrecognised_input_to_todo(#[case] raw: &str) {
    assert_eq!(TaskStatus::normalize(raw), TaskStatus::Todo);
}

#[rstest]
fn strict_parse_rejects_unknown_status() {
    assert_eq!(
        TaskStatus::try_from("archived"),
        Err(ParseTaskStatusError("archived".to_owned()))
    );
}

#[rstest]
fn validate_transition_names_both_statuses() {
    let err = TaskStatus::Todo
        .validate_transition(TaskStatus::Completed)
        .expect_err("forced skip must be rejected");
    assert_eq!(
        err,
        TaskDomainError::InvalidTransition {
            from: TaskStatus::Todo,
            to: TaskStatus::Completed,
        }
    );
    assert_eq!(
        err.to_string(),
        "invalid status transition from TODO to COMPLETED"
    );
}

#[rstest]
fn storage_form_round_trips_through_strict_parse() -> eyre::Result<()> {
    for status in ALL_STATUSES {
        ensure!(
            TaskStatus::try_from(status.as_str()) == Ok(status),
            "{status} does not round-trip through its storage form"
        );
    }
    Ok(())
}

#[rstest]
#[case(TaskStatus::Todo, "TODO")]
#[case(TaskStatus::InProgress, "IN_PROGRESS")]
#[case(TaskStatus::NeedsRevision, "NEEDS_REVISION")]
fn document_form_serialises_as_the_canonical_string(
    #[case] status: TaskStatus,
    #[case] stored: &str,
) -> eyre::Result<()> {
    ensure!(
        serde_json::to_value(status)? == Value::from(stored),
        "{status} does not serialise as {stored}"
    );
    let parsed: TaskStatus = serde_json::from_value(Value::from(stored))?;
    ensure!(parsed == status, "{stored} does not deserialise to {status}");
    Ok(())
}
