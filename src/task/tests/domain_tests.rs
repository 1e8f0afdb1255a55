//! Domain-focused tests for the task aggregate.

#![expect(
    clippy::expect_used,
    reason = "Test code uses expect for assertion clarity"
)]
#![expect(
    clippy::indexing_slicing,
    reason = "Test code uses indexing after length checks"
)]

use super::support::ManualClock;
use crate::task::domain::{
    HourlyRate, NewTask, Subtask, Task, TaskDomainError, TaskPatch, TaskStatus,
};
use chrono::Duration;
use rstest::{fixture, rstest};

#[fixture]
fn clock() -> ManualClock {
    ManualClock::new()
}

fn draft_task(clock: &ManualClock) -> Task {
    Task::create(NewTask::new("Draft logo", "mara"), clock).expect("valid task")
}

#[rstest]
fn create_assigns_id_timestamps_and_first_history_entry(clock: ManualClock) {
    let task = Task::create(
        NewTask::new("Draft logo", "mara")
            .with_description("Two concepts for the client review")
            .with_assignee("jonas")
            .with_subtasks(vec![Subtask::new("Collect references")]),
        &clock,
    )
    .expect("valid task");

    assert_eq!(task.title(), "Draft logo");
    assert_eq!(task.description(), Some("Two concepts for the client review"));
    assert_eq!(task.assigned_to(), Some("jonas"));
    assert_eq!(task.status(), TaskStatus::Todo);
    assert_eq!(task.created_at(), task.last_modified());
    assert_eq!(task.time_spent_ms(), 0);

    let history = task.status_history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, TaskStatus::Todo);
    assert_eq!(history[0].updated_by, "mara");
    assert_eq!(history[0].timestamp, task.created_at());
}

#[rstest]
fn create_honours_explicit_initial_status(clock: ManualClock) {
    let task = Task::create(
        NewTask::new("Review brief", "mara").with_status(TaskStatus::InProgress),
        &clock,
    )
    .expect("valid task");

    assert_eq!(task.status(), TaskStatus::InProgress);
    assert_eq!(task.status_history()[0].status, TaskStatus::InProgress);
}

#[rstest]
fn create_rejects_blank_title(clock: ManualClock) {
    let result = Task::create(NewTask::new("   ", "mara"), &clock);
    assert_eq!(result, Err(TaskDomainError::EmptyTitle));
}

#[rstest]
fn apply_patch_merges_fields_and_bumps_last_modified(clock: ManualClock) {
    let mut task = draft_task(&clock);
    let created = task.last_modified();
    clock.advance(Duration::minutes(5));

    task.apply_patch(
        TaskPatch::new()
            .with_title("Draft logo v2")
            .with_assignee("mara"),
        &clock,
    )
    .expect("valid patch");

    assert_eq!(task.title(), "Draft logo v2");
    assert_eq!(task.assigned_to(), Some("mara"));
    assert!(task.last_modified() > created);
    // Untouched fields survive the merge.
    assert_eq!(task.status(), TaskStatus::Todo);
}

#[rstest]
fn apply_patch_rejects_blank_title_without_mutation(clock: ManualClock) {
    let mut task = draft_task(&clock);
    let before = task.clone();

    let result = task.apply_patch(TaskPatch::new().with_title("  "), &clock);

    assert_eq!(result, Err(TaskDomainError::EmptyTitle));
    assert_eq!(task, before);
}

#[rstest]
fn apply_status_appends_history_in_order(clock: ManualClock) {
    let mut task = draft_task(&clock);
    clock.advance(Duration::minutes(1));

    let applied = task
        .apply_status(TaskStatus::InProgress, "jonas", clock_now(&clock))
        .expect("valid transition");

    assert!(applied);
    assert_eq!(task.status(), TaskStatus::InProgress);
    let history = task.status_history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].status, TaskStatus::InProgress);
    assert_eq!(history[1].updated_by, "jonas");
    assert!(history[1].timestamp >= history[0].timestamp);
}

#[rstest]
fn apply_status_rejects_forced_skip_without_mutation(clock: ManualClock) {
    let mut task = Task::create(
        NewTask::new("Review brief", "mara").with_status(TaskStatus::InProgress),
        &clock,
    )
    .expect("valid task");
    let before = task.clone();

    let result = task.apply_status(TaskStatus::Approved, "jonas", clock_now(&clock));

    assert_eq!(
        result,
        Err(TaskDomainError::InvalidTransition {
            from: TaskStatus::InProgress,
            to: TaskStatus::Approved,
        })
    );
    assert_eq!(task, before);
}

#[rstest]
fn duplicate_status_submission_is_idempotent(clock: ManualClock) {
    let mut task = draft_task(&clock);
    clock.advance(Duration::seconds(30));
    let timestamp = clock_now(&clock);

    let first = task
        .apply_status(TaskStatus::InProgress, "jonas", timestamp)
        .expect("valid transition");
    let second = task
        .apply_status(TaskStatus::InProgress, "jonas", timestamp)
        .expect("duplicate must not error");

    assert!(first);
    assert!(!second);
    assert_eq!(task.status_history().len(), 2);
}

#[rstest]
fn force_status_bypasses_table_and_marks_the_entry(clock: ManualClock) {
    let mut task = draft_task(&clock);
    clock.advance(Duration::seconds(10));

    let applied = task.force_status(TaskStatus::Approved, "mara", clock_now(&clock));

    assert!(applied);
    assert_eq!(task.status(), TaskStatus::Approved);
    let last = task.status_history().last().expect("history entry");
    assert_eq!(last.comment.as_deref(), Some("forced override"));
}

#[rstest]
fn history_timestamps_never_decrease(clock: ManualClock) {
    let mut task = draft_task(&clock);
    let before_creation = task.created_at() - Duration::minutes(10);

    task.apply_status(TaskStatus::InProgress, "jonas", before_creation)
        .expect("valid transition");

    let history = task.status_history();
    assert_eq!(history[1].timestamp, history[0].timestamp);
}

#[rstest]
fn session_accounting_adds_measured_duration_exactly_once(clock: ManualClock) {
    let mut task = Task::create(
        NewTask::new("Billable design work", "mara")
            .with_hourly_rate(HourlyRate::from_cents(6000)),
        &clock,
    )
    .expect("valid task");

    task.start_session(&clock).expect("session starts");
    assert!(task.active_session().is_some());

    clock.advance(Duration::hours(1));
    let entry = task.stop_session(&clock).expect("session stops");

    assert_eq!(task.time_spent_ms(), 3_600_000);
    assert!(task.active_session().is_none());
    assert_eq!(entry.duration_secs(), 3600);
    assert_eq!(entry.hourly_rate(), Some(HourlyRate::from_cents(6000)));
    assert_eq!(entry.cost_cents(), 6000);
    assert_eq!(entry.task_id(), task.id());
}

#[rstest]
fn second_session_resumes_from_accumulated_base(clock: ManualClock) {
    let mut task = draft_task(&clock);
    task.start_session(&clock).expect("first session");
    clock.advance(Duration::minutes(30));
    task.stop_session(&clock).expect("first stop");

    task.start_session(&clock).expect("second session");
    let session = task.active_session().expect("running session");
    assert_eq!(session.base_time_spent_ms(), 1_800_000);

    clock.advance(Duration::minutes(15));
    task.stop_session(&clock).expect("second stop");
    assert_eq!(task.time_spent_ms(), 2_700_000);
}

#[rstest]
fn start_while_running_and_stop_while_idle_are_errors(clock: ManualClock) {
    let mut task = draft_task(&clock);

    assert_eq!(
        task.stop_session(&clock),
        Err(TaskDomainError::NoActiveSession(task.id()))
    );

    task.start_session(&clock).expect("session starts");
    assert_eq!(
        task.start_session(&clock),
        Err(TaskDomainError::SessionAlreadyActive(task.id()))
    );
}

#[rstest]
fn rate_change_is_rejected_while_tracking(clock: ManualClock) {
    let mut task = draft_task(&clock);
    task.start_session(&clock).expect("session starts");

    let result = task.apply_patch(
        TaskPatch::new().with_hourly_rate(HourlyRate::from_cents(9000)),
        &clock,
    );

    assert_eq!(
        result,
        Err(TaskDomainError::RateChangeWhileTracking(task.id()))
    );
}

fn clock_now(clock: &ManualClock) -> chrono::DateTime<chrono::Utc> {
    use mockable::Clock as _;
    clock.utc()
}
