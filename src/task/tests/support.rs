//! Test doubles and helpers shared by task lifecycle tests.

#![expect(
    clippy::expect_used,
    reason = "Test code uses expect for assertion clarity"
)]

use crate::task::adapters::memory::InMemoryProjectStore;
use crate::task::domain::{ProjectSnapshot, RecordVersion, Task, TaskId, TaskRecord, TimeEntry};
use crate::task::ports::{ProjectStore, ProjectStoreError, ProjectStoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Local, TimeZone, Utc};
use mockable::Clock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::sync::watch;

/// Deterministic clock advanced explicitly by tests.
#[derive(Debug)]
pub(super) struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Creates a clock frozen at a fixed, readable instant.
    pub(super) fn new() -> Self {
        Self::at(Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).single().expect("valid timestamp"))
    }

    pub(super) fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Moves the clock forward.
    pub(super) fn advance(&self, delta: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += delta;
    }
}

impl Clock for ManualClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Store wrapper with switchable failure modes.
///
/// `fail_writes` makes every mutating operation return `Unavailable`,
/// simulating an unreachable document store; `force_stale` makes every
/// compare-and-swap report a version mismatch, simulating a write that
/// keeps losing to other writers.
#[derive(Debug, Default)]
pub(super) struct UnreliableStore {
    inner: InMemoryProjectStore,
    fail_writes: AtomicBool,
    force_stale: AtomicBool,
}

impl UnreliableStore {
    pub(super) fn new() -> Self {
        Self::default()
    }

    pub(super) fn fail_writes(&self, enabled: bool) {
        self.fail_writes.store(enabled, Ordering::SeqCst);
    }

    pub(super) fn force_stale(&self, enabled: bool) {
        self.force_stale.store(enabled, Ordering::SeqCst);
    }

    fn check_available(&self) -> ProjectStoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ProjectStoreError::persistence(std::io::Error::other(
                "store unreachable",
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ProjectStore for UnreliableStore {
    async fn snapshot(&self) -> ProjectStoreResult<ProjectSnapshot> {
        self.inner.snapshot().await
    }

    async fn insert_task(&self, task: &Task) -> ProjectStoreResult<TaskRecord> {
        self.check_available()?;
        self.inner.insert_task(task).await
    }

    async fn read_task(&self, id: TaskId) -> ProjectStoreResult<Option<TaskRecord>> {
        self.inner.read_task(id).await
    }

    async fn compare_and_update(
        &self,
        expected: RecordVersion,
        task: &Task,
    ) -> ProjectStoreResult<TaskRecord> {
        self.check_available()?;
        if self.force_stale.load(Ordering::SeqCst) {
            return Err(ProjectStoreError::VersionMismatch {
                task_id: task.id(),
                expected,
                actual: expected.next(),
            });
        }
        self.inner.compare_and_update(expected, task).await
    }

    async fn compare_and_update_with_entry(
        &self,
        expected: RecordVersion,
        task: &Task,
        entry: &TimeEntry,
    ) -> ProjectStoreResult<TaskRecord> {
        self.check_available()?;
        if self.force_stale.load(Ordering::SeqCst) {
            return Err(ProjectStoreError::VersionMismatch {
                task_id: task.id(),
                expected,
                actual: expected.next(),
            });
        }
        self.inner
            .compare_and_update_with_entry(expected, task, entry)
            .await
    }

    fn watch(&self) -> watch::Receiver<ProjectSnapshot> {
        self.inner.watch()
    }
}

/// Polls a condition until it holds or a second passes.
pub(super) async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..100 {
        if condition() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("condition not reached within one second");
}
