//! In-memory project store with per-task version checks.
//!
//! Reference adapter for tests and local single-process use. It enforces
//! the same compare-and-swap contract a remote document store adapter
//! must provide, which makes it the test bed for the lost-update
//! scenarios the port exists to prevent.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::watch;

use crate::task::{
    domain::{ProjectSnapshot, RecordVersion, Task, TaskId, TaskRecord, TimeEntry},
    ports::{ProjectStore, ProjectStoreError, ProjectStoreResult},
};

/// Thread-safe in-memory project document store.
#[derive(Debug, Clone)]
pub struct InMemoryProjectStore {
    state: Arc<RwLock<InMemoryProjectState>>,
    changes: watch::Sender<ProjectSnapshot>,
}

#[derive(Debug, Default)]
struct InMemoryProjectState {
    records: HashMap<TaskId, TaskRecord>,
    insertion_order: Vec<TaskId>,
    time_entries: Vec<TimeEntry>,
    last_modified: Option<DateTime<Utc>>,
}

impl InMemoryProjectState {
    fn to_snapshot(&self) -> ProjectSnapshot {
        ProjectSnapshot {
            tasks: self
                .insertion_order
                .iter()
                .filter_map(|id| self.records.get(id).cloned())
                .collect(),
            time_entries: self.time_entries.clone(),
            last_modified: self.last_modified,
        }
    }

    fn touch(&mut self, timestamp: DateTime<Utc>) {
        self.last_modified = Some(self.last_modified.map_or(timestamp, |t| t.max(timestamp)));
    }

    fn cas_replace(
        &mut self,
        expected: RecordVersion,
        task: &Task,
    ) -> ProjectStoreResult<TaskRecord> {
        let current = self
            .records
            .get(&task.id())
            .ok_or(ProjectStoreError::TaskNotFound(task.id()))?;
        if current.version != expected {
            return Err(ProjectStoreError::VersionMismatch {
                task_id: task.id(),
                expected,
                actual: current.version,
            });
        }
        let record = TaskRecord::new(task.clone(), expected.next());
        self.records.insert(task.id(), record.clone());
        self.touch(task.last_modified());
        Ok(record)
    }
}

impl InMemoryProjectStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        let (changes, _) = watch::channel(ProjectSnapshot::default());
        Self {
            state: Arc::new(RwLock::new(InMemoryProjectState::default())),
            changes,
        }
    }

    fn read_state(&self) -> ProjectStoreResult<std::sync::RwLockReadGuard<'_, InMemoryProjectState>> {
        self.state
            .read()
            .map_err(|err| ProjectStoreError::persistence(std::io::Error::other(err.to_string())))
    }

    fn write_state(
        &self,
    ) -> ProjectStoreResult<std::sync::RwLockWriteGuard<'_, InMemoryProjectState>> {
        self.state
            .write()
            .map_err(|err| ProjectStoreError::persistence(std::io::Error::other(err.to_string())))
    }

    fn publish(&self, state: &InMemoryProjectState) {
        // send_replace delivers even with no live subscribers.
        let _ = self.changes.send_replace(state.to_snapshot());
    }
}

impl Default for InMemoryProjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProjectStore for InMemoryProjectStore {
    async fn snapshot(&self) -> ProjectStoreResult<ProjectSnapshot> {
        Ok(self.read_state()?.to_snapshot())
    }

    async fn insert_task(&self, task: &Task) -> ProjectStoreResult<TaskRecord> {
        let mut state = self.write_state()?;
        if state.records.contains_key(&task.id()) {
            return Err(ProjectStoreError::DuplicateTask(task.id()));
        }
        let record = TaskRecord::new(task.clone(), RecordVersion::initial());
        state.records.insert(task.id(), record.clone());
        state.insertion_order.push(task.id());
        state.touch(task.last_modified());
        self.publish(&state);
        Ok(record)
    }

    async fn read_task(&self, id: TaskId) -> ProjectStoreResult<Option<TaskRecord>> {
        Ok(self.read_state()?.records.get(&id).cloned())
    }

    async fn compare_and_update(
        &self,
        expected: RecordVersion,
        task: &Task,
    ) -> ProjectStoreResult<TaskRecord> {
        let mut state = self.write_state()?;
        let record = state.cas_replace(expected, task)?;
        self.publish(&state);
        Ok(record)
    }

    async fn compare_and_update_with_entry(
        &self,
        expected: RecordVersion,
        task: &Task,
        entry: &TimeEntry,
    ) -> ProjectStoreResult<TaskRecord> {
        // Record replacement and ledger append happen under one lock, so
        // a rejected write leaves neither behind.
        let mut state = self.write_state()?;
        let record = state.cas_replace(expected, task)?;
        state.time_entries.push(entry.clone());
        state.touch(entry.end_time());
        self.publish(&state);
        Ok(record)
    }

    fn watch(&self) -> watch::Receiver<ProjectSnapshot> {
        self.changes.subscribe()
    }
}
