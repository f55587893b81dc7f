//! In-memory task store for development and testing.

use async_trait::async_trait;
use parking_lot::Mutex;

use super::table::TaskTable;
use crate::core::{ClaimOutcome, SchedulerError, TaskId, TaskKind, TaskRecord, TaskStatus, TaskStore};
use crate::util::clock::now_ms;

/// Task store keeping every record in process memory.
///
/// The table lock is held only for the duration of one synchronous table
/// operation, never across an `.await`.
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    table: Mutex<TaskTable>,
}

impl InMemoryTaskStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store with existing records (ids are kept).
    pub fn with_records(records: impl IntoIterator<Item = TaskRecord>) -> Self {
        Self {
            table: Mutex::new(TaskTable::from_records(records)),
        }
    }

    /// Snapshot of every record in id order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<TaskRecord> {
        self.table.lock().records().cloned().collect()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn insert(
        &self,
        kind: TaskKind,
        payload: serde_json::Value,
    ) -> Result<TaskRecord, SchedulerError> {
        Ok(self.table.lock().insert(kind, payload, now_ms()))
    }

    async fn get(&self, id: TaskId) -> Result<Option<TaskRecord>, SchedulerError> {
        Ok(self.table.lock().get(id).cloned())
    }

    async fn list_by_status(&self, status: TaskStatus) -> Result<Vec<TaskRecord>, SchedulerError> {
        Ok(self.table.lock().list_by_status(status))
    }

    async fn count_running(&self) -> Result<usize, SchedulerError> {
        Ok(self.table.lock().count(TaskStatus::Running))
    }

    async fn claim(&self, id: TaskId) -> Result<ClaimOutcome, SchedulerError> {
        Ok(self.table.lock().claim(id, now_ms()))
    }

    async fn persist(&self, record: &TaskRecord) -> Result<TaskRecord, SchedulerError> {
        self.table.lock().persist(record, now_ms())
    }

    async fn reset(&self, id: TaskId) -> Result<TaskRecord, SchedulerError> {
        self.table.lock().reset(id, now_ms())
    }

    async fn requeue(&self, id: TaskId) -> Result<TaskRecord, SchedulerError> {
        self.table.lock().requeue(id, now_ms())
    }
}
