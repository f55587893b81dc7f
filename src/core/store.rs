//! Task store contract consumed by the scheduler and executor.

use async_trait::async_trait;

use super::error::SchedulerError;
use super::record::{TaskId, TaskKind, TaskRecord, TaskStatus};

/// Result of an admission attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    /// The record moved `Pending -> Running`; this caller owns it.
    Claimed(TaskRecord),
    /// The record was not `Pending` (another claimant won) or is gone.
    Lost {
        /// Status observed instead, `None` when the record no longer exists.
        observed: Option<TaskStatus>,
    },
}

impl ClaimOutcome {
    /// The claimed record, if this caller won.
    #[must_use]
    pub fn into_claimed(self) -> Option<TaskRecord> {
        match self {
            Self::Claimed(record) => Some(record),
            Self::Lost { .. } => None,
        }
    }
}

/// Durable owner of task records.
///
/// Implementations must make [`TaskStore::claim`] atomic: of any number of
/// concurrent claims on one `Pending` record, exactly one succeeds. Every
/// other status change goes through [`TaskStore::persist`], which refuses
/// illegal lifecycle transitions.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Create a `Pending` record, assigning its id and timestamps.
    async fn insert(
        &self,
        kind: TaskKind,
        payload: serde_json::Value,
    ) -> Result<TaskRecord, SchedulerError>;

    /// Fetch one record.
    async fn get(&self, id: TaskId) -> Result<Option<TaskRecord>, SchedulerError>;

    /// Records with `status`, oldest first (`created_at`, then `id`).
    async fn list_by_status(&self, status: TaskStatus) -> Result<Vec<TaskRecord>, SchedulerError>;

    /// `Pending` records, oldest first (`created_at`, then `id`).
    async fn list_pending(&self) -> Result<Vec<TaskRecord>, SchedulerError> {
        self.list_by_status(TaskStatus::Pending).await
    }

    /// Records that have left `Pending`, oldest first.
    async fn list_finished(&self) -> Result<Vec<TaskRecord>, SchedulerError> {
        let mut out = Vec::new();
        for status in [TaskStatus::Running, TaskStatus::Completed, TaskStatus::Failed] {
            out.extend(self.list_by_status(status).await?);
        }
        out.sort_by_key(|r| (r.created_at_ms, r.id));
        Ok(out)
    }

    /// Number of `Running` records, read fresh from the store.
    async fn count_running(&self) -> Result<usize, SchedulerError> {
        Ok(self.list_by_status(TaskStatus::Running).await?.len())
    }

    /// Atomically move `id` from `Pending` to `Running`.
    async fn claim(&self, id: TaskId) -> Result<ClaimOutcome, SchedulerError>;

    /// Write back status, timestamps and error fields, returning the stored
    /// copy with `updated_at` refreshed.
    async fn persist(&self, record: &TaskRecord) -> Result<TaskRecord, SchedulerError>;

    /// Return a terminal record to `Pending` with its error text cleared.
    async fn reset(&self, id: TaskId) -> Result<TaskRecord, SchedulerError>;

    /// Return an orphaned `Running` record to `Pending`.
    ///
    /// Only safe when no executor still owns the record, e.g. after the
    /// server that claimed it has stopped.
    async fn requeue(&self, id: TaskId) -> Result<TaskRecord, SchedulerError>;
}
