//! Operational surface over a [`TaskStore`]: submitting work, inspecting
//! queue state and re-queueing finished records.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::{SchedulerError, TaskId, TaskKind, TaskRecord, TaskStatus, TaskStore};

/// Task submission payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSubmission {
    /// Process kind that will execute the record.
    pub kind: TaskKind,
    /// Opaque input handed to the process.
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Per-status record counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    /// Records waiting for admission.
    pub pending: usize,
    /// Records currently executing.
    pub running: usize,
    /// Records that finished successfully.
    pub completed: usize,
    /// Records that finished with an error.
    pub failed: usize,
}

impl StatusCounts {
    /// Sum over all statuses.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.pending + self.running + self.completed + self.failed
    }
}

/// Health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    /// Store reachable.
    pub ok: bool,
    /// Counts at the time of the check, when the store answered.
    pub counts: Option<StatusCounts>,
}

/// Create a `Pending` record for the scheduler to pick up.
///
/// # Errors
///
/// Propagates store failures.
pub async fn submit_task(
    store: &dyn TaskStore,
    req: TaskSubmission,
) -> Result<TaskRecord, SchedulerError> {
    let record = store.insert(req.kind, req.payload).await?;
    info!(task_id = record.id, kind = %record.kind, "task submitted");
    Ok(record)
}

/// Count records by status.
///
/// # Errors
///
/// Propagates store failures.
pub async fn status_counts(store: &dyn TaskStore) -> Result<StatusCounts, SchedulerError> {
    let mut counts = StatusCounts::default();
    for status in TaskStatus::ALL {
        let n = store.list_by_status(status).await?.len();
        match status {
            TaskStatus::Pending => counts.pending = n,
            TaskStatus::Running => counts.running = n,
            TaskStatus::Completed => counts.completed = n,
            TaskStatus::Failed => counts.failed = n,
        }
    }
    Ok(counts)
}

/// List records, optionally restricted to one status, oldest first.
///
/// # Errors
///
/// Propagates store failures.
pub async fn list_tasks(
    store: &dyn TaskStore,
    status: Option<TaskStatus>,
) -> Result<Vec<TaskRecord>, SchedulerError> {
    match status {
        Some(status) => store.list_by_status(status).await,
        None => {
            let mut all = store.list_pending().await?;
            all.extend(store.list_finished().await?);
            all.sort_by_key(|r| (r.created_at_ms, r.id));
            Ok(all)
        }
    }
}

/// Put a finished record back into `Pending`.
///
/// With `force`, a `Running` record is requeued as well. Only force a record
/// whose server has stopped; a live executor would otherwise run it twice.
///
/// # Errors
///
/// [`SchedulerError::NotFound`] for unknown ids and
/// [`SchedulerError::InvalidTransition`] for `Pending` records, or for
/// `Running` ones without `force`.
pub async fn reset_task(
    store: &dyn TaskStore,
    id: TaskId,
    force: bool,
) -> Result<TaskRecord, SchedulerError> {
    let current = store.get(id).await?.ok_or(SchedulerError::NotFound(id))?;
    let record = if force && current.status == TaskStatus::Running {
        let record = store.requeue(id).await?;
        warn!(task_id = id, "running task forcibly requeued");
        record
    } else {
        let record = store.reset(id).await?;
        info!(task_id = id, "task reset to pending");
        record
    };
    Ok(record)
}

/// Requeue every `Running` record, for startup after an unclean stop.
///
/// # Errors
///
/// Propagates store failures; records requeued before the failure stay
/// `Pending`.
pub async fn requeue_running(store: &dyn TaskStore) -> Result<Vec<TaskRecord>, SchedulerError> {
    let mut requeued = Vec::new();
    for record in store.list_by_status(TaskStatus::Running).await? {
        match store.requeue(record.id).await {
            Ok(record) => requeued.push(record),
            // Finished between listing and requeue.
            Err(SchedulerError::InvalidTransition { .. }) => {}
            Err(err) => return Err(err),
        }
    }
    if !requeued.is_empty() {
        warn!(count = requeued.len(), "requeued orphaned running tasks");
    }
    Ok(requeued)
}

/// Probe the store.
pub async fn health(store: &dyn TaskStore) -> Health {
    match status_counts(store).await {
        Ok(counts) => Health {
            ok: true,
            counts: Some(counts),
        },
        Err(_) => Health {
            ok: false,
            counts: None,
        },
    }
}
