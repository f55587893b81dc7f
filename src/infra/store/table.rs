//! Task table shared by the in-process store backends.
//!
//! All operations are synchronous and expect the caller to hold the
//! backend's lock, which is what makes `claim` atomic.

use std::collections::BTreeMap;

use crate::core::{ClaimOutcome, SchedulerError, TaskId, TaskKind, TaskRecord, TaskStatus};

/// Records keyed by id, plus the id sequence.
#[derive(Debug, Clone, Default)]
pub struct TaskTable {
    next_id: TaskId,
    records: BTreeMap<TaskId, TaskRecord>,
}

impl TaskTable {
    /// Empty table; the first inserted record gets id `1`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a table from stored records, continuing the id sequence.
    pub fn from_records(records: impl IntoIterator<Item = TaskRecord>) -> Self {
        let records: BTreeMap<_, _> = records.into_iter().map(|r| (r.id, r)).collect();
        let next_id = records.keys().next_back().copied().unwrap_or(0);
        Self { next_id, records }
    }

    /// Add a `Pending` record.
    pub fn insert(&mut self, kind: TaskKind, payload: serde_json::Value, now_ms: u128) -> TaskRecord {
        self.next_id += 1;
        let record = TaskRecord::new(self.next_id, kind, payload, now_ms);
        self.records.insert(record.id, record.clone());
        record
    }

    /// Look up one record.
    #[must_use]
    pub fn get(&self, id: TaskId) -> Option<&TaskRecord> {
        self.records.get(&id)
    }

    /// Records with `status` ordered by creation time, then id.
    #[must_use]
    pub fn list_by_status(&self, status: TaskStatus) -> Vec<TaskRecord> {
        let mut out: Vec<_> = self
            .records
            .values()
            .filter(|r| r.status == status)
            .cloned()
            .collect();
        out.sort_by_key(|r| (r.created_at_ms, r.id));
        out
    }

    /// Number of records with `status`.
    #[must_use]
    pub fn count(&self, status: TaskStatus) -> usize {
        self.records.values().filter(|r| r.status == status).count()
    }

    /// Move `id` from `Pending` to `Running` if it is still `Pending`.
    pub fn claim(&mut self, id: TaskId, now_ms: u128) -> ClaimOutcome {
        match self.records.get_mut(&id) {
            Some(record) if record.status == TaskStatus::Pending => match record.start(now_ms) {
                Ok(()) => ClaimOutcome::Claimed(record.clone()),
                Err(_) => ClaimOutcome::Lost {
                    observed: Some(record.status),
                },
            },
            Some(record) => ClaimOutcome::Lost {
                observed: Some(record.status),
            },
            None => ClaimOutcome::Lost { observed: None },
        }
    }

    /// Write back status and error fields of `record`.
    ///
    /// `created_at`, `kind` and `payload` stay as stored. Error text is
    /// dropped unless the new status is `Failed`.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::NotFound`] for unknown ids and
    /// [`SchedulerError::InvalidTransition`] for illegal status changes.
    pub fn persist(&mut self, record: &TaskRecord, now_ms: u128) -> Result<TaskRecord, SchedulerError> {
        let stored = self
            .records
            .get_mut(&record.id)
            .ok_or(SchedulerError::NotFound(record.id))?;
        if !stored.status.can_transition_to(record.status) {
            return Err(SchedulerError::InvalidTransition {
                id: record.id,
                from: stored.status,
                to: record.status,
            });
        }
        stored.status = record.status;
        if record.status == TaskStatus::Failed {
            stored.error_message.clone_from(&record.error_message);
            stored.debug_detail.clone_from(&record.debug_detail);
        } else {
            stored.error_message = None;
            stored.debug_detail = None;
        }
        stored.touch(now_ms);
        Ok(stored.clone())
    }

    /// Return a terminal record to `Pending`.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::NotFound`] or [`SchedulerError::InvalidTransition`].
    pub fn reset(&mut self, id: TaskId, now_ms: u128) -> Result<TaskRecord, SchedulerError> {
        let stored = self.records.get_mut(&id).ok_or(SchedulerError::NotFound(id))?;
        stored.reset(now_ms)?;
        Ok(stored.clone())
    }

    /// Return an orphaned `Running` record to `Pending`.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::NotFound`] or [`SchedulerError::InvalidTransition`].
    pub fn requeue(&mut self, id: TaskId, now_ms: u128) -> Result<TaskRecord, SchedulerError> {
        let stored = self.records.get_mut(&id).ok_or(SchedulerError::NotFound(id))?;
        stored.requeue(now_ms)?;
        Ok(stored.clone())
    }

    /// All records in id order.
    pub fn records(&self) -> impl Iterator<Item = &TaskRecord> {
        self.records.values()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
