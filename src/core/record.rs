//! The persisted task record and its lifecycle invariants.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::SchedulerError;

/// Store-assigned unique task identifier.
pub type TaskId = u64;

/// Lifecycle state of a task record. Exactly one holds at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting to be admitted.
    Pending,
    /// Claimed by an executor.
    Running,
    /// Finished without error. Terminal.
    Completed,
    /// Finished with an error. Terminal.
    Failed,
}

impl TaskStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [Self; 4] = [Self::Pending, Self::Running, Self::Completed, Self::Failed];

    /// Whether the record is finished.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether a persist may move a record from `self` to `next`.
    ///
    /// Terminal records only leave their state through an explicit reset.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Pending | Self::Running)
                | (Self::Running, Self::Running | Self::Completed | Self::Failed)
                | (Self::Completed, Self::Completed)
                | (Self::Failed, Self::Failed)
        )
    }

    /// Lowercase name, as serialized.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown task status `{s}`"))
    }
}

/// Identifier of a task type, resolved through the process registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskKind(String);

impl TaskKind {
    /// Wrap a task-type name.
    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }

    /// Borrow the name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskKind {
    fn from(kind: &str) -> Self {
        Self::new(kind)
    }
}

/// Durable state of one schedulable unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Unique identifier assigned by the store.
    pub id: TaskId,
    /// Task type.
    pub kind: TaskKind,
    /// Opaque input for the process implementation.
    #[serde(default)]
    pub payload: serde_json::Value,
    /// Current lifecycle state.
    pub status: TaskStatus,
    /// Creation time, ms since epoch. Never changes after first persist.
    pub created_at_ms: u128,
    /// Last persist time, ms since epoch.
    pub updated_at_ms: u128,
    /// Short failure summary; only set when `Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Extended diagnostics; only set when `Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_detail: Option<String>,
}

impl TaskRecord {
    /// A fresh `Pending` record.
    #[must_use]
    pub fn new(id: TaskId, kind: TaskKind, payload: serde_json::Value, now_ms: u128) -> Self {
        Self {
            id,
            kind,
            payload,
            status: TaskStatus::Pending,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
            error_message: None,
            debug_detail: None,
        }
    }

    /// Whether the record reached `Completed` or `Failed`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Refresh `updated_at_ms`, never moving it before `created_at_ms`.
    pub fn touch(&mut self, now_ms: u128) {
        self.updated_at_ms = now_ms.max(self.created_at_ms).max(self.updated_at_ms);
    }

    /// Move `Pending -> Running`.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::InvalidTransition`] unless the record is `Pending`.
    pub fn start(&mut self, now_ms: u128) -> Result<(), SchedulerError> {
        self.transition(TaskStatus::Running)?;
        self.touch(now_ms);
        Ok(())
    }

    /// Move `Running -> Completed`.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::InvalidTransition`] unless the record is `Running`.
    pub fn complete(&mut self) -> Result<(), SchedulerError> {
        self.transition(TaskStatus::Completed)?;
        self.error_message = None;
        self.debug_detail = None;
        Ok(())
    }

    /// Move `Running -> Failed` with error text.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::InvalidTransition`] unless the record is `Running`.
    pub fn fail(
        &mut self,
        message: impl Into<String>,
        debug_detail: Option<String>,
    ) -> Result<(), SchedulerError> {
        self.transition(TaskStatus::Failed)?;
        self.error_message = Some(message.into());
        self.debug_detail = debug_detail;
        Ok(())
    }

    /// Return a terminal record to `Pending`, clearing error text.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::InvalidTransition`] unless the record is terminal.
    pub fn reset(&mut self, now_ms: u128) -> Result<(), SchedulerError> {
        if !self.is_terminal() {
            return Err(SchedulerError::InvalidTransition {
                id: self.id,
                from: self.status,
                to: TaskStatus::Pending,
            });
        }
        self.status = TaskStatus::Pending;
        self.error_message = None;
        self.debug_detail = None;
        self.touch(now_ms);
        Ok(())
    }

    /// Return an orphaned `Running` record to `Pending`.
    ///
    /// Operator recovery for executions lost to a crash or shutdown; the
    /// caller must know no executor still owns the record.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::InvalidTransition`] unless the record is `Running`.
    pub fn requeue(&mut self, now_ms: u128) -> Result<(), SchedulerError> {
        if self.status != TaskStatus::Running {
            return Err(SchedulerError::InvalidTransition {
                id: self.id,
                from: self.status,
                to: TaskStatus::Pending,
            });
        }
        self.status = TaskStatus::Pending;
        self.error_message = None;
        self.debug_detail = None;
        self.touch(now_ms);
        Ok(())
    }

    fn transition(&mut self, to: TaskStatus) -> Result<(), SchedulerError> {
        if self.status == to || !self.status.can_transition_to(to) {
            return Err(SchedulerError::InvalidTransition {
                id: self.id,
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}
