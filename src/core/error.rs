//! Error types for scheduler operations and task failures.

use std::backtrace::Backtrace;

use thiserror::Error;

use super::record::{TaskId, TaskKind, TaskStatus};

/// Errors produced by scheduler components and store backends.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Backend-specific failure with context (store unavailable, I/O, ...).
    #[error("backend error: {0}")]
    Backend(String),
    /// No record with this id exists.
    #[error("task {0} not found")]
    NotFound(TaskId),
    /// The requested status change is not a legal lifecycle transition.
    #[error("task {id}: illegal transition {from} -> {to}")]
    InvalidTransition {
        /// Record being updated.
        id: TaskId,
        /// Status currently stored.
        from: TaskStatus,
        /// Status requested.
        to: TaskStatus,
    },
    /// A process factory is already registered for this kind.
    #[error("duplicate process for kind `{0}`")]
    DuplicateProcess(TaskKind),
    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A record or payload could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for SchedulerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;

/// A failure signaled deliberately by a process implementation.
///
/// The message is recorded verbatim as the task's `error_message`. The debug
/// detail, or the stack trace captured when the error was built, becomes
/// `debug_detail`.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct TaskError {
    message: String,
    debug: Option<String>,
    trace: String,
}

impl TaskError {
    /// Build a task error with only a short message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            debug: None,
            trace: Backtrace::force_capture().to_string(),
        }
    }

    /// Attach extended diagnostic text.
    #[must_use]
    pub fn with_debug(mut self, debug: impl Into<String>) -> Self {
        self.debug = Some(debug.into());
        self
    }

    /// Short human-readable summary.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Debug detail supplied by the implementer, if any.
    #[must_use]
    pub fn debug(&self) -> Option<&str> {
        self.debug.as_deref()
    }

    /// Stack trace captured at construction.
    #[must_use]
    pub fn trace(&self) -> &str {
        &self.trace
    }

    /// Debug detail to persist: the supplied detail, else the captured trace.
    #[must_use]
    pub fn debug_detail(&self) -> String {
        self.debug.clone().unwrap_or_else(|| self.trace.clone())
    }
}
