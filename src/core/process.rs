//! Extension contract for task implementations and the kind registry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::error::SchedulerError;
use super::record::{TaskKind, TaskRecord};

/// One kind of background work.
///
/// A fresh instance is built for every execution, so `setup` may stash state
/// on `self` for `run_process` and `teardown` to use. The executor always
/// calls the hooks in the order `setup`, `run_process`, `teardown`, and calls
/// `teardown` even when an earlier hook failed.
///
/// Return a [`TaskError`](super::TaskError) (through `anyhow`) to report an
/// expected failure with a readable message. Any other error, or a panic, is
/// recorded as an unexpected fault.
///
/// ```rust,ignore
/// struct Resize { path: String }
///
/// #[async_trait]
/// impl Process for Resize {
///     async fn run_process(&mut self, _record: &TaskRecord) -> anyhow::Result<()> {
///         if !std::path::Path::new(&self.path).exists() {
///             return Err(TaskError::new("image missing").into());
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Process: Send {
    /// Prepare the environment. Defaults to doing nothing.
    async fn setup(&mut self, _record: &TaskRecord) -> anyhow::Result<()> {
        Ok(())
    }

    /// Do the work.
    async fn run_process(&mut self, record: &TaskRecord) -> anyhow::Result<()>;

    /// Release the environment. Errors here are only logged.
    async fn teardown(&mut self, _record: &TaskRecord) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Builds a process instance for one record.
pub type ProcessFactory = Arc<dyn Fn(&TaskRecord) -> Box<dyn Process> + Send + Sync>;

/// Registry of process factories (task kind -> factory).
///
/// Filled at startup, then shared read-only with the executor.
#[derive(Default, Clone)]
pub struct ProcessRegistry {
    factories: HashMap<TaskKind, ProcessFactory>,
}

impl ProcessRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for `kind`.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::DuplicateProcess`] if `kind` is already registered.
    pub fn register<F>(&mut self, kind: impl Into<TaskKind>, factory: F) -> Result<(), SchedulerError>
    where
        F: Fn(&TaskRecord) -> Box<dyn Process> + Send + Sync + 'static,
    {
        let kind = kind.into();
        if self.factories.contains_key(&kind) {
            return Err(SchedulerError::DuplicateProcess(kind));
        }
        self.factories.insert(kind, Arc::new(factory));
        Ok(())
    }

    /// Build the process for `record`, if its kind is registered.
    #[must_use]
    pub fn instantiate(&self, record: &TaskRecord) -> Option<Box<dyn Process>> {
        self.factories.get(&record.kind).map(|factory| factory(record))
    }

    /// Whether `kind` has a factory.
    #[must_use]
    pub fn contains(&self, kind: &TaskKind) -> bool {
        self.factories.contains_key(kind)
    }

    /// Registered kinds, sorted.
    #[must_use]
    pub fn kinds(&self) -> Vec<TaskKind> {
        let mut kinds: Vec<_> = self.factories.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    /// Number of registered kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl std::fmt::Debug for ProcessRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
