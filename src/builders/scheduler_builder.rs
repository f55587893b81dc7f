//! Wire a [`Scheduler`] from configuration, a store, and process kinds.

use std::sync::Arc;

use crate::config::SchedulerConfig;
use crate::core::{
    CompletionNotifier, CompletionSink, Process, ProcessRegistry, Scheduler, SchedulerError,
    Spawn, TaskKind, TaskRecord, TaskRunner, TaskStore,
};

/// Builder collecting everything a scheduler needs.
///
/// ```rust,ignore
/// let scheduler = SchedulerBuilder::new(config)
///     .store(Arc::new(InMemoryTaskStore::new()))
///     .process("resize", |_| Box::new(Resize::default()))?
///     .sink(Arc::new(InMemoryCompletionSink::new(100)))
///     .expect_kinds(&["resize"])
///     .build(TokioSpawner::new(Handle::current()))?;
/// ```
pub struct SchedulerBuilder {
    config: SchedulerConfig,
    store: Option<Arc<dyn TaskStore>>,
    registry: ProcessRegistry,
    notifier: CompletionNotifier,
    expected: Vec<TaskKind>,
}

impl SchedulerBuilder {
    /// Start from `config`.
    #[must_use]
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            store: None,
            registry: ProcessRegistry::new(),
            notifier: CompletionNotifier::new(),
            expected: Vec::new(),
        }
    }

    /// Configuration the scheduler will use.
    #[must_use]
    pub const fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Store to poll and write to.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn TaskStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Register a process factory for `kind`.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::DuplicateProcess`] if `kind` is already registered.
    pub fn process<F>(mut self, kind: impl Into<TaskKind>, factory: F) -> Result<Self, SchedulerError>
    where
        F: Fn(&TaskRecord) -> Box<dyn Process> + Send + Sync + 'static,
    {
        self.registry.register(kind, factory)?;
        Ok(self)
    }

    /// Use a prepared registry, replacing any kinds added so far.
    #[must_use]
    pub fn registry(mut self, registry: ProcessRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Add a completion listener.
    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn CompletionSink>) -> Self {
        self.notifier.subscribe(sink);
        self
    }

    /// Kinds that must be registered for `build` to succeed.
    #[must_use]
    pub fn expect_kinds(mut self, kinds: &[&str]) -> Self {
        self.expected = kinds.iter().map(|k| TaskKind::new(*k)).collect();
        self
    }

    /// Validate and assemble the scheduler.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::InvalidConfig`] when the configuration is invalid,
    /// no store was given, or an expected kind is missing.
    pub fn build<S: Spawn>(self, spawner: S) -> Result<Scheduler<S>, SchedulerError> {
        self.config.validate().map_err(SchedulerError::InvalidConfig)?;
        let store = self
            .store
            .ok_or_else(|| SchedulerError::InvalidConfig("no task store configured".into()))?;
        let missing: Vec<_> = self
            .expected
            .iter()
            .filter(|kind| !self.registry.contains(kind))
            .map(ToString::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(SchedulerError::InvalidConfig(format!(
                "missing process kinds: {missing:?}"
            )));
        }
        if self.registry.is_empty() {
            tracing::warn!("no process kinds registered; every task will fail");
        }
        let runner = TaskRunner::new(store, Arc::new(self.registry)).with_notifier(self.notifier);
        Scheduler::new(self.config, runner, spawner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::InMemoryTaskStore;
    use async_trait::async_trait;

    struct Noop;

    #[async_trait]
    impl Process for Noop {
        async fn run_process(&mut self, _record: &TaskRecord) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[derive(Clone)]
    struct NoSpawn;

    impl Spawn for NoSpawn {
        fn spawn<F>(&self, _fut: F)
        where
            F: std::future::Future<Output = ()> + Send + 'static,
        {
        }
    }

    #[test]
    fn build_requires_store() {
        let err = SchedulerBuilder::new(SchedulerConfig::default())
            .build(NoSpawn)
            .err()
            .unwrap();
        assert!(err.to_string().contains("no task store"));
    }

    #[test]
    fn build_reports_missing_kinds() {
        let err = SchedulerBuilder::new(SchedulerConfig::default())
            .store(Arc::new(InMemoryTaskStore::new()))
            .process("noop", |_| Box::new(Noop))
            .unwrap()
            .expect_kinds(&["noop", "resize"])
            .build(NoSpawn)
            .err()
            .unwrap();
        assert!(err.to_string().contains("resize"));
        assert!(!err.to_string().contains("\"noop\""));
    }

    #[test]
    fn build_rejects_invalid_config() {
        let config = SchedulerConfig {
            max_concurrent_tasks: 0,
            ..SchedulerConfig::default()
        };
        let result = SchedulerBuilder::new(config)
            .store(Arc::new(InMemoryTaskStore::new()))
            .build(NoSpawn);
        assert!(matches!(result, Err(SchedulerError::InvalidConfig(_))));
    }

    #[test]
    fn build_succeeds_with_everything() {
        let scheduler = SchedulerBuilder::new(SchedulerConfig::default())
            .store(Arc::new(InMemoryTaskStore::new()))
            .process("noop", |_| Box::new(Noop))
            .unwrap()
            .expect_kinds(&["noop"])
            .build(NoSpawn)
            .unwrap();
        assert_eq!(scheduler.config().max_concurrent_tasks, 2);
    }
}
