//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use process_scheduler::core::{
    ClaimOutcome, Process, ProcessRegistry, SchedulerError, Spawn, TaskError, TaskId, TaskKind,
    TaskRecord, TaskStatus, TaskStore,
};
use process_scheduler::infra::InMemoryTaskStore;

/// Holds dispatched executions until the test decides to run them.
#[derive(Clone, Default)]
pub struct ParkedSpawner {
    parked: Arc<Mutex<Vec<BoxFuture<'static, ()>>>>,
}

impl ParkedSpawner {
    pub fn parked(&self) -> usize {
        self.parked.lock().len()
    }

    /// Run every parked execution to completion.
    pub async fn drain(&self) {
        let futs: Vec<_> = std::mem::take(&mut *self.parked.lock());
        futures::future::join_all(futs).await;
    }
}

impl Spawn for ParkedSpawner {
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.parked.lock().push(fut.boxed());
    }
}

/// What a scripted hook does.
#[derive(Clone, Copy, Debug, Default)]
pub enum Step {
    #[default]
    Ok,
    Recognized(&'static str),
    RecognizedWithDebug(&'static str, &'static str),
    Unrecognized(&'static str),
    Panic(&'static str),
}

impl Step {
    fn perform(self) -> anyhow::Result<()> {
        match self {
            Self::Ok => Ok(()),
            Self::Recognized(msg) => Err(TaskError::new(msg).into()),
            Self::RecognizedWithDebug(msg, debug) => Err(TaskError::new(msg).with_debug(debug).into()),
            Self::Unrecognized(msg) => Err(anyhow::anyhow!(msg)),
            Self::Panic(msg) => panic!("{msg}"),
        }
    }
}

#[derive(Default)]
pub struct Calls {
    pub setup: AtomicUsize,
    pub work: AtomicUsize,
    pub teardown: AtomicUsize,
}

impl Calls {
    pub fn counts(&self) -> (usize, usize, usize) {
        (
            self.setup.load(Ordering::SeqCst),
            self.work.load(Ordering::SeqCst),
            self.teardown.load(Ordering::SeqCst),
        )
    }
}

/// Process whose hooks follow a fixed script.
pub struct Scripted {
    pub setup: Step,
    pub work: Step,
    pub teardown: Step,
    pub calls: Arc<Calls>,
}

#[async_trait]
impl Process for Scripted {
    async fn setup(&mut self, _record: &TaskRecord) -> anyhow::Result<()> {
        self.calls.setup.fetch_add(1, Ordering::SeqCst);
        self.setup.perform()
    }

    async fn run_process(&mut self, _record: &TaskRecord) -> anyhow::Result<()> {
        self.calls.work.fetch_add(1, Ordering::SeqCst);
        self.work.perform()
    }

    async fn teardown(&mut self, _record: &TaskRecord) -> anyhow::Result<()> {
        self.calls.teardown.fetch_add(1, Ordering::SeqCst);
        self.teardown.perform()
    }
}

/// Registry with one scripted kind; returns the shared call counters.
pub fn scripted_registry(kind: &str, setup: Step, work: Step, teardown: Step) -> (ProcessRegistry, Arc<Calls>) {
    let calls = Arc::new(Calls::default());
    let shared = Arc::clone(&calls);
    let mut registry = ProcessRegistry::new();
    registry
        .register(kind, move |_| {
            Box::new(Scripted {
                setup,
                work,
                teardown,
                calls: Arc::clone(&shared),
            })
        })
        .unwrap();
    (registry, calls)
}

/// Registry whose `noop` kind always succeeds.
pub fn noop_registry() -> ProcessRegistry {
    scripted_registry("noop", Step::Ok, Step::Ok, Step::Ok).0
}

/// In-memory store that counts writes and can be told to fail.
#[derive(Default)]
pub struct CountingStore {
    pub inner: InMemoryTaskStore,
    pub persists: AtomicUsize,
    pub fail_persist: AtomicBool,
    pub fail_count: AtomicBool,
    /// When set, returned instead of the live pending list.
    pub stale_pending: Mutex<Option<Vec<TaskRecord>>>,
}

impl CountingStore {
    pub fn persist_calls(&self) -> usize {
        self.persists.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskStore for CountingStore {
    async fn insert(&self, kind: TaskKind, payload: serde_json::Value) -> Result<TaskRecord, SchedulerError> {
        self.inner.insert(kind, payload).await
    }

    async fn get(&self, id: TaskId) -> Result<Option<TaskRecord>, SchedulerError> {
        self.inner.get(id).await
    }

    async fn list_by_status(&self, status: TaskStatus) -> Result<Vec<TaskRecord>, SchedulerError> {
        if status == TaskStatus::Pending {
            if let Some(stale) = self.stale_pending.lock().clone() {
                return Ok(stale);
            }
        }
        self.inner.list_by_status(status).await
    }

    async fn count_running(&self) -> Result<usize, SchedulerError> {
        if self.fail_count.load(Ordering::SeqCst) {
            return Err(SchedulerError::Backend("store unreachable".into()));
        }
        self.inner.count_running().await
    }

    async fn claim(&self, id: TaskId) -> Result<ClaimOutcome, SchedulerError> {
        self.inner.claim(id).await
    }

    async fn persist(&self, record: &TaskRecord) -> Result<TaskRecord, SchedulerError> {
        self.persists.fetch_add(1, Ordering::SeqCst);
        if self.fail_persist.load(Ordering::SeqCst) {
            return Err(SchedulerError::Backend("write refused".into()));
        }
        self.inner.persist(record).await
    }

    async fn reset(&self, id: TaskId) -> Result<TaskRecord, SchedulerError> {
        self.inner.reset(id).await
    }

    async fn requeue(&self, id: TaskId) -> Result<TaskRecord, SchedulerError> {
        self.inner.requeue(id).await
    }
}

/// Insert `n` pending records of `kind`, returning their ids in order.
pub async fn seed(store: &dyn TaskStore, kind: &str, n: usize) -> Vec<TaskId> {
    let mut ids = Vec::with_capacity(n);
    for i in 0..n {
        let record = store
            .insert(TaskKind::new(kind), serde_json::json!({ "seq": i }))
            .await
            .unwrap();
        ids.push(record.id);
    }
    ids
}

/// Ids of records currently in `status`.
pub async fn ids_with(store: &dyn TaskStore, status: TaskStatus) -> Vec<TaskId> {
    store
        .list_by_status(status)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect()
}
