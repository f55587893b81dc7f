//! Admission loop behaviour: capacity, ordering, claim races and shutdown.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::{ids_with, noop_registry, seed, CountingStore, ParkedSpawner};
use process_scheduler::builders::SchedulerBuilder;
use process_scheduler::config::SchedulerConfig;
use process_scheduler::core::{
    InMemoryCompletionSink, Scheduler, TaskRunner, TaskStatus, TaskStore,
};
use process_scheduler::infra::InMemoryTaskStore;
use process_scheduler::runtime::{requeue_running, status_counts, TokioSpawner};

fn config(max: usize) -> SchedulerConfig {
    SchedulerConfig {
        max_concurrent_tasks: max,
        poll_interval_secs: 1,
        ..SchedulerConfig::default()
    }
}

fn parked(store: Arc<dyn TaskStore>, max: usize) -> (Scheduler<ParkedSpawner>, ParkedSpawner) {
    let spawner = ParkedSpawner::default();
    let scheduler = SchedulerBuilder::new(config(max))
        .store(store)
        .registry(noop_registry())
        .build(spawner.clone())
        .unwrap();
    (scheduler, spawner)
}

#[tokio::test]
async fn dispatches_the_oldest_records_up_to_capacity() {
    let store = Arc::new(InMemoryTaskStore::new());
    let ids = seed(store.as_ref(), "noop", 5).await;
    let (scheduler, spawner) = parked(store.clone(), 2);

    let report = scheduler.run_cycle().await.unwrap();

    assert_eq!(report.running, 0);
    assert_eq!(report.capacity, 2);
    assert_eq!(report.candidates, 5);
    assert_eq!(report.dispatched, 2);
    assert_eq!(spawner.parked(), 2);
    assert_eq!(ids_with(store.as_ref(), TaskStatus::Running).await, ids[..2]);
    assert_eq!(ids_with(store.as_ref(), TaskStatus::Pending).await, ids[2..]);
}

#[tokio::test]
async fn full_capacity_dispatches_nothing() {
    let store = Arc::new(InMemoryTaskStore::new());
    let ids = seed(store.as_ref(), "noop", 6).await;
    for id in &ids[..3] {
        store.claim(*id).await.unwrap();
    }
    let (scheduler, spawner) = parked(store.clone(), 3);

    let report = scheduler.run_cycle().await.unwrap();

    assert_eq!(report.running, 3);
    assert_eq!(report.capacity, 0);
    assert_eq!(report.dispatched, 0);
    assert_eq!(spawner.parked(), 0);
    assert_eq!(ids_with(store.as_ref(), TaskStatus::Pending).await.len(), 3);
}

#[tokio::test]
async fn repeated_polls_while_saturated_are_idempotent() {
    let store = Arc::new(InMemoryTaskStore::new());
    seed(store.as_ref(), "noop", 2).await;
    let (scheduler, spawner) = parked(store.clone(), 2);

    assert_eq!(scheduler.run_cycle().await.unwrap().dispatched, 2);
    for _ in 0..3 {
        let report = scheduler.run_cycle().await.unwrap();
        assert_eq!(report.dispatched, 0);
        assert_eq!(report.candidates, 0);
    }
    assert_eq!(spawner.parked(), 2);
}

#[tokio::test]
async fn running_count_never_exceeds_the_limit() {
    let store = Arc::new(InMemoryTaskStore::new());
    seed(store.as_ref(), "noop", 7).await;
    let (scheduler, spawner) = parked(store.clone(), 3);

    let mut dispatched = 0;
    for _ in 0..4 {
        dispatched += scheduler.run_cycle().await.unwrap().dispatched;
        assert!(store.count_running().await.unwrap() <= 3);
        spawner.drain().await;
    }

    assert_eq!(dispatched, 7);
    let counts = status_counts(store.as_ref()).await.unwrap();
    assert_eq!(counts.completed, 7);
    assert_eq!(counts.running, 0);
}

#[tokio::test]
async fn capacity_frees_up_after_completion() {
    let store = Arc::new(InMemoryTaskStore::new());
    let ids = seed(store.as_ref(), "noop", 5).await;
    let (scheduler, spawner) = parked(store.clone(), 2);

    scheduler.run_cycle().await.unwrap();
    spawner.drain().await;
    let report = scheduler.run_cycle().await.unwrap();

    assert_eq!(report.running, 0);
    assert_eq!(report.dispatched, 2);
    assert_eq!(ids_with(store.as_ref(), TaskStatus::Completed).await, ids[..2]);
    assert_eq!(ids_with(store.as_ref(), TaskStatus::Running).await, ids[2..4]);
}

#[tokio::test]
async fn lost_claims_are_skipped_without_substitution() {
    let store = Arc::new(CountingStore::default());
    let ids = seed(store.as_ref(), "noop", 4).await;
    let snapshot = store.inner.list_pending().await.unwrap();
    *store.stale_pending.lock() = Some(snapshot);
    // Another instance got to the oldest record after our listing.
    store.inner.claim(ids[0]).await.unwrap();

    let (scheduler, spawner) = parked(store.clone(), 3);
    let report = scheduler.run_cycle().await.unwrap();

    assert_eq!(report.running, 1);
    assert_eq!(report.capacity, 2);
    assert_eq!(report.lost_claims, 1);
    assert_eq!(report.dispatched, 1);
    assert_eq!(spawner.parked(), 1);
    assert_eq!(ids_with(&store.inner, TaskStatus::Running).await, ids[..2]);
    assert_eq!(ids_with(&store.inner, TaskStatus::Pending).await, ids[2..]);
}

#[tokio::test]
async fn competing_runners_claim_each_record_once() {
    let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
    let ids = seed(store.as_ref(), "noop", 1).await;
    let record = store.get(ids[0]).await.unwrap().unwrap();
    let registry = Arc::new(noop_registry());

    let runners: Vec<_> = (0..8)
        .map(|_| TaskRunner::new(Arc::clone(&store), Arc::clone(&registry)))
        .collect();
    let attempts = runners.iter().map(|runner| runner.try_claim(&record));
    let results = futures::future::join_all(attempts).await;

    let winners = results
        .into_iter()
        .map(Result::unwrap)
        .filter(Option::is_some)
        .count();
    assert_eq!(winners, 1);
    assert_eq!(store.count_running().await.unwrap(), 1);
}

#[tokio::test]
async fn two_schedulers_never_double_start() {
    let store = Arc::new(InMemoryTaskStore::new());
    seed(store.as_ref(), "noop", 3).await;
    let (a, spawner_a) = parked(store.clone(), 2);
    let (b, spawner_b) = parked(store.clone(), 2);

    let (ra, rb) = tokio::join!(a.run_cycle(), b.run_cycle());
    let (ra, rb) = (ra.unwrap(), rb.unwrap());

    assert_eq!(ra.dispatched + rb.dispatched, spawner_a.parked() + spawner_b.parked());
    assert_eq!(store.count_running().await.unwrap(), ra.dispatched + rb.dispatched);
    assert!(ra.dispatched + rb.dispatched <= 3);
}

#[tokio::test]
async fn store_failure_aborts_only_the_cycle() {
    let store = Arc::new(CountingStore::default());
    seed(store.as_ref(), "noop", 1).await;
    let (scheduler, _spawner) = parked(store.clone(), 2);

    store.fail_count.store(true, Ordering::SeqCst);
    assert!(scheduler.run_cycle().await.is_err());

    store.fail_count.store(false, Ordering::SeqCst);
    assert_eq!(scheduler.run_cycle().await.unwrap().dispatched, 1);
}

#[tokio::test(start_paused = true)]
async fn run_until_drains_the_queue_and_stops_on_shutdown() {
    let store = Arc::new(InMemoryTaskStore::new());
    seed(store.as_ref(), "noop", 3).await;
    let sink = Arc::new(InMemoryCompletionSink::new(16));
    let scheduler = SchedulerBuilder::new(config(1))
        .store(store.clone())
        .registry(noop_registry())
        .sink(sink.clone())
        .build(TokioSpawner::current())
        .unwrap();

    scheduler
        .run_until(tokio::time::sleep(Duration::from_millis(2_500)))
        .await;
    tokio::task::yield_now().await;

    let counts = status_counts(store.as_ref()).await.unwrap();
    assert_eq!(counts.completed, 3);
    assert_eq!(counts.pending, 0);
    assert_eq!(sink.events().len(), 3);
}

#[tokio::test]
async fn rejects_zero_capacity() {
    let store = Arc::new(InMemoryTaskStore::new());
    let result = SchedulerBuilder::new(config(0))
        .store(store)
        .build(ParkedSpawner::default());
    assert!(result.is_err());
}

#[tokio::test]
async fn requeued_orphans_free_their_slots() {
    let store = Arc::new(InMemoryTaskStore::new());
    let ids = seed(store.as_ref(), "noop", 2).await;
    // Claimed by a server that stopped before finishing.
    store.claim(ids[0]).await.unwrap();
    let (scheduler, _spawner) = parked(store.clone(), 1);

    for _ in 0..5 {
        assert_eq!(scheduler.run_cycle().await.unwrap().dispatched, 0);
    }

    let requeued = requeue_running(store.as_ref()).await.unwrap();
    assert_eq!(requeued.len(), 1);
    let report = scheduler.run_cycle().await.unwrap();
    assert_eq!(report.dispatched, 1);
    assert_eq!(ids_with(store.as_ref(), TaskStatus::Running).await, vec![ids[0]]);
}

#[tokio::test]
async fn failed_signal_listener_stops_before_any_claim() {
    let store = Arc::new(InMemoryTaskStore::new());
    seed(store.as_ref(), "noop", 1).await;
    let (scheduler, spawner) = parked(store.clone(), 2);

    let result = scheduler
        .run_until_signal(async { Err::<(), _>(std::io::Error::other("no signal handler")) })
        .await;

    assert!(result.is_err());
    assert_eq!(spawner.parked(), 0);
    assert_eq!(store.count_running().await.unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn signal_stops_the_loop_cleanly() {
    let store = Arc::new(InMemoryTaskStore::new());
    seed(store.as_ref(), "noop", 1).await;
    let (scheduler, spawner) = parked(store.clone(), 2);

    let result = scheduler
        .run_until_signal(async {
            tokio::time::sleep(Duration::from_millis(1_500)).await;
            Ok::<(), std::io::Error>(())
        })
        .await;

    assert!(result.is_ok());
    assert_eq!(spawner.parked(), 1);
}
