//! Integration tests for the offline action queue
//!
//! Covers persistence across process restarts, failure bookkeeping,
//! single-flight draining and reconnect-driven sync.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tempfile::TempDir;

use super::common::determinism::{DeterministicIds, TEST_EPOCH_MS};
use super::common::fakes::RecordingExecutor;
use stackdeck::eventlog::ACTION_QUEUE_LOG;
use stackdeck::queue::ACTION_KIND;
use stackdeck::{
    ActionQueue, ActionStatus, ConnectivityMonitor, Database, EventLogStore, NewEvent,
    PersistentEventLogStore, RetryPolicy, SqliteKvStore, SyncService,
};

/// Open the on-disk event log store the way a fresh process would
fn open_store(dir: &TempDir) -> (Database, Arc<dyn EventLogStore>) {
    let db = Database::open(dir.path().join("stackdeck.db")).expect("Failed to open database");
    let store: Arc<dyn EventLogStore> =
        Arc::new(PersistentEventLogStore::new(SqliteKvStore::from_database(&db)));
    (db, store)
}

fn queue_with(
    store: Arc<dyn EventLogStore>,
    executor: Arc<RecordingExecutor>,
    monitor: &ConnectivityMonitor,
) -> ActionQueue {
    ActionQueue::new(store, executor, monitor.handle())
}

/// Queue offline, restart, come online, drain: the queue empties.
#[tokio::test]
async fn test_action_survives_reload_and_drains_when_online() {
    let dir = TempDir::new().expect("Failed to create temp dir");

    {
        let (_db, store) = open_store(&dir);
        let monitor = ConnectivityMonitor::new(false);
        let executor = Arc::new(RecordingExecutor::new());
        let queue = queue_with(store, executor.clone(), &monitor);

        let action = queue.enqueue(json!({"op": "restart", "service": "api"})).await;
        assert_eq!(action.status, ActionStatus::Pending);
        assert_eq!(queue.size(), 1);
        assert_eq!(executor.call_count(), 0);
    }

    let (_db, store) = open_store(&dir);
    let monitor = ConnectivityMonitor::new(false);
    let executor = Arc::new(RecordingExecutor::new());
    let queue = queue_with(store, executor.clone(), &monitor);
    assert_eq!(queue.size(), 1, "pending action must survive a reload");

    monitor.set_online(true);
    let report = queue.drain().await;

    assert_eq!(report.sent(), 1);
    assert_eq!(queue.size(), 0);
    assert_eq!(
        executor.calls(),
        vec![json!({"op": "restart", "service": "api"})]
    );
}

/// A failed delivery keeps the action, marked failed with one attempt.
#[tokio::test]
async fn test_failed_delivery_keeps_action() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let (_db, store) = open_store(&dir);
    let monitor = ConnectivityMonitor::new(false);
    let executor = Arc::new(RecordingExecutor::failing());
    let queue = queue_with(store.clone(), executor.clone(), &monitor);

    queue.enqueue(json!({"op": "scale", "replicas": 3})).await;
    let report = queue.drain().await;

    assert_eq!(report.failed(), 1);
    let failed = queue.failed();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].status, ActionStatus::Failed);
    assert_eq!(failed[0].attempts, 1);
    assert!(failed[0].last_error.as_deref().unwrap().contains("503"));
    assert_eq!(store.read(ACTION_QUEUE_LOG).len(), 1);

    // The failure bookkeeping is durable too
    drop(queue);
    let (_db2, reopened) = open_store(&dir);
    let queue = queue_with(reopened, Arc::new(RecordingExecutor::new()), &monitor);
    assert_eq!(queue.failed()[0].attempts, 1);
    assert_eq!(queue.drain().await.sent(), 1);
    assert_eq!(queue.size(), 0);
}

/// Two drains in the same tick deliver the single pending action once.
#[tokio::test]
async fn test_concurrent_drains_call_executor_once() {
    let store: Arc<dyn EventLogStore> = Arc::new(stackdeck::MemoryEventLogStore::in_memory());
    let monitor = ConnectivityMonitor::new(false);
    let executor = Arc::new(RecordingExecutor::new());
    let queue = queue_with(store, executor.clone(), &monitor);
    queue.enqueue(json!({"op": "deploy"})).await;

    let (first, second) = tokio::join!(queue.drain(), queue.drain());

    assert_eq!(executor.call_count(), 1);
    assert!(first.skipped ^ second.skipped);
    assert_eq!(queue.size(), 0);
    assert!(!queue.is_draining());
}

/// Delivery happens in enqueue order and later failures keep their place.
#[tokio::test]
async fn test_drain_preserves_enqueue_order() {
    let store: Arc<dyn EventLogStore> = Arc::new(stackdeck::MemoryEventLogStore::in_memory());
    let monitor = ConnectivityMonitor::new(false);
    let executor = Arc::new(RecordingExecutor::new());
    let queue = queue_with(store, executor.clone(), &monitor);

    for n in 0..5 {
        queue.enqueue(json!({"seq": n})).await;
    }
    queue.drain().await;

    let order: Vec<i64> = executor
        .calls()
        .iter()
        .filter_map(|payload| payload["seq"].as_i64())
        .collect();
    assert_eq!(order, vec![0, 1, 2, 3, 4]);
}

/// Coming back online is enough for the sync service to flush the queue.
#[tokio::test]
async fn test_sync_service_drains_on_reconnect() {
    let store: Arc<dyn EventLogStore> = Arc::new(stackdeck::MemoryEventLogStore::in_memory());
    let monitor = ConnectivityMonitor::new(false);
    let executor = Arc::new(RecordingExecutor::new());
    let queue = Arc::new(queue_with(store, executor.clone(), &monitor));

    queue.enqueue(json!({"op": "restart"})).await;
    queue.enqueue(json!({"op": "rotate-logs"})).await;
    let mut size_rx = queue.subscribe();

    let sync = SyncService::start(queue.clone(), &monitor, RetryPolicy::default());
    monitor.set_online(true);

    tokio::time::timeout(Duration::from_secs(5), size_rx.wait_for(|size| *size == 0))
        .await
        .expect("queue should drain after reconnect")
        .expect("size channel closed");

    assert_eq!(executor.call_count(), 2);
    sync.shutdown().await;
}

/// Clearing the queue log twice is the same as clearing it once.
#[tokio::test]
async fn test_clear_is_idempotent() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let (_db, store) = open_store(&dir);
    let monitor = ConnectivityMonitor::new(false);
    let queue = queue_with(store.clone(), Arc::new(RecordingExecutor::new()), &monitor);
    queue.enqueue(json!({"op": "noop"})).await;

    store.clear(ACTION_QUEUE_LOG);
    store.clear(ACTION_QUEUE_LOG);

    assert!(store.read(ACTION_QUEUE_LOG).is_empty());
    assert!(!store.keys().contains(&ACTION_QUEUE_LOG.to_string()));
    assert_eq!(queue.size(), 0);
}

/// Re-appending a known event id after a restart leaves the log unchanged.
#[tokio::test]
async fn test_duplicate_ids_are_ignored_across_reload() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let ids = DeterministicIds::new();
    let first = ids.next();
    let second = ids.next();

    {
        let (_db, store) = open_store(&dir);
        store.append(
            "audit",
            NewEvent::new("login", json!({"user": "ops"}))
                .with_id(first.clone())
                .at(TEST_EPOCH_MS),
        );
        store.append(
            "audit",
            NewEvent::new("logout", json!({"user": "ops"}))
                .with_id(second.clone())
                .at(TEST_EPOCH_MS + 10),
        );
    }

    let (_db, store) = open_store(&dir);
    let existing = store.append(
        "audit",
        NewEvent::new("login", json!({"user": "someone-else"}))
            .with_id(first.clone())
            .at(TEST_EPOCH_MS + 99),
    );

    assert_eq!(existing.payload, json!({"user": "ops"}));
    let log = store.read("audit");
    let order: Vec<&str> = log.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(order, vec![first.as_str(), second.as_str()]);
}

/// Flapping connectivity mid-drain never delivers an action twice.
#[tokio::test(start_paused = true)]
async fn test_flapping_during_slow_drain_delivers_each_action_once() {
    const ACTIONS: usize = 5;
    let store: Arc<dyn EventLogStore> = Arc::new(stackdeck::MemoryEventLogStore::in_memory());
    let monitor = ConnectivityMonitor::new(false);
    let executor = Arc::new(RecordingExecutor::with_latency(Duration::from_millis(50)));
    let queue = Arc::new(queue_with(store, executor.clone(), &monitor));

    for n in 0..ACTIONS {
        queue.enqueue(json!({"seq": n})).await;
    }
    let mut size_rx = queue.subscribe();
    let sync = SyncService::start(queue.clone(), &monitor, RetryPolicy::default());

    monitor.set_online(true);
    for _ in 0..3 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        monitor.set_online(false);
        monitor.set_online(true);
    }

    tokio::time::timeout(Duration::from_secs(30), size_rx.wait_for(|size| *size == 0))
        .await
        .expect("queue should drain despite flapping")
        .expect("size channel closed");

    assert_eq!(executor.call_count(), ACTIONS);
    sync.shutdown().await;
}

/// A failed delivery is retried by the sync service once the backoff elapses.
#[tokio::test(start_paused = true)]
async fn test_sync_service_retries_after_backoff() {
    let store: Arc<dyn EventLogStore> = Arc::new(stackdeck::MemoryEventLogStore::in_memory());
    let monitor = ConnectivityMonitor::new(false);
    let executor = Arc::new(RecordingExecutor::failing());
    let queue = Arc::new(queue_with(store, executor.clone(), &monitor));
    queue.enqueue(json!({"op": "restart"})).await;

    let retry = RetryPolicy::new(Duration::from_secs(1), Duration::from_secs(10));
    monitor.set_online(true);
    let sync = SyncService::start(queue.clone(), &monitor, retry);

    // Startup drain fails once
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(executor.call_count(), 1);
    assert_eq!(queue.failed().len(), 1);
    executor.set_failing(false);

    tokio::time::sleep(Duration::from_millis(900)).await;
    assert_eq!(executor.call_count(), 1, "retry fired before the backoff");

    tokio::time::sleep(retry.delay_for(1)).await;
    assert_eq!(executor.call_count(), 2);
    assert_eq!(queue.size(), 0);
    sync.shutdown().await;
}

/// Actions that appear in the log behind a running drain are picked up later.
#[tokio::test(start_paused = true)]
async fn test_sync_service_picks_up_actions_missed_by_a_drain() {
    let store: Arc<dyn EventLogStore> = Arc::new(stackdeck::MemoryEventLogStore::in_memory());
    let monitor = ConnectivityMonitor::new(false);
    let executor = Arc::new(RecordingExecutor::with_latency(Duration::from_millis(200)));
    let queue = Arc::new(queue_with(store.clone(), executor.clone(), &monitor));
    queue.enqueue(json!({"op": "first"})).await;
    let mut size_rx = queue.subscribe();

    let sync = SyncService::start(
        queue.clone(),
        &monitor,
        RetryPolicy::new(Duration::from_secs(1), Duration::from_secs(10)),
    );
    monitor.set_online(true);

    // Written straight to the log, so the running drain is never told about it
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(queue.is_draining());
    store.append(
        ACTION_QUEUE_LOG,
        NewEvent::new(
            ACTION_KIND,
            json!({"action": {"op": "second"}, "status": "pending", "attempts": 0}),
        ),
    );

    tokio::time::timeout(Duration::from_secs(30), size_rx.wait_for(|size| *size == 0))
        .await
        .expect("sync service should schedule another pass")
        .expect("size channel closed");

    assert_eq!(
        executor.calls(),
        vec![json!({"op": "first"}), json!({"op": "second"})]
    );
    sync.shutdown().await;
}
