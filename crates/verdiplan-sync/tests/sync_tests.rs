//! Integration tests for the sync manager, connectivity monitor, status
//! aggregator and snapshot service
//!
//! The store is a real in-memory SQLite store; the remote API is a
//! recording mock.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use tokio::sync::{broadcast, Notify};

use verdiplan_cache::{DatabasePool, SqliteOfflineStore};
use verdiplan_core::domain::{
    IdempotencyKey, MediaContent, MediaMetadata, PendingMedia, QueueAction, TaskId,
};
use verdiplan_core::ports::{IOfflineStore, IRemoteApi};
use verdiplan_sync::{
    ConnectivityMonitor, ConnectivityState, SnapshotService, StatusAggregator, SyncEvent,
    SyncOutcome, SyncQueueManager, SyncReport, TaskSource,
};

// ============================================================================
// Mock remote API
// ============================================================================

#[derive(Default)]
struct MockApi {
    uploads: Mutex<Vec<String>>,
    creates: Mutex<Vec<(Value, IdempotencyKey)>>,
    updates: Mutex<Vec<(TaskId, IdempotencyKey)>>,
    failing_files: Mutex<HashSet<String>>,
    fail_actions: Mutex<bool>,
    tasks: Mutex<Option<Vec<Value>>>,
    /// When set, uploads signal `entered` and wait on `release`
    gate: Option<(Arc<Notify>, Arc<Notify>)>,
}

impl MockApi {
    fn failing_file(self, name: &str) -> Self {
        self.failing_files.lock().unwrap().insert(name.to_string());
        self
    }

    fn with_tasks(self, tasks: Vec<Value>) -> Self {
        *self.tasks.lock().unwrap() = Some(tasks);
        self
    }

    fn set_fail_actions(&self, fail: bool) {
        *self.fail_actions.lock().unwrap() = fail;
    }

    fn uploads(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl IRemoteApi for MockApi {
    async fn create_task(&self, payload: &Value, key: &IdempotencyKey) -> anyhow::Result<Value> {
        if *self.fail_actions.lock().unwrap() {
            anyhow::bail!("server error (500)");
        }
        self.creates.lock().unwrap().push((payload.clone(), *key));
        Ok(payload.clone())
    }

    async fn update_task(
        &self,
        id: &TaskId,
        payload: &Value,
        key: &IdempotencyKey,
    ) -> anyhow::Result<Value> {
        if *self.fail_actions.lock().unwrap() {
            anyhow::bail!("server error (500)");
        }
        self.updates.lock().unwrap().push((id.clone(), *key));
        Ok(payload.clone())
    }

    async fn upload_media(&self, media: &PendingMedia) -> anyhow::Result<()> {
        if let Some((entered, release)) = &self.gate {
            entered.notify_one();
            release.notified().await;
        }
        if self.failing_files.lock().unwrap().contains(&media.filename) {
            anyhow::bail!("connection reset");
        }
        self.uploads.lock().unwrap().push(media.filename.clone());
        Ok(())
    }

    async fn list_tasks(&self) -> anyhow::Result<Vec<Value>> {
        match self.tasks.lock().unwrap().clone() {
            Some(tasks) => Ok(tasks),
            None => anyhow::bail!("network unreachable"),
        }
    }

    async fn ping(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

// ============================================================================
// Test helpers
// ============================================================================

async fn memory_store() -> Arc<SqliteOfflineStore> {
    let pool = DatabasePool::in_memory()
        .await
        .expect("Failed to create in-memory database");
    Arc::new(SqliteOfflineStore::new(pool.pool().clone()))
}

fn manager(
    store: Arc<SqliteOfflineStore>,
    api: Arc<MockApi>,
    online: bool,
    max_attempts: u32,
) -> Arc<SyncQueueManager> {
    Arc::new(SyncQueueManager::new(
        store,
        api,
        ConnectivityState::new(online),
        max_attempts,
    ))
}

async fn add_photo(store: &SqliteOfflineStore, task: &str, name: &str) {
    let content = MediaContent::from_filename(name, vec![0xFF, 0xD8, 0xFF]).unwrap();
    store
        .add_media(&TaskId::new(task).unwrap(), content, MediaMetadata::new())
        .await
        .unwrap();
}

fn drain(rx: &mut broadcast::Receiver<SyncEvent>) -> Vec<SyncEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn completed(outcome: SyncOutcome) -> SyncReport {
    match outcome {
        SyncOutcome::Completed(report) => report,
        other => panic!("expected a completed pass, got {other:?}"),
    }
}

// ============================================================================
// Media phase
// ============================================================================

#[tokio::test]
async fn test_three_photos_captured_offline_sync_on_reconnect() {
    let store = memory_store().await;
    let api = Arc::new(MockApi::default());
    let manager = manager(store.clone(), api.clone(), false, 10);
    let monitor = ConnectivityMonitor::new(manager.clone());
    let mut rx = manager.subscribe();

    for name in ["a.jpg", "b.jpg", "c.jpg"] {
        add_photo(&store, "T", name).await;
    }
    assert_eq!(manager.get_stats().await.unwrap().pending_photos, 3);

    let outcome = monitor.report(true).await.unwrap().expect("edge triggers");
    let report = completed(outcome);
    assert_eq!(report.photos_uploaded, 3);
    assert_eq!(report.photos_failed, 0);

    let events = drain(&mut rx);
    assert_eq!(events.first(), Some(&SyncEvent::SyncStart { count: 3 }));
    assert_eq!(
        events.last(),
        Some(&SyncEvent::SyncComplete {
            success: 3,
            failed: 0
        })
    );
    let uploaded = events
        .iter()
        .filter(|e| matches!(e, SyncEvent::PhotoUploaded { .. }))
        .count();
    assert_eq!(uploaded, 3);

    assert_eq!(manager.get_stats().await.unwrap().pending_photos, 0);
    assert_eq!(api.uploads(), vec!["a.jpg", "b.jpg", "c.jpg"]);
}

#[tokio::test]
async fn test_offline_trigger_is_noop() {
    let store = memory_store().await;
    let api = Arc::new(MockApi::default());
    let manager = manager(store.clone(), api.clone(), false, 10);
    add_photo(&store, "T", "a.jpg").await;

    assert_eq!(manager.sync_all().await.unwrap(), SyncOutcome::Offline);
    assert!(api.uploads().is_empty());
    assert!(!manager.is_syncing());
    assert_eq!(store.count_pending_media().await.unwrap(), 1);
}

#[tokio::test]
async fn test_failed_upload_stays_pending_and_batch_continues() {
    let store = memory_store().await;
    let api = Arc::new(MockApi::default().failing_file("b.jpg"));
    let manager = manager(store.clone(), api.clone(), true, 10);
    let mut rx = manager.subscribe();

    for name in ["a.jpg", "b.jpg", "c.jpg"] {
        add_photo(&store, "T", name).await;
    }

    let report = completed(manager.sync_all().await.unwrap());
    assert_eq!(report.photos_uploaded, 2);
    assert_eq!(report.photos_failed, 1);

    let events = drain(&mut rx);
    let progress: Vec<usize> = events
        .iter()
        .filter_map(|e| match e {
            SyncEvent::PhotoUploaded { progress, .. } | SyncEvent::PhotoFailed { progress, .. } => {
                Some(progress.current)
            }
            _ => None,
        })
        .collect();
    assert_eq!(progress, vec![1, 2, 3]);
    assert!(events.iter().any(|e| matches!(
        e,
        SyncEvent::PhotoFailed { photo, .. } if photo.filename == "b.jpg"
    )));

    let pending = store.list_pending_media(None).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].filename, "b.jpg");
}

#[tokio::test]
async fn test_no_media_skips_media_events_but_drains_queue() {
    let store = memory_store().await;
    let api = Arc::new(MockApi::default());
    let manager = manager(store.clone(), api.clone(), true, 10);
    let mut rx = manager.subscribe();

    store
        .enqueue(QueueAction::EntityCreate {
            payload: json!({"title": "Poda"}),
        })
        .await
        .unwrap();

    let report = completed(manager.sync_all().await.unwrap());
    assert_eq!(report.actions_synced, 1);

    let events = drain(&mut rx);
    assert!(events
        .iter()
        .all(|e| !matches!(e, SyncEvent::SyncStart { .. } | SyncEvent::SyncComplete { .. })));
    assert!(matches!(events[..], [SyncEvent::ActionSynced { .. }]));
}

// ============================================================================
// Action queue
// ============================================================================

#[tokio::test]
async fn test_queued_actions_are_submitted_once_in_order() {
    let store = memory_store().await;
    let api = Arc::new(MockApi::default());
    let manager = manager(store.clone(), api.clone(), true, 10);

    let create = store
        .enqueue(QueueAction::EntityCreate {
            payload: json!({"title": "Irrigation"}),
        })
        .await
        .unwrap();
    let update = store
        .enqueue(QueueAction::EntityUpdate {
            id: TaskId::new("42").unwrap(),
            payload: json!({"status": "done"}),
        })
        .await
        .unwrap();
    assert_eq!(manager.get_stats().await.unwrap().total, 2);

    let report = completed(manager.sync_all().await.unwrap());
    assert_eq!(report.actions_synced, 2);
    assert_eq!(manager.get_stats().await.unwrap().total, 0);

    let creates = api.creates.lock().unwrap().clone();
    assert_eq!(creates.len(), 1);
    assert_eq!(creates[0].0, json!({"title": "Irrigation"}));
    assert_eq!(creates[0].1, create.idempotency_key);

    let updates = api.updates.lock().unwrap().clone();
    assert_eq!(updates, vec![(TaskId::new("42").unwrap(), update.idempotency_key)]);

    // A second pass finds nothing to do
    let report = completed(manager.sync_all().await.unwrap());
    assert_eq!(report, SyncReport { duration_ms: report.duration_ms, ..SyncReport::default() });
    assert_eq!(api.creates.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_failed_action_is_retried_with_same_key() {
    let store = memory_store().await;
    let api = Arc::new(MockApi::default());
    let manager = manager(store.clone(), api.clone(), true, 10);
    let mut rx = manager.subscribe();

    let item = store
        .enqueue(QueueAction::EntityCreate {
            payload: json!({"title": "Mowing"}),
        })
        .await
        .unwrap();

    api.set_fail_actions(true);
    let report = completed(manager.sync_all().await.unwrap());
    assert_eq!(report.actions_failed, 1);

    let queue = store.list_queue().await.unwrap();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].attempt_count, 1);
    assert!(queue[0].last_error.as_deref().unwrap().contains("500"));
    assert!(drain(&mut rx)
        .iter()
        .any(|e| matches!(e, SyncEvent::ActionFailed { attempts: 1, .. })));

    api.set_fail_actions(false);
    let report = completed(manager.sync_all().await.unwrap());
    assert_eq!(report.actions_synced, 1);
    assert_eq!(api.creates.lock().unwrap()[0].1, item.idempotency_key);
    assert!(store.list_queue().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_action_is_parked_after_max_attempts() {
    let store = memory_store().await;
    let api = Arc::new(MockApi::default());
    let manager = manager(store.clone(), api.clone(), true, 2);

    store
        .enqueue(QueueAction::EntityCreate {
            payload: json!({"title": "Pruning"}),
        })
        .await
        .unwrap();

    api.set_fail_actions(true);
    for _ in 0..2 {
        completed(manager.sync_all().await.unwrap());
    }

    let mut rx = manager.subscribe();
    api.set_fail_actions(false);
    let report = completed(manager.sync_all().await.unwrap());
    assert_eq!(report.actions_parked, 1);
    assert_eq!(report.actions_synced, 0);
    assert!(api.creates.lock().unwrap().is_empty());
    assert!(matches!(
        drain(&mut rx)[..],
        [SyncEvent::ActionParked { attempts: 2, .. }]
    ));

    let stats = manager.get_stats().await.unwrap();
    assert_eq!(stats.pending_actions, 1);
    assert_eq!(stats.parked_actions, 1);
    assert_eq!(stats.total, 1);
}

#[tokio::test]
async fn test_zero_max_attempts_never_parks() {
    let store = memory_store().await;
    let api = Arc::new(MockApi::default());
    let manager = manager(store.clone(), api.clone(), true, 0);

    store
        .enqueue(QueueAction::EntityCreate {
            payload: json!({}),
        })
        .await
        .unwrap();

    api.set_fail_actions(true);
    for _ in 0..3 {
        let report = completed(manager.sync_all().await.unwrap());
        assert_eq!(report.actions_failed, 1);
        assert_eq!(report.actions_parked, 0);
    }
    assert_eq!(manager.get_stats().await.unwrap().parked_actions, 0);
}

// ============================================================================
// Mutual exclusion
// ============================================================================

#[tokio::test]
async fn test_concurrent_trigger_returns_already_syncing() {
    let store = memory_store().await;
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let api = Arc::new(MockApi {
        gate: Some((entered.clone(), release.clone())),
        ..MockApi::default()
    });
    let manager = manager(store.clone(), api.clone(), true, 10);
    add_photo(&store, "T", "a.jpg").await;

    let first = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.sync_all().await })
    };

    entered.notified().await;
    assert!(manager.is_syncing());
    assert_eq!(manager.sync_all().await.unwrap(), SyncOutcome::AlreadySyncing);

    release.notify_one();
    let report = completed(first.await.unwrap().unwrap());
    assert_eq!(report.photos_uploaded, 1);
    assert_eq!(api.uploads().len(), 1);
    assert!(!manager.is_syncing());
}

#[tokio::test]
async fn test_managers_on_separate_pools_share_one_pass() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("verdiplan.db");
    let daemon_pool = DatabasePool::new(&path).await.unwrap();
    let cli_pool = DatabasePool::new(&path).await.unwrap();
    let daemon_store = Arc::new(SqliteOfflineStore::new(daemon_pool.pool().clone()));
    let cli_store = Arc::new(SqliteOfflineStore::new(cli_pool.pool().clone()));
    add_photo(&daemon_store, "T", "a.jpg").await;

    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let daemon_api = Arc::new(MockApi {
        gate: Some((entered.clone(), release.clone())),
        ..MockApi::default()
    });
    let cli_api = Arc::new(MockApi::default());
    let daemon = manager(daemon_store.clone(), daemon_api.clone(), true, 10);
    let cli = manager(cli_store.clone(), cli_api.clone(), true, 10);

    let first = {
        let daemon = daemon.clone();
        tokio::spawn(async move { daemon.sync_all().await })
    };
    entered.notified().await;

    // The other manager has its own in-process flag; only the store lease stops it
    assert!(!cli.is_syncing());
    assert_eq!(cli.sync_all().await.unwrap(), SyncOutcome::AlreadySyncing);

    release.notify_one();
    let report = completed(first.await.unwrap().unwrap());
    assert_eq!(report.photos_uploaded, 1);
    assert_eq!(daemon_api.uploads(), vec!["a.jpg".to_string()]);
    assert!(cli_api.uploads().is_empty());

    // Lease released at the end of the pass
    let report = completed(cli.sync_all().await.unwrap());
    assert_eq!(report.photos_uploaded, 0);
    assert!(cli_api.uploads().is_empty());

    daemon_pool.close().await;
    cli_pool.close().await;
}

#[tokio::test]
async fn test_lease_held_elsewhere_blocks_pass_until_released() {
    let store = memory_store().await;
    let api = Arc::new(MockApi::default());
    let manager = manager(store.clone(), api.clone(), true, 10);
    add_photo(&store, "T", "a.jpg").await;

    let ttl = std::time::Duration::from_secs(600);
    assert!(store.try_acquire_sync_lease("other-process", ttl).await.unwrap());

    assert_eq!(manager.sync_all().await.unwrap(), SyncOutcome::AlreadySyncing);
    assert!(api.uploads().is_empty());
    assert_eq!(store.list_pending_media(None).await.unwrap().len(), 1);
    assert!(!manager.is_syncing());

    store.release_sync_lease("other-process").await.unwrap();
    let report = completed(manager.sync_all().await.unwrap());
    assert_eq!(report.photos_uploaded, 1);
}

// ============================================================================
// Connectivity monitor
// ============================================================================

#[tokio::test]
async fn test_monitor_fires_once_per_edge() {
    let store = memory_store().await;
    let api = Arc::new(MockApi::default());
    let manager = manager(store.clone(), api.clone(), false, 10);
    let monitor = ConnectivityMonitor::new(manager.clone());
    let mut online_rx = monitor.subscribe();

    assert!(monitor.report(true).await.unwrap().is_some());
    assert!(monitor.report(true).await.unwrap().is_none());
    assert!(monitor.is_online());
    assert!(online_rx.has_changed().unwrap());
    assert!(*online_rx.borrow_and_update());

    assert!(monitor.report(false).await.unwrap().is_none());
    assert!(!monitor.is_online());
    assert!(!manager.connectivity().is_online());

    assert!(monitor.report(true).await.unwrap().is_some());
}

// ============================================================================
// Status aggregator
// ============================================================================

#[tokio::test]
async fn test_status_tracks_syncing_between_start_and_complete() {
    let store = memory_store().await;
    let api = Arc::new(MockApi::default());
    let manager = manager(store.clone(), api.clone(), true, 10);
    let aggregator = StatusAggregator::new(manager.clone());

    add_photo(&store, "T", "a.jpg").await;
    aggregator.refresh().await.unwrap();
    let status = aggregator.current();
    assert_eq!(status.pending_count, 1);
    assert!(status.online);
    assert!(!status.syncing);
    assert!(status.last_sync.is_none());

    aggregator
        .handle_event(&SyncEvent::SyncStart { count: 1 })
        .await
        .unwrap();
    assert!(aggregator.current().syncing);

    completed(manager.sync_all().await.unwrap());
    aggregator
        .handle_event(&SyncEvent::SyncComplete {
            success: 1,
            failed: 0,
        })
        .await
        .unwrap();

    let status = aggregator.current();
    assert!(!status.syncing);
    assert!(status.last_sync.is_some());
    assert_eq!(status.pending_count, 0);
}

// ============================================================================
// Snapshots
// ============================================================================

#[tokio::test]
async fn test_snapshot_refresh_and_offline_fallback() {
    let store = memory_store().await;
    let online_api = Arc::new(MockApi::default().with_tasks(vec![
        json!({"id": 1, "title": "Irrigation"}),
        json!({"id": 2, "title": "Mowing"}),
    ]));

    let service = SnapshotService::new(store.clone(), online_api);
    assert_eq!(service.refresh().await.unwrap(), 2);
    let list = service.load_tasks().await.unwrap();
    assert_eq!(list.source, TaskSource::Remote);
    assert_eq!(list.tasks.len(), 2);

    let offline = SnapshotService::new(store.clone(), Arc::new(MockApi::default()));
    assert!(offline.refresh().await.is_err());

    let list = offline.load_tasks().await.unwrap();
    assert_eq!(list.source, TaskSource::Snapshot);
    assert_eq!(list.tasks.len(), 2);
    assert!(list.tasks.iter().any(|t| t["title"] == "Mowing"));
}
