//! Integration tests for SqliteOfflineStore and SqliteResponseCache
//!
//! Most tests use an in-memory SQLite database, created fresh per test.
//! Durability tests use a file-backed database in a temporary directory.

use chrono::{Duration, Utc};
use serde_json::json;

use verdiplan_cache::{DatabasePool, SqliteOfflineStore, SqliteResponseCache};
use verdiplan_core::domain::{
    CachedResponse, MediaContent, MediaId, MediaMetadata, QueueAction, QueueItemId, TaskId,
};
use verdiplan_core::ports::{IOfflineStore, IResponseCache};

// ============================================================================
// Test helpers
// ============================================================================

async fn setup() -> SqliteOfflineStore {
    let pool = DatabasePool::in_memory()
        .await
        .expect("Failed to create in-memory database");
    SqliteOfflineStore::new(pool.pool().clone())
}

fn task(id: &str) -> TaskId {
    TaskId::new(id).unwrap()
}

fn photo(name: &str) -> MediaContent {
    MediaContent::from_filename(name, vec![0xFF, 0xD8, 0xFF, 0xE0]).unwrap()
}

async fn add_photo(store: &SqliteOfflineStore, task_id: &str, name: &str) -> MediaId {
    store
        .add_media(&task(task_id), photo(name), MediaMetadata::new())
        .await
        .unwrap()
}

// ============================================================================
// Pending media
// ============================================================================

#[tokio::test]
async fn test_add_and_get_media() {
    let store = setup().await;

    let mut metadata = MediaMetadata::new();
    metadata.insert("lat".into(), json!(-23.5));
    let id = store
        .add_media(&task("T"), photo("front.jpg"), metadata)
        .await
        .unwrap();

    let media = store.get_media(id).await.unwrap().expect("media exists");
    assert_eq!(media.id, id);
    assert_eq!(media.task_id.as_str(), "T");
    assert_eq!(media.filename, "front.jpg");
    assert_eq!(media.mime_type, "image/jpeg");
    assert_eq!(media.byte_size, 4);
    assert_eq!(media.content, vec![0xFF, 0xD8, 0xFF, 0xE0]);
    assert!(!media.uploaded);
    assert!(media.uploaded_at.is_none());
    assert_eq!(media.metadata.get("lat"), Some(&json!(-23.5)));
}

#[tokio::test]
async fn test_get_media_not_found() {
    let store = setup().await;
    assert!(store.get_media(MediaId::new(99)).await.unwrap().is_none());
}

#[tokio::test]
async fn test_list_pending_media_filters_by_task_in_insertion_order() {
    let store = setup().await;
    let a1 = add_photo(&store, "A", "1.jpg").await;
    let b1 = add_photo(&store, "B", "2.jpg").await;
    let a2 = add_photo(&store, "A", "3.jpg").await;

    let all: Vec<MediaId> = store
        .list_pending_media(None)
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.id)
        .collect();
    assert_eq!(all, vec![a1, b1, a2]);

    let only_a: Vec<MediaId> = store
        .list_pending_media(Some(&task("A")))
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.id)
        .collect();
    assert_eq!(only_a, vec![a1, a2]);

    assert!(store
        .list_pending_media(Some(&task("Z")))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_uploaded_media_is_excluded_from_pending() {
    let store = setup().await;
    let first = add_photo(&store, "T", "1.jpg").await;
    let second = add_photo(&store, "T", "2.jpg").await;

    store.mark_media_uploaded(first).await.unwrap();

    let pending = store.list_pending_media(None).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, second);
    assert_eq!(store.count_pending_media().await.unwrap(), 1);

    let marked = store.get_media(first).await.unwrap().unwrap();
    assert!(marked.uploaded);
    assert!(marked.uploaded_at.is_some());
}

#[tokio::test]
async fn test_mark_media_uploaded_is_idempotent() {
    let store = setup().await;
    let id = add_photo(&store, "T", "1.jpg").await;

    store.mark_media_uploaded(id).await.unwrap();
    let first_stamp = store.get_media(id).await.unwrap().unwrap().uploaded_at;

    store.mark_media_uploaded(id).await.unwrap();
    let second_stamp = store.get_media(id).await.unwrap().unwrap().uploaded_at;
    assert_eq!(first_stamp, second_stamp);

    // Absent rows are a no-op, not an error
    store.mark_media_uploaded(MediaId::new(4242)).await.unwrap();
}

#[tokio::test]
async fn test_delete_media() {
    let store = setup().await;
    let id = add_photo(&store, "T", "1.jpg").await;

    assert!(store.delete_media(id).await.unwrap());
    assert!(!store.delete_media(id).await.unwrap());
    assert!(store.get_media(id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_purge_uploaded_media_respects_cutoff() {
    let store = setup().await;
    let uploaded = add_photo(&store, "T", "old.jpg").await;
    let pending = add_photo(&store, "T", "new.jpg").await;
    store.mark_media_uploaded(uploaded).await.unwrap();

    // Cutoff in the past: the freshly uploaded row is kept
    let purged = store
        .purge_uploaded_media(Utc::now() - Duration::days(1))
        .await
        .unwrap();
    assert_eq!(purged, 0);

    // Cutoff in the future: only uploaded rows go, pending rows stay
    let purged = store
        .purge_uploaded_media(Utc::now() + Duration::seconds(1))
        .await
        .unwrap();
    assert_eq!(purged, 1);
    assert!(store.get_media(uploaded).await.unwrap().is_none());
    assert!(store.get_media(pending).await.unwrap().is_some());
}

#[tokio::test]
async fn test_media_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("verdiplan.db");

    let id = {
        let pool = DatabasePool::new(&path).await.unwrap();
        let store = SqliteOfflineStore::new(pool.pool().clone());
        let id = add_photo(&store, "T", "durable.jpg").await;
        pool.close().await;
        id
    };

    let pool = DatabasePool::new(&path).await.unwrap();
    let store = SqliteOfflineStore::new(pool.pool().clone());
    let pending = store.list_pending_media(None).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, id);
    assert_eq!(pending[0].filename, "durable.jpg");
}

// ============================================================================
// Entity snapshots
// ============================================================================

#[tokio::test]
async fn test_replace_all_snapshots_replaces_previous_set() {
    let store = setup().await;

    let stored = store
        .replace_all_snapshots(vec![json!({"id": 1, "title": "Mow"}), json!({"id": 2})])
        .await
        .unwrap();
    assert_eq!(stored, 2);

    store
        .replace_all_snapshots(vec![json!({"id": 3, "title": "Prune"})])
        .await
        .unwrap();

    let all = store.list_snapshots().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].id.as_str(), "3");
    assert_eq!(all[0].fields["title"], "Prune");
    assert!(store.get_snapshot(&task("1")).await.unwrap().is_none());
    assert!(store.get_snapshot(&task("3")).await.unwrap().is_some());
}

#[tokio::test]
async fn test_replace_all_snapshots_rejects_invalid_sets_atomically() {
    let store = setup().await;
    store
        .replace_all_snapshots(vec![json!({"id": "keep"})])
        .await
        .unwrap();

    let missing_id = store
        .replace_all_snapshots(vec![json!({"id": "a"}), json!({"title": "no id"})])
        .await;
    assert!(missing_id.is_err());

    let duplicate = store
        .replace_all_snapshots(vec![json!({"id": "a"}), json!({"id": "a"})])
        .await;
    assert!(duplicate.is_err());

    let all = store.list_snapshots().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].id.as_str(), "keep");
}

#[tokio::test]
async fn test_replace_all_snapshots_with_empty_set_clears() {
    let store = setup().await;
    store
        .replace_all_snapshots(vec![json!({"id": 1})])
        .await
        .unwrap();
    assert_eq!(store.replace_all_snapshots(vec![]).await.unwrap(), 0);
    assert!(store.list_snapshots().await.unwrap().is_empty());
}

// ============================================================================
// Action queue
// ============================================================================

#[tokio::test]
async fn test_enqueue_and_list_in_order() {
    let store = setup().await;

    let create = store
        .enqueue(QueueAction::EntityCreate {
            payload: json!({"title": "Plant roses"}),
        })
        .await
        .unwrap();
    let update = store
        .enqueue(QueueAction::EntityUpdate {
            id: task("7"),
            payload: json!({"status": "done"}),
        })
        .await
        .unwrap();
    assert_ne!(create.idempotency_key, update.idempotency_key);

    let queue = store.list_queue().await.unwrap();
    assert_eq!(queue.len(), 2);
    assert_eq!(queue[0].id, create.id);
    assert_eq!(queue[0].action, create.action);
    assert_eq!(queue[0].idempotency_key, create.idempotency_key);
    assert_eq!(queue[0].attempt_count, 0);
    assert_eq!(queue[1].action, update.action);
    assert_eq!(store.count_queue().await.unwrap(), 2);
}

#[tokio::test]
async fn test_dequeue_and_clear() {
    let store = setup().await;
    let item = store
        .enqueue(QueueAction::EntityCreate { payload: json!({}) })
        .await
        .unwrap();
    store
        .enqueue(QueueAction::EntityCreate { payload: json!({}) })
        .await
        .unwrap();

    assert!(store.dequeue(item.id).await.unwrap());
    assert!(!store.dequeue(item.id).await.unwrap());
    assert!(!store.dequeue(QueueItemId::new(999)).await.unwrap());
    assert_eq!(store.count_queue().await.unwrap(), 1);

    assert_eq!(store.clear_queue().await.unwrap(), 1);
    assert_eq!(store.count_queue().await.unwrap(), 0);
}

#[tokio::test]
async fn test_record_attempt_failure_keeps_key() {
    let store = setup().await;
    let item = store
        .enqueue(QueueAction::EntityUpdate {
            id: task("1"),
            payload: json!({"x": 1}),
        })
        .await
        .unwrap();

    store
        .record_attempt_failure(item.id, "HTTP 503")
        .await
        .unwrap();
    store
        .record_attempt_failure(item.id, "HTTP 502")
        .await
        .unwrap();

    let queue = store.list_queue().await.unwrap();
    assert_eq!(queue[0].attempt_count, 2);
    assert_eq!(queue[0].last_error.as_deref(), Some("HTTP 502"));
    assert_eq!(queue[0].idempotency_key, item.idempotency_key);
}

// ============================================================================
// Sync lease
// ============================================================================

const LEASE_TTL: std::time::Duration = std::time::Duration::from_secs(600);

#[tokio::test]
async fn test_sync_lease_is_exclusive_until_released() {
    let store = setup().await;

    assert!(store.try_acquire_sync_lease("daemon", LEASE_TTL).await.unwrap());
    assert!(!store.try_acquire_sync_lease("cli", LEASE_TTL).await.unwrap());
    // The holder may extend its own lease
    assert!(store.try_acquire_sync_lease("daemon", LEASE_TTL).await.unwrap());

    // Releasing someone else's lease does nothing
    store.release_sync_lease("cli").await.unwrap();
    assert!(!store.try_acquire_sync_lease("cli", LEASE_TTL).await.unwrap());

    store.release_sync_lease("daemon").await.unwrap();
    assert!(store.try_acquire_sync_lease("cli", LEASE_TTL).await.unwrap());
}

#[tokio::test]
async fn test_expired_sync_lease_can_be_taken_over() {
    let store = setup().await;

    assert!(store
        .try_acquire_sync_lease("crashed", std::time::Duration::ZERO)
        .await
        .unwrap());
    assert!(store.try_acquire_sync_lease("daemon", LEASE_TTL).await.unwrap());
    assert!(!store.try_acquire_sync_lease("crashed", LEASE_TTL).await.unwrap());
}

#[tokio::test]
async fn test_sync_lease_is_shared_between_pools() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("verdiplan.db");
    let daemon_pool = DatabasePool::new(&path).await.unwrap();
    let cli_pool = DatabasePool::new(&path).await.unwrap();
    let daemon = SqliteOfflineStore::new(daemon_pool.pool().clone());
    let cli = SqliteOfflineStore::new(cli_pool.pool().clone());

    let (a, b) = tokio::join!(
        daemon.try_acquire_sync_lease("daemon", LEASE_TTL),
        cli.try_acquire_sync_lease("cli", LEASE_TTL),
    );
    assert!(a.unwrap() ^ b.unwrap(), "exactly one process holds the lease");
}

// ============================================================================
// Response cache
// ============================================================================

async fn setup_cache() -> SqliteResponseCache {
    let pool = DatabasePool::in_memory().await.unwrap();
    SqliteResponseCache::new(pool.pool().clone())
}

fn entry(cache: &str, key: &str, body: &[u8]) -> CachedResponse {
    CachedResponse {
        cache_name: cache.into(),
        request_key: key.into(),
        url: format!("http://localhost:8787/{key}"),
        status: 200,
        headers: vec![("content-type".into(), "text/html".into())],
        body: body.to_vec(),
        stored_at: Utc::now(),
    }
}

#[tokio::test]
async fn test_response_cache_put_and_match() {
    let cache = setup_cache().await;
    assert!(cache.match_request("index").await.unwrap().is_none());

    cache.put(&entry("verdiplan-v1", "index", b"<html>")).await.unwrap();
    let hit = cache.match_request("index").await.unwrap().expect("hit");
    assert_eq!(hit.body, b"<html>");
    assert_eq!(hit.header("Content-Type"), Some("text/html"));

    // Same key in the same generation replaces the entry
    cache.put(&entry("verdiplan-v1", "index", b"<html v2>")).await.unwrap();
    let hit = cache.match_request("index").await.unwrap().unwrap();
    assert_eq!(hit.body, b"<html v2>");
}

#[tokio::test]
async fn test_response_cache_generations() {
    let cache = setup_cache().await;
    cache.put(&entry("verdiplan-v0", "old", b"a")).await.unwrap();
    cache.put(&entry("verdiplan-v1", "new", b"b")).await.unwrap();
    cache.put(&entry("verdiplan-runtime", "img", b"c")).await.unwrap();

    assert_eq!(
        cache.cache_names().await.unwrap(),
        vec!["verdiplan-runtime", "verdiplan-v0", "verdiplan-v1"]
    );
    assert!(cache.has_cache("verdiplan-v0").await.unwrap());

    assert!(cache.delete_cache("verdiplan-v0").await.unwrap());
    assert!(!cache.delete_cache("verdiplan-v0").await.unwrap());
    assert!(!cache.has_cache("verdiplan-v0").await.unwrap());
    assert!(cache.match_request("old").await.unwrap().is_none());
    assert!(cache.match_request("img").await.unwrap().is_some());
}
