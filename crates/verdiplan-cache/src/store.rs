//! SQLite implementation of IOfflineStore
//!
//! Every public operation is a single statement or a single transaction, so
//! a failed call leaves the store unchanged. Writes return only after SQLite
//! has committed them.

use std::collections::HashSet;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use verdiplan_core::domain::{
    CachedEntitySnapshot, IdempotencyKey, MediaContent, MediaId, MediaMetadata, PendingMedia,
    QueueAction, QueueItemId, SyncQueueItem, TaskId,
};
use verdiplan_core::ports::IOfflineStore;

use crate::codec::{format_datetime, parse_datetime, parse_json, parse_optional_datetime, to_json};
use crate::CacheError;

/// SQLite-based implementation of the offline store port
pub struct SqliteOfflineStore {
    pool: SqlitePool,
}

impl SqliteOfflineStore {
    /// Creates a new store instance with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

// ============================================================================
// Row mapping functions
// ============================================================================

fn media_from_row(row: &SqliteRow) -> Result<PendingMedia, CacheError> {
    let id: i64 = row.get("id");
    let task_id_str: String = row.get("task_id");
    let byte_size: i64 = row.get("byte_size");
    let captured_at_str: String = row.get("captured_at");
    let uploaded: bool = row.get("uploaded");
    let uploaded_at_str: Option<String> = row.get("uploaded_at");
    let metadata_str: String = row.get("metadata");

    let task_id = TaskId::new(task_id_str.as_str()).map_err(|e| {
        CacheError::SerializationError(format!("Invalid task id '{}': {}", task_id_str, e))
    })?;
    let metadata: MediaMetadata = parse_json("metadata", &metadata_str)?;

    Ok(PendingMedia {
        id: MediaId::new(id),
        task_id,
        content: row.get("content"),
        filename: row.get("filename"),
        mime_type: row.get("mime_type"),
        byte_size: byte_size as u64,
        captured_at: parse_datetime(&captured_at_str)?,
        uploaded,
        uploaded_at: parse_optional_datetime(uploaded_at_str)?,
        metadata,
    })
}

fn snapshot_from_row(row: &SqliteRow) -> Result<CachedEntitySnapshot, CacheError> {
    let id_str: String = row.get("id");
    let fields_str: String = row.get("fields");
    let cached_at_str: String = row.get("cached_at");

    let id = TaskId::new(id_str.as_str()).map_err(|e| {
        CacheError::SerializationError(format!("Invalid snapshot id '{}': {}", id_str, e))
    })?;

    Ok(CachedEntitySnapshot {
        id,
        fields: parse_json("fields", &fields_str)?,
        cached_at: parse_datetime(&cached_at_str)?,
    })
}

fn queue_item_from_row(row: &SqliteRow) -> Result<SyncQueueItem, CacheError> {
    let id: i64 = row.get("id");
    let kind: String = row.get("kind");
    let entity_id: Option<String> = row.get("entity_id");
    let payload_str: String = row.get("payload");
    let key_str: String = row.get("idempotency_key");
    let enqueued_at_str: String = row.get("enqueued_at");
    let attempt_count: i64 = row.get("attempt_count");

    let payload: Value = parse_json("payload", &payload_str)?;
    let action = QueueAction::from_parts(&kind, entity_id.as_deref(), payload).map_err(|e| {
        CacheError::SerializationError(format!("Queue item {} is unreadable: {}", id, e))
    })?;
    let idempotency_key = IdempotencyKey::from_str(&key_str).map_err(|e| {
        CacheError::SerializationError(format!("Invalid idempotency key '{}': {}", key_str, e))
    })?;

    Ok(SyncQueueItem {
        id: QueueItemId::new(id),
        action,
        idempotency_key,
        enqueued_at: parse_datetime(&enqueued_at_str)?,
        attempt_count: attempt_count.clamp(0, i64::from(u32::MAX)) as u32,
        last_error: row.get("last_error"),
    })
}

/// Validates a full snapshot set before anything is written
fn build_snapshots(
    entities: Vec<Value>,
    cached_at: DateTime<Utc>,
) -> Result<Vec<CachedEntitySnapshot>, CacheError> {
    let mut seen = HashSet::with_capacity(entities.len());
    let mut snapshots = Vec::with_capacity(entities.len());

    for (index, entity) in entities.into_iter().enumerate() {
        let snapshot = CachedEntitySnapshot::from_entity(entity, cached_at)
            .map_err(|e| CacheError::InvalidEntity(format!("entity #{index}: {e}")))?;
        if !seen.insert(snapshot.id.clone()) {
            return Err(CacheError::InvalidEntity(format!(
                "duplicate id '{}' in replacement set",
                snapshot.id
            )));
        }
        snapshots.push(snapshot);
    }

    Ok(snapshots)
}

// ============================================================================
// IOfflineStore implementation
// ============================================================================

#[async_trait::async_trait]
impl IOfflineStore for SqliteOfflineStore {
    // --- Pending media ---

    async fn add_media(
        &self,
        task_id: &TaskId,
        content: MediaContent,
        metadata: MediaMetadata,
    ) -> anyhow::Result<MediaId> {
        let captured_at = format_datetime(&Utc::now());
        let metadata = to_json("metadata", &metadata)?;
        let filename = content.filename().to_string();
        let mime_type = content.mime_type().to_string();
        let byte_size = content.byte_size() as i64;

        let result = sqlx::query(
            "INSERT INTO pending_media \
             (task_id, content, filename, mime_type, byte_size, captured_at, uploaded, metadata) \
             VALUES (?, ?, ?, ?, ?, ?, 0, ?)",
        )
        .bind(task_id.as_str())
        .bind(content.into_bytes())
        .bind(&filename)
        .bind(&mime_type)
        .bind(byte_size)
        .bind(&captured_at)
        .bind(&metadata)
        .execute(&self.pool)
        .await
        .map_err(CacheError::from)?;

        let id = MediaId::new(result.last_insert_rowid());
        tracing::debug!(media_id = %id, task_id = %task_id, filename = %filename, byte_size, "Stored pending media");
        Ok(id)
    }

    async fn list_pending_media(
        &self,
        task_id: Option<&TaskId>,
    ) -> anyhow::Result<Vec<PendingMedia>> {
        let mut sql = String::from("SELECT * FROM pending_media WHERE uploaded = 0");
        if task_id.is_some() {
            sql.push_str(" AND task_id = ?");
        }
        sql.push_str(" ORDER BY id ASC");

        let mut query = sqlx::query(&sql);
        if let Some(task_id) = task_id {
            query = query.bind(task_id.as_str());
        }

        let rows = query.fetch_all(&self.pool).await.map_err(CacheError::from)?;

        let mut media = Vec::with_capacity(rows.len());
        for row in &rows {
            media.push(media_from_row(row)?);
        }
        Ok(media)
    }

    async fn mark_media_uploaded(&self, id: MediaId) -> anyhow::Result<()> {
        let now = format_datetime(&Utc::now());

        let result = sqlx::query(
            "UPDATE pending_media SET uploaded = 1, uploaded_at = ? \
             WHERE id = ? AND uploaded = 0",
        )
        .bind(&now)
        .bind(id.value())
        .execute(&self.pool)
        .await
        .map_err(CacheError::from)?;

        if result.rows_affected() == 0 {
            tracing::trace!(media_id = %id, "Media already uploaded or absent");
        } else {
            tracing::trace!(media_id = %id, "Marked media uploaded");
        }
        Ok(())
    }

    async fn get_media(&self, id: MediaId) -> anyhow::Result<Option<PendingMedia>> {
        let row = sqlx::query("SELECT * FROM pending_media WHERE id = ?")
            .bind(id.value())
            .fetch_optional(&self.pool)
            .await
            .map_err(CacheError::from)?;

        match row {
            Some(ref r) => Ok(Some(media_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn delete_media(&self, id: MediaId) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM pending_media WHERE id = ?")
            .bind(id.value())
            .execute(&self.pool)
            .await
            .map_err(CacheError::from)?;

        tracing::trace!(media_id = %id, "Deleted media");
        Ok(result.rows_affected() > 0)
    }

    async fn purge_uploaded_media(&self, before: DateTime<Utc>) -> anyhow::Result<u64> {
        let result = sqlx::query(
            "DELETE FROM pending_media \
             WHERE uploaded = 1 AND uploaded_at IS NOT NULL AND uploaded_at < ?",
        )
        .bind(format_datetime(&before))
        .execute(&self.pool)
        .await
        .map_err(CacheError::from)?;

        let purged = result.rows_affected();
        tracing::debug!(purged, before = %before, "Purged uploaded media");
        Ok(purged)
    }

    async fn count_pending_media(&self) -> anyhow::Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pending_media WHERE uploaded = 0")
            .fetch_one(&self.pool)
            .await
            .map_err(CacheError::from)?;
        Ok(count as u64)
    }

    // --- Entity snapshots ---

    async fn replace_all_snapshots(&self, entities: Vec<Value>) -> anyhow::Result<usize> {
        let cached_at = Utc::now();
        let snapshots = build_snapshots(entities, cached_at)?;
        let cached_at = format_datetime(&cached_at);

        let mut tx = self.pool.begin().await.map_err(CacheError::from)?;

        sqlx::query("DELETE FROM entity_snapshots")
            .execute(&mut *tx)
            .await
            .map_err(CacheError::from)?;

        for snapshot in &snapshots {
            let fields = to_json("fields", &snapshot.fields)?;
            sqlx::query("INSERT INTO entity_snapshots (id, fields, cached_at) VALUES (?, ?, ?)")
                .bind(snapshot.id.as_str())
                .bind(&fields)
                .bind(&cached_at)
                .execute(&mut *tx)
                .await
                .map_err(CacheError::from)?;
        }

        tx.commit().await.map_err(CacheError::from)?;

        tracing::debug!(count = snapshots.len(), "Replaced entity snapshots");
        Ok(snapshots.len())
    }

    async fn get_snapshot(&self, id: &TaskId) -> anyhow::Result<Option<CachedEntitySnapshot>> {
        let row = sqlx::query("SELECT * FROM entity_snapshots WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(CacheError::from)?;

        match row {
            Some(ref r) => Ok(Some(snapshot_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn list_snapshots(&self) -> anyhow::Result<Vec<CachedEntitySnapshot>> {
        let rows = sqlx::query("SELECT * FROM entity_snapshots ORDER BY rowid ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(CacheError::from)?;

        let mut snapshots = Vec::with_capacity(rows.len());
        for row in &rows {
            snapshots.push(snapshot_from_row(row)?);
        }
        Ok(snapshots)
    }

    // --- Action queue ---

    async fn enqueue(&self, action: QueueAction) -> anyhow::Result<SyncQueueItem> {
        let idempotency_key = IdempotencyKey::new();
        let enqueued_at = Utc::now();
        let payload = to_json("payload", action.payload())?;

        let result = sqlx::query(
            "INSERT INTO sync_queue \
             (kind, entity_id, payload, idempotency_key, enqueued_at, attempt_count) \
             VALUES (?, ?, ?, ?, ?, 0)",
        )
        .bind(action.kind())
        .bind(action.target_id().map(TaskId::as_str))
        .bind(&payload)
        .bind(idempotency_key.to_string())
        .bind(format_datetime(&enqueued_at))
        .execute(&self.pool)
        .await
        .map_err(CacheError::from)?;

        let id = QueueItemId::new(result.last_insert_rowid());
        tracing::debug!(queue_id = %id, kind = action.kind(), key = %idempotency_key, "Enqueued action");

        Ok(SyncQueueItem {
            id,
            action,
            idempotency_key,
            enqueued_at,
            attempt_count: 0,
            last_error: None,
        })
    }

    async fn list_queue(&self) -> anyhow::Result<Vec<SyncQueueItem>> {
        let rows = sqlx::query("SELECT * FROM sync_queue ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(CacheError::from)?;

        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            items.push(queue_item_from_row(row)?);
        }
        Ok(items)
    }

    async fn dequeue(&self, id: QueueItemId) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM sync_queue WHERE id = ?")
            .bind(id.value())
            .execute(&self.pool)
            .await
            .map_err(CacheError::from)?;

        tracing::trace!(queue_id = %id, "Dequeued action");
        Ok(result.rows_affected() > 0)
    }

    async fn clear_queue(&self) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM sync_queue")
            .execute(&self.pool)
            .await
            .map_err(CacheError::from)?;

        let cleared = result.rows_affected();
        tracing::debug!(cleared, "Cleared action queue");
        Ok(cleared)
    }

    async fn record_attempt_failure(&self, id: QueueItemId, error: &str) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE sync_queue SET attempt_count = attempt_count + 1, last_error = ? WHERE id = ?",
        )
        .bind(error)
        .bind(id.value())
        .execute(&self.pool)
        .await
        .map_err(CacheError::from)?;

        tracing::trace!(queue_id = %id, "Recorded failed attempt");
        Ok(())
    }

    async fn count_queue(&self) -> anyhow::Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sync_queue")
            .fetch_one(&self.pool)
            .await
            .map_err(CacheError::from)?;
        Ok(count as u64)
    }

    // ------------------------------------------------------------------------
    // Sync lease
    // ------------------------------------------------------------------------

    async fn try_acquire_sync_lease(&self, holder: &str, ttl: Duration) -> anyhow::Result<bool> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| anyhow::anyhow!("Lease ttl out of range: {e}"))?;
        let now = Utc::now();

        // One upsert statement: SQLite runs it under the write lock, so two
        // processes cannot both see the lease as free
        let result = sqlx::query(
            "INSERT INTO sync_lease (id, holder, acquired_at, expires_at) VALUES (1, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 holder = excluded.holder,
                 acquired_at = CASE WHEN sync_lease.holder = excluded.holder
                                    THEN sync_lease.acquired_at
                                    ELSE excluded.acquired_at END,
                 expires_at = excluded.expires_at
             WHERE sync_lease.holder = excluded.holder
                OR sync_lease.expires_at <= excluded.acquired_at",
        )
        .bind(holder)
        .bind(format_datetime(&now))
        .bind(format_datetime(&(now + ttl)))
        .execute(&self.pool)
        .await
        .map_err(CacheError::from)?;

        let acquired = result.rows_affected() > 0;
        tracing::debug!(holder, acquired, "Sync lease claim");
        Ok(acquired)
    }

    async fn release_sync_lease(&self, holder: &str) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM sync_lease WHERE id = 1 AND holder = ?")
            .bind(holder)
            .execute(&self.pool)
            .await
            .map_err(CacheError::from)?;
        tracing::debug!(holder, "Sync lease released");
        Ok(())
    }
}
