//! Offline store port (driven/secondary port)
//!
//! This module defines the interface of the durable local store that holds
//! everything captured or changed while the device is disconnected:
//! pending media, cached entity snapshots and the action queue.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific.
//! - Every operation is atomic on its own. A failed call leaves the store
//!   unchanged.
//! - A write returns only after it has been durably committed.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::domain::{
    CachedEntitySnapshot, MediaContent, MediaId, MediaMetadata, PendingMedia, QueueAction,
    QueueItemId, SyncQueueItem, TaskId,
};

/// Port trait for the offline store
#[async_trait::async_trait]
pub trait IOfflineStore: Send + Sync {
    // --- Pending media ---

    /// Persists a capture with `uploaded = false` and returns its id
    async fn add_media(
        &self,
        task_id: &TaskId,
        content: MediaContent,
        metadata: MediaMetadata,
    ) -> anyhow::Result<MediaId>;

    /// Lists media not yet uploaded, optionally restricted to one task,
    /// in insertion order
    async fn list_pending_media(&self, task_id: Option<&TaskId>)
        -> anyhow::Result<Vec<PendingMedia>>;

    /// Marks a media row as uploaded
    ///
    /// Idempotent: marking an absent or already uploaded row is a no-op.
    async fn mark_media_uploaded(&self, id: MediaId) -> anyhow::Result<()>;

    async fn get_media(&self, id: MediaId) -> anyhow::Result<Option<PendingMedia>>;

    /// Deletes a media row; returns whether a row was removed
    async fn delete_media(&self, id: MediaId) -> anyhow::Result<bool>;

    /// Deletes uploaded media whose `uploaded_at` is older than `before`;
    /// returns the number of rows removed
    async fn purge_uploaded_media(&self, before: DateTime<Utc>) -> anyhow::Result<u64>;

    async fn count_pending_media(&self) -> anyhow::Result<u64>;

    // --- Entity snapshots ---

    /// Atomically replaces every cached snapshot with `entities`
    ///
    /// Entities without an `id`, or sharing an id, reject the whole call and
    /// leave the previous snapshot set intact. Returns the number stored.
    async fn replace_all_snapshots(&self, entities: Vec<Value>) -> anyhow::Result<usize>;

    async fn get_snapshot(&self, id: &TaskId) -> anyhow::Result<Option<CachedEntitySnapshot>>;

    async fn list_snapshots(&self) -> anyhow::Result<Vec<CachedEntitySnapshot>>;

    // --- Action queue ---

    /// Appends an action with a fresh idempotency key
    async fn enqueue(&self, action: QueueAction) -> anyhow::Result<SyncQueueItem>;

    /// Lists every queued item in insertion order
    async fn list_queue(&self) -> anyhow::Result<Vec<SyncQueueItem>>;

    /// Removes an acknowledged item; returns whether a row was removed
    async fn dequeue(&self, id: QueueItemId) -> anyhow::Result<bool>;

    /// Removes every queued item; returns the number removed
    async fn clear_queue(&self) -> anyhow::Result<u64>;

    /// Increments the attempt counter and stores the last error message
    async fn record_attempt_failure(&self, id: QueueItemId, error: &str) -> anyhow::Result<()>;

    async fn count_queue(&self) -> anyhow::Result<u64>;

    // --- Sync lease ---

    /// Claims the store-wide sync lease for `holder` until `now + ttl`
    ///
    /// Succeeds when the lease is free, expired, or already held by
    /// `holder` (which extends it). Returns false while another holder has
    /// a live lease. At most one process drains the store at a time.
    async fn try_acquire_sync_lease(&self, holder: &str, ttl: Duration) -> anyhow::Result<bool>;

    /// Releases the lease if `holder` still owns it
    async fn release_sync_lease(&self, holder: &str) -> anyhow::Result<()>;
}
