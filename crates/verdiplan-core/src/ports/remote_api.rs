//! Remote API port (driven/secondary port)
//!
//! The operations the synchronizer needs from the Verdiplan REST API.
//! Implementations attach authentication and map transport failures to
//! `anyhow` errors; callers treat every error as a per-item failure.

use serde_json::Value;

use crate::domain::{IdempotencyKey, PendingMedia, TaskId};

/// Port trait for the remote task API
#[async_trait::async_trait]
pub trait IRemoteApi: Send + Sync {
    /// Creates a task (`POST /tasks`) and returns the created entity
    async fn create_task(&self, payload: &Value, key: &IdempotencyKey) -> anyhow::Result<Value>;

    /// Patches a task (`PATCH /tasks/{id}`) and returns the updated entity
    async fn update_task(
        &self,
        id: &TaskId,
        payload: &Value,
        key: &IdempotencyKey,
    ) -> anyhow::Result<Value>;

    /// Uploads one media row as a multipart file part
    async fn upload_media(&self, media: &PendingMedia) -> anyhow::Result<()>;

    /// Fetches every task visible to the current user
    async fn list_tasks(&self) -> anyhow::Result<Vec<Value>>;

    /// Returns `Ok(())` if the API host answered at all
    async fn ping(&self) -> anyhow::Result<()>;
}
