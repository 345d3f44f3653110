//! Shared test helpers for API integration tests

use std::sync::Arc;

use chrono::Utc;
use wiremock::MockServer;

use verdiplan_api::{ApiClient, StaticTokenSource};
use verdiplan_core::domain::{MediaId, MediaMetadata, PendingMedia, TaskId};

pub const TEST_TOKEN: &str = "test-access-token";

/// Starts a mock server and returns a client pointing at it
pub async fn setup_api_mock() -> (MockServer, ApiClient) {
    let server = MockServer::start().await;
    let client = ApiClient::with_base_url(
        server.uri(),
        Arc::new(StaticTokenSource::new(TEST_TOKEN)),
    );
    (server, client)
}

/// Builds an in-memory pending media row
pub fn pending_photo(task_id: &str, filename: &str, content: &[u8]) -> PendingMedia {
    PendingMedia {
        id: MediaId::new(1),
        task_id: TaskId::new(task_id).unwrap(),
        content: content.to_vec(),
        filename: filename.to_string(),
        mime_type: "image/jpeg".to_string(),
        byte_size: content.len() as u64,
        captured_at: Utc::now(),
        uploaded: false,
        uploaded_at: None,
        metadata: MediaMetadata::new(),
    }
}
