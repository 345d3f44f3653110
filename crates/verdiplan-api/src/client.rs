//! Verdiplan REST API client
//!
//! Provides a typed HTTP client for the task backend. Handles the bearer
//! header, endpoint construction, status mapping and the `Idempotency-Key`
//! header on replayed mutations.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use verdiplan_api::{ApiClient, StaticTokenSource};
//! use verdiplan_core::ports::IRemoteApi;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = ApiClient::with_base_url(
//!     "https://api.facilitaai.com.br/verdiplan",
//!     Arc::new(StaticTokenSource::new("token")),
//! );
//! let tasks = client.list_tasks().await?;
//! println!("{} tasks", tasks.len());
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde_json::Value;
use tracing::{debug, trace, warn};

use verdiplan_core::config::ApiConfig;
use verdiplan_core::domain::{IdempotencyKey, PendingMedia, TaskId};
use verdiplan_core::ports::IRemoteApi;

use crate::token::TokenSource;
use crate::ApiError;

/// Header carrying the per-item idempotency key
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// Multipart field name the upload endpoint expects
const UPLOAD_FIELD: &str = "photos";

// ============================================================================
// ApiClient
// ============================================================================

/// HTTP client for the Verdiplan API
///
/// Wraps `reqwest::Client` with authentication headers and base URL
/// construction.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    tokens: Arc<dyn TokenSource>,
}

impl ApiClient {
    /// Creates a client from configuration
    ///
    /// The configured request timeout applies to every call, uploads
    /// included.
    pub fn new(config: &ApiConfig, tokens: Arc<dyn TokenSource>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("verdiplan/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            tokens,
        })
    }

    /// Creates a client with a custom base URL and default settings
    /// (useful for testing)
    pub fn with_base_url(base_url: impl Into<String>, tokens: Arc<dyn TokenSource>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
        }
    }

    /// Returns the base URL for API requests
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Creates an authenticated request builder for the given method and path
    ///
    /// Prepends the base URL and adds the Authorization header when a token
    /// is available. Without a token the request is still sent and the
    /// server decides.
    pub fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.client.request(method, &url);

        match self.tokens.token().context("Failed to read API token")? {
            Some(token) => Ok(builder.bearer_auth(token)),
            None => {
                debug!(url = %url, "No API token available, sending unauthenticated request");
                Ok(builder)
            }
        }
    }

    /// Sends a request and maps non-success statuses to [`ApiError`]
    async fn send(&self, builder: RequestBuilder, what: &str) -> Result<Response> {
        let response = builder.send().await.map_err(|e| {
            let err = ApiError::from(e);
            warn!(request = what, transient = err.is_transient(), error = %err, "Request failed");
            err
        })?;

        let status = response.status();
        if status.is_success() {
            trace!(request = what, status = status.as_u16(), "Request succeeded");
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.unwrap_or_default();
        let err = ApiError::from_status(status, retry_after.as_deref(), body);
        warn!(request = what, status = status.as_u16(), transient = err.is_transient(), "Request rejected");
        Err(err.into())
    }

    /// Reads a JSON body, treating an empty body as `null`
    async fn json_body(response: Response) -> Result<Value> {
        let bytes = response.bytes().await.map_err(ApiError::from)?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes)
            .map_err(|e| ApiError::InvalidResponse(format!("Body is not JSON: {e}")).into())
    }
}

// ============================================================================
// IRemoteApi implementation
// ============================================================================

#[async_trait::async_trait]
impl IRemoteApi for ApiClient {
    async fn create_task(&self, payload: &Value, key: &IdempotencyKey) -> Result<Value> {
        debug!(key = %key, "POST /tasks");
        let builder = self
            .request(Method::POST, "/tasks")?
            .header(IDEMPOTENCY_KEY_HEADER, key.to_string())
            .json(payload);
        let response = self.send(builder, "create_task").await?;
        Self::json_body(response).await
    }

    async fn update_task(&self, id: &TaskId, payload: &Value, key: &IdempotencyKey) -> Result<Value> {
        let path = format!("/tasks/{}", id.as_str());
        debug!(task_id = %id, key = %key, "PATCH {}", path);
        let builder = self
            .request(Method::PATCH, &path)?
            .header(IDEMPOTENCY_KEY_HEADER, key.to_string())
            .json(payload);
        let response = self.send(builder, "update_task").await?;
        Self::json_body(response).await
    }

    async fn upload_media(&self, media: &PendingMedia) -> Result<()> {
        let path = format!("/tasks/{}/photos", media.task_id.as_str());
        debug!(media_id = %media.id, task_id = %media.task_id, bytes = media.byte_size, "Uploading media");

        let part = Part::bytes(media.content.clone())
            .file_name(media.filename.clone())
            .mime_str(&media.mime_type)
            .map_err(|e| {
                ApiError::InvalidRequest(format!("Invalid MIME type '{}': {e}", media.mime_type))
            })?;
        let form = Form::new().part(UPLOAD_FIELD, part);

        let builder = self.request(Method::POST, &path)?.multipart(form);
        self.send(builder, "upload_media").await?;
        Ok(())
    }

    async fn list_tasks(&self) -> Result<Vec<Value>> {
        let builder = self.request(Method::GET, "/tasks")?;
        let response = self.send(builder, "list_tasks").await?;
        match Self::json_body(response).await? {
            Value::Array(tasks) => {
                debug!(count = tasks.len(), "Fetched task list");
                Ok(tasks)
            }
            other => Err(ApiError::InvalidResponse(format!(
                "expected a JSON array from GET /tasks, got {}",
                type_name(&other)
            ))
            .into()),
        }
    }

    async fn ping(&self) -> Result<()> {
        // Any HTTP answer means the host is reachable
        let response = self
            .request(Method::GET, "/health")?
            .send()
            .await
            .map_err(ApiError::from)?;
        trace!(status = response.status().as_u16(), "API host reachable");
        Ok(())
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
