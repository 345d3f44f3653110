//! Verdiplan API - REST client for the task backend
//!
//! Provides an async client for:
//! - Creating and updating tasks replayed from the offline queue
//! - Uploading captured photos as multipart form data
//! - Listing tasks to refresh the local snapshot cache
//! - Probing reachability of the API host
//!
//! ## Modules
//!
//! - [`client`] - HTTP client implementing the `IRemoteApi` port
//! - [`token`] - Bearer token sources (system keyring, static value)

pub mod client;
pub mod token;

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

pub use client::ApiClient;
pub use token::{KeyringTokenSource, StaticTokenSource, TokenSource};

/// Errors that can occur when communicating with the Verdiplan API
#[derive(Debug, Error)]
pub enum ApiError {
    /// Authentication credentials are invalid or expired
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Insufficient permissions for the requested operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The server rejected the request as conflicting with current state
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Rate limit exceeded; retry after the specified duration
    #[error("Too many requests, retry after {retry_after:?}")]
    TooManyRequests {
        /// Duration to wait before retrying
        retry_after: Duration,
    },

    /// Any other 4xx response
    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// A server-side error occurred (5xx)
    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// A network-level error occurred
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The API response could not be parsed or was malformed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The request could not be built from local data; nothing was sent
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Default retry-after duration when the header is missing
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(30);

impl ApiError {
    /// Maps a non-success HTTP status and its body to an error
    pub fn from_status(status: StatusCode, retry_after: Option<&str>, body: String) -> Self {
        let message = if body.is_empty() {
            status
                .canonical_reason()
                .unwrap_or("no message")
                .to_string()
        } else {
            body
        };

        match status {
            StatusCode::UNAUTHORIZED => ApiError::Unauthorized(message),
            StatusCode::FORBIDDEN => ApiError::Forbidden(message),
            StatusCode::NOT_FOUND => ApiError::NotFound(message),
            StatusCode::CONFLICT => ApiError::Conflict(message),
            StatusCode::TOO_MANY_REQUESTS => ApiError::TooManyRequests {
                retry_after: retry_after
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .map(Duration::from_secs)
                    .unwrap_or(DEFAULT_RETRY_AFTER),
            },
            s if s.is_server_error() => ApiError::ServerError {
                status: s.as_u16(),
                message,
            },
            s => ApiError::Rejected {
                status: s.as_u16(),
                message,
            },
        }
    }

    /// Returns true if a later attempt of the same request may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ApiError::TooManyRequests { .. } | ApiError::ServerError { .. } | ApiError::NetworkError(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_mapping() {
        assert!(matches!(
            ApiError::from_status(StatusCode::UNAUTHORIZED, None, String::new()),
            ApiError::Unauthorized(m) if m == "Unauthorized"
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::NOT_FOUND, None, "no task".into()),
            ApiError::NotFound(m) if m == "no task"
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::UNPROCESSABLE_ENTITY, None, "bad".into()),
            ApiError::Rejected { status: 422, .. }
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::BAD_GATEWAY, None, String::new()),
            ApiError::ServerError { status: 502, .. }
        ));
    }

    #[test]
    fn test_retry_after_parsing() {
        match ApiError::from_status(StatusCode::TOO_MANY_REQUESTS, Some("12"), String::new()) {
            ApiError::TooManyRequests { retry_after } => {
                assert_eq!(retry_after, Duration::from_secs(12))
            }
            other => panic!("unexpected {other:?}"),
        }
        match ApiError::from_status(StatusCode::TOO_MANY_REQUESTS, Some("soon"), String::new()) {
            ApiError::TooManyRequests { retry_after } => {
                assert_eq!(retry_after, DEFAULT_RETRY_AFTER)
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_is_transient() {
        assert!(ApiError::from_status(StatusCode::SERVICE_UNAVAILABLE, None, String::new())
            .is_transient());
        assert!(!ApiError::from_status(StatusCode::FORBIDDEN, None, String::new()).is_transient());
    }
}
