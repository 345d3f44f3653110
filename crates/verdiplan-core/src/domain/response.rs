//! Cached HTTP responses
//!
//! Entries of the named cache generations used by the network interception
//! layer. A generation is identified by its `cache_name` (for example
//! `verdiplan-v1` or `verdiplan-runtime`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored response, keyed by request within a named cache generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub cache_name: String,
    /// Stable lookup key derived from the request method and URL
    pub request_key: String,
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub stored_at: DateTime<Utc>,
}

impl CachedResponse {
    /// Returns the first header value matching `name`, case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
