//! Requests and responses as seen by the interceptor

use chrono::Utc;
use reqwest::Method;
use serde_json::json;
use sha2::{Digest, Sha256};
use url::Url;

use verdiplan_core::domain::CachedResponse;

/// Message returned in the synthetic offline payload
pub const OFFLINE_MESSAGE: &str = "No internet connection";

/// An outgoing request issued by the application shell
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl GatewayRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Stable cache key: SHA-256 of the method and the URL without fragment
    pub fn cache_key(&self) -> String {
        let mut url = self.url.clone();
        url.set_fragment(None);

        let mut hasher = Sha256::new();
        hasher.update(self.method.as_str().as_bytes());
        hasher.update(b" ");
        hasher.update(url.as_str().as_bytes());
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GatewayResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl GatewayResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// The JSON payload served when an API call cannot reach the network
    ///
    /// Carries status 200 so the application shell parses it like any
    /// other API answer.
    pub fn offline() -> Self {
        let body = json!({ "error": "offline", "message": OFFLINE_MESSAGE });
        Self::new(200, body.to_string()).with_header("Content-Type", "application/json")
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Only complete, successful responses are stored
    pub fn is_cacheable(&self) -> bool {
        self.status == 200
    }

    /// Converts into an entry of the named cache generation
    pub fn to_cached(&self, cache_name: &str, request: &GatewayRequest) -> CachedResponse {
        CachedResponse {
            cache_name: cache_name.to_string(),
            request_key: request.cache_key(),
            url: request.url.to_string(),
            status: self.status,
            headers: self.headers.clone(),
            body: self.body.clone(),
            stored_at: Utc::now(),
        }
    }
}

impl From<CachedResponse> for GatewayResponse {
    fn from(cached: CachedResponse) -> Self {
        Self {
            status: cached.status,
            headers: cached.headers,
            body: cached.body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_cache_key_ignores_fragment_but_not_method() {
        let a = GatewayRequest::get(url("http://localhost:5173/logo.png"));
        let b = GatewayRequest::get(url("http://localhost:5173/logo.png#top"));
        let c = GatewayRequest::new(Method::HEAD, url("http://localhost:5173/logo.png"));

        assert_eq!(a.cache_key(), b.cache_key());
        assert_ne!(a.cache_key(), c.cache_key());
        assert_eq!(a.cache_key().len(), 64);
    }

    #[test]
    fn test_offline_payload() {
        let resp = GatewayResponse::offline();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.header("content-type"), Some("application/json"));

        let body: serde_json::Value = serde_json::from_slice(&resp.body).unwrap();
        assert_eq!(body["error"], "offline");
        assert_eq!(body["message"], OFFLINE_MESSAGE);
    }

    #[test]
    fn test_only_200_is_cacheable() {
        assert!(GatewayResponse::new(200, "ok").is_cacheable());
        assert!(!GatewayResponse::new(404, "").is_cacheable());
        assert!(!GatewayResponse::new(206, "partial").is_cacheable());
        assert!(!GatewayResponse::new(500, "oops").is_cacheable());
    }
}
