//! Request routing
//!
//! ```text
//! other origin, not the API host ──► Passthrough
//! API host, or app path under the API prefix ──► NetworkOnly
//! everything else on the app origin ──► CacheFirst
//! ```

use url::{Origin, Url};

use verdiplan_core::config::GatewayConfig;

use crate::GatewayError;

/// How a request is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Not intercepted; forwarded untouched
    Passthrough,
    /// Always sent to the network; failures become the offline payload
    NetworkOnly,
    /// Served from the cache when present, stored after a good fetch
    CacheFirst,
}

#[derive(Debug, Clone)]
pub struct Router {
    app_origin: Origin,
    api_host: String,
    api_path_prefix: String,
}

impl Router {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let app_url = Url::parse(&config.app_origin).map_err(|e| {
            GatewayError::InvalidConfig(format!("app_origin '{}': {e}", config.app_origin))
        })?;

        Ok(Self {
            app_origin: app_url.origin(),
            api_host: config.api_host.to_ascii_lowercase(),
            api_path_prefix: config.api_path_prefix.trim_end_matches('/').to_string(),
        })
    }

    pub fn route(&self, url: &Url) -> Route {
        let is_api_host = url
            .host_str()
            .is_some_and(|host| host.eq_ignore_ascii_case(&self.api_host));
        if is_api_host {
            return Route::NetworkOnly;
        }

        if url.origin() != self.app_origin {
            return Route::Passthrough;
        }

        if self.is_api_path(url.path()) {
            Route::NetworkOnly
        } else {
            Route::CacheFirst
        }
    }

    fn is_api_path(&self, path: &str) -> bool {
        if self.api_path_prefix.is_empty() {
            return false;
        }
        match path.strip_prefix(&self.api_path_prefix) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}
