//! Network interceptor
//!
//! Mediates every request of the application shell and owns the cache
//! generations:
//!
//! - **install** precaches the static assets (all or nothing)
//! - **activate** drops every generation that is not current and claims
//!   the clients
//! - **fetch** dispatches by [`Route`]
//!
//! It also turns background-sync, push and notification-click signals
//! into local notifications and window launches.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use url::Url;

use verdiplan_core::config::GatewayConfig;
use verdiplan_core::ports::{IClientLauncher, INotificationService, IResponseCache, Notification};

use crate::request::{GatewayRequest, GatewayResponse};
use crate::router::{Route, Router};
use crate::transport::Transport;
use crate::GatewayError;

const APP_NAME: &str = "Verdiplan";
const DEFAULT_PUSH_BODY: &str = "New notification";
const SYNC_NOTICE_BODY: &str = "Syncing pending photos...";

pub struct Interceptor {
    config: GatewayConfig,
    app_origin: Url,
    router: Router,
    cache: Arc<dyn IResponseCache>,
    transport: Arc<dyn Transport>,
    notifier: Arc<dyn INotificationService>,
    launcher: Arc<dyn IClientLauncher>,
    claimed: AtomicBool,
}

impl Interceptor {
    pub fn new(
        config: GatewayConfig,
        cache: Arc<dyn IResponseCache>,
        transport: Arc<dyn Transport>,
        notifier: Arc<dyn INotificationService>,
        launcher: Arc<dyn IClientLauncher>,
    ) -> Result<Self, GatewayError> {
        let app_origin = Url::parse(&config.app_origin).map_err(|e| {
            GatewayError::InvalidConfig(format!("app_origin '{}': {e}", config.app_origin))
        })?;
        let router = Router::new(&config)?;

        Ok(Self {
            config,
            app_origin,
            router,
            cache,
            transport,
            notifier,
            launcher,
            claimed: AtomicBool::new(false),
        })
    }

    pub fn app_origin(&self) -> &Url {
        &self.app_origin
    }

    pub fn route(&self, url: &Url) -> Route {
        self.router.route(url)
    }

    /// Returns true once [`activate`](Self::activate) has claimed the clients
    pub fn is_controlling(&self) -> bool {
        self.claimed.load(Ordering::Acquire)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Fetches every static asset into the precache generation
    ///
    /// Nothing is stored unless every asset was fetched with a success
    /// status. Returns the number of assets stored.
    #[tracing::instrument(skip(self), fields(cache = %self.config.precache_name))]
    pub async fn install(&self) -> Result<usize, GatewayError> {
        let precache = &self.config.precache_name;
        let mut entries = Vec::with_capacity(self.config.static_assets.len());

        for asset in &self.config.static_assets {
            let url = self
                .app_origin
                .join(asset)
                .map_err(|e| GatewayError::InstallFailed {
                    url: asset.clone(),
                    reason: e.to_string(),
                })?;
            let request = GatewayRequest::get(url);

            let response = self.transport.fetch(&request).await.map_err(|e| {
                GatewayError::InstallFailed {
                    url: request.url.to_string(),
                    reason: format!("{e:#}"),
                }
            })?;
            if !(200..300).contains(&response.status) {
                return Err(GatewayError::InstallFailed {
                    url: request.url.to_string(),
                    reason: format!("HTTP {}", response.status),
                });
            }

            debug!(url = %request.url, "Asset fetched for precache");
            entries.push(response.to_cached(precache, &request));
        }

        for entry in &entries {
            if let Err(e) = self.cache.put(entry).await {
                // Leave no half-filled generation behind
                if let Err(cleanup) = self.cache.delete_cache(precache).await {
                    warn!(error = %cleanup, "Failed to discard partial precache");
                }
                return Err(GatewayError::Cache(format!("{e:#}")));
            }
        }

        info!(count = entries.len(), "Static assets precached");
        Ok(entries.len())
    }

    /// Deletes stale cache generations and claims the clients
    ///
    /// Returns the names of the deleted generations.
    pub async fn activate(&self) -> Result<Vec<String>, GatewayError> {
        let current: HashSet<&str> = [
            self.config.precache_name.as_str(),
            self.config.runtime_cache_name.as_str(),
        ]
        .into_iter()
        .collect();

        let names = self
            .cache
            .cache_names()
            .await
            .map_err(|e| GatewayError::Cache(format!("{e:#}")))?;

        let mut deleted = Vec::new();
        for name in names.into_iter().filter(|n| !current.contains(n.as_str())) {
            info!(cache = %name, "Removing stale cache generation");
            self.cache
                .delete_cache(&name)
                .await
                .map_err(|e| GatewayError::Cache(format!("{e:#}")))?;
            deleted.push(name);
        }

        self.claimed.store(true, Ordering::Release);
        info!(removed = deleted.len(), "Gateway activated");
        Ok(deleted)
    }

    // ========================================================================
    // Fetch
    // ========================================================================

    /// Answers an intercepted request
    ///
    /// Returns `None` for requests that are not intercepted; the caller
    /// forwards those untouched.
    pub async fn fetch(
        &self,
        request: &GatewayRequest,
    ) -> Result<Option<GatewayResponse>, GatewayError> {
        match self.router.route(&request.url) {
            Route::Passthrough => Ok(None),
            Route::NetworkOnly => Ok(Some(self.network_only(request).await)),
            Route::CacheFirst => self.cache_first(request).await.map(Some),
        }
    }

    /// Sends a request to the network without interpretation
    ///
    /// A `GatewayError` raised by the transport is returned as is; any
    /// other failure becomes `GatewayError::Transport`.
    pub async fn forward(&self, request: &GatewayRequest) -> Result<GatewayResponse, GatewayError> {
        self.transport
            .fetch(request)
            .await
            .map_err(|e| match e.downcast::<GatewayError>() {
                Ok(gateway_error) => gateway_error,
                Err(other) => GatewayError::Transport(format!("{other:#}")),
            })
    }

    async fn network_only(&self, request: &GatewayRequest) -> GatewayResponse {
        match self.transport.fetch(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(url = %request.url, error = %format!("{e:#}"), "API unreachable, serving offline payload");
                GatewayResponse::offline()
            }
        }
    }

    async fn cache_first(&self, request: &GatewayRequest) -> Result<GatewayResponse, GatewayError> {
        let is_get = request.method == Method::GET;

        if is_get {
            match self.cache.match_request(&request.cache_key()).await {
                Ok(Some(cached)) => {
                    debug!(url = %request.url, cache = %cached.cache_name, "Cache hit");
                    return Ok(cached.into());
                }
                Ok(None) => debug!(url = %request.url, "Cache miss"),
                Err(e) => warn!(url = %request.url, error = %format!("{e:#}"), "Cache lookup failed"),
            }
        }

        let response = self.forward(request).await?;

        if is_get && response.is_cacheable() {
            let entry = response.to_cached(&self.config.runtime_cache_name, request);
            if let Err(e) = self.cache.put(&entry).await {
                warn!(url = %request.url, error = %format!("{e:#}"), "Failed to store runtime cache entry");
            }
        }

        Ok(response)
    }

    // ========================================================================
    // Background sync, push, notification click
    // ========================================================================

    /// Handles a background-sync signal
    ///
    /// Only the configured tag surfaces a notification. Returns whether the
    /// tag was recognised.
    pub async fn handle_sync(&self, tag: &str) -> Result<bool> {
        info!(tag, "Background sync");
        if tag != self.config.background_sync_tag {
            return Ok(false);
        }

        let mut notice = Notification::sync(APP_NAME, SYNC_NOTICE_BODY);
        notice.icon = Some(self.config.app_icon.clone());
        self.notifier.notify(&notice).await?;
        Ok(true)
    }

    /// Shows the notification described by a push payload
    ///
    /// An absent or empty payload yields the default notification.
    pub async fn handle_push(&self, payload: Option<&[u8]>) -> Result<Notification> {
        let data: Value = match payload {
            Some(bytes) if !bytes.is_empty() => serde_json::from_slice(bytes)
                .map_err(|e| GatewayError::InvalidPayload(e.to_string()))?,
            _ => json!({}),
        };

        let text = |key: &str| {
            data.get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let title = text("title").unwrap_or_else(|| APP_NAME.to_string());
        let body = text("body").unwrap_or_else(|| DEFAULT_PUSH_BODY.to_string());
        let extra = match data.get("data") {
            Some(v) if !v.is_null() => v.clone(),
            _ => json!({}),
        };

        let notification = Notification::push(title, body)
            .with_icon(self.config.app_icon.clone())
            .with_data(extra);
        self.notifier.notify(&notification).await?;
        Ok(notification)
    }

    /// Opens the application at the notification's target
    ///
    /// The target is `data.url` resolved against the app origin, or the
    /// app root. Returns the URL that was opened.
    pub async fn handle_notification_click(&self, notification: &Notification) -> Result<String> {
        let target = notification
            .target_url()
            .filter(|s| !s.is_empty())
            .unwrap_or("/");
        let url = self
            .app_origin
            .join(target)
            .map_err(|e| GatewayError::InvalidPayload(format!("url '{target}': {e}")))?;

        self.launcher.open_window(url.as_str()).await?;
        Ok(url.to_string())
    }
}
