//! Verdiplan Daemon - Background synchronization service
//!
//! This binary runs next to the application shell and handles:
//! - Draining the offline queue whenever the API host becomes reachable
//! - Publishing the user-facing sync status
//! - The local gateway that intercepts the shell's network traffic
//! - Graceful shutdown on SIGTERM/SIGINT
//!
//! # Architecture
//!
//! The daemon builds every component once and hands them out as `Arc`s.
//! The connectivity probe, the status aggregator and the gateway server
//! run as tasks controlled by a shared `CancellationToken` that is
//! triggered on receipt of SIGTERM or SIGINT.

mod platform;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use verdiplan_api::{token, ApiClient};
use verdiplan_cache::{DatabasePool, SqliteOfflineStore, SqliteResponseCache};
use verdiplan_core::config::{Config, LoggingConfig};
use verdiplan_core::ports::IRemoteApi;
use verdiplan_gateway::{GatewayServer, Interceptor, ReqwestTransport};
use verdiplan_sync::{ConnectivityMonitor, ConnectivityState, StatusAggregator, SyncQueueManager};

use crate::platform::{BrowserLauncher, LogNotifier};

// ============================================================================
// DaemonService
// ============================================================================

/// Owns every long-lived component of the daemon
struct DaemonService {
    config: Config,
    db_pool: DatabasePool,
    api: Arc<dyn IRemoteApi>,
    monitor: Arc<ConnectivityMonitor>,
    aggregator: Arc<StatusAggregator>,
    shutdown: CancellationToken,
}

impl DaemonService {
    /// Opens the store and wires the sync components together
    async fn new(config: Config, shutdown: CancellationToken) -> Result<Self> {
        let db_pool = DatabasePool::new(&config.storage.database_path)
            .await
            .context("Failed to open database")?;
        let store = Arc::new(SqliteOfflineStore::new(db_pool.pool().clone()));

        let tokens = Arc::from(token::from_config(&config.auth));
        let api: Arc<dyn IRemoteApi> = Arc::new(
            ApiClient::new(&config.api, tokens).context("Failed to create API client")?,
        );

        // Offline until the first probe says otherwise, so the first
        // successful probe triggers a pass
        let manager = Arc::new(SyncQueueManager::new(
            store,
            Arc::clone(&api),
            ConnectivityState::new(false),
            config.sync.max_action_attempts,
        ));
        let monitor = Arc::new(ConnectivityMonitor::new(Arc::clone(&manager)));
        let aggregator = Arc::new(StatusAggregator::new(manager));

        Ok(Self {
            config,
            db_pool,
            api,
            monitor,
            aggregator,
            shutdown,
        })
    }

    /// Runs until the shutdown token is cancelled
    async fn run(&self) -> Result<()> {
        let mut tasks: Vec<JoinHandle<()>> = Vec::new();

        tasks.push(self.spawn_probe());
        tasks.push(self.spawn_aggregator());
        tasks.push(self.spawn_status_logger());

        if self.config.gateway.enabled {
            match self.start_gateway().await {
                Ok((handle, _)) => tasks.push(handle),
                Err(e) => error!(error = %format!("{e:#}"), "Gateway not started"),
            }
        } else {
            info!("Gateway disabled by configuration");
        }

        self.shutdown.cancelled().await;
        info!("Shutdown signal received, stopping tasks");

        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Task ended abnormally");
            }
        }

        self.db_pool.close().await;
        Ok(())
    }

    fn spawn_probe(&self) -> JoinHandle<()> {
        let monitor = Arc::clone(&self.monitor);
        let api = Arc::clone(&self.api);
        let interval = Duration::from_secs(self.config.sync.connectivity_probe_interval);
        let cancel = self.shutdown.child_token();

        tokio::spawn(async move { monitor.run_probe(api, interval, cancel).await })
    }

    fn spawn_aggregator(&self) -> JoinHandle<()> {
        let aggregator = Arc::clone(&self.aggregator);
        let monitor = Arc::clone(&self.monitor);
        let interval = Duration::from_secs(self.config.sync.status_refresh_interval);
        let cancel = self.shutdown.child_token();

        tokio::spawn(async move { aggregator.run(&monitor, interval, cancel).await })
    }

    /// Logs every change of the user-facing status
    fn spawn_status_logger(&self) -> JoinHandle<()> {
        let mut status_rx = self.aggregator.subscribe();
        let cancel = self.shutdown.child_token();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    changed = status_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let status = status_rx.borrow_and_update().clone();
                        info!(
                            pending = status.pending_count,
                            syncing = status.syncing,
                            online = status.online,
                            last_sync = ?status.last_sync,
                            "Sync status"
                        );
                    }
                }
            }
        })
    }

    /// Installs and activates the interceptor, then serves it
    ///
    /// Returns the server task and the bound address.
    async fn start_gateway(&self) -> Result<(JoinHandle<()>, SocketAddr)> {
        let cache = Arc::new(SqliteResponseCache::new(self.db_pool.pool().clone()));
        let transport = Arc::new(ReqwestTransport::new(Duration::from_secs(
            self.config.api.request_timeout_secs,
        ))?);

        let interceptor = Arc::new(Interceptor::new(
            self.config.gateway.clone(),
            cache,
            transport,
            Arc::new(LogNotifier),
            Arc::new(BrowserLauncher),
        )?);

        interceptor
            .install()
            .await
            .context("Failed to precache static assets")?;
        interceptor
            .activate()
            .await
            .context("Failed to activate gateway")?;

        let server = GatewayServer::new(interceptor, &self.config.gateway.listen_addr)?;
        let listener = server.bind().await.context("Failed to bind gateway")?;
        let addr = listener.local_addr()?;
        let cancel = self.shutdown.child_token();

        let handle = tokio::spawn(async move {
            if let Err(e) = server.serve(listener, cancel).await {
                error!(error = %format!("{e:#}"), "Gateway server failed");
            }
        });
        Ok((handle, addr))
    }
}

// ============================================================================
// Configuration and logging
// ============================================================================

/// Loads the configuration file if it exists, the defaults otherwise
fn load_config() -> Result<Config> {
    let path = Config::default_path();
    let config = if path.exists() {
        Config::load(&path).with_context(|| format!("Failed to load {}", path.display()))?
    } else {
        Config::default()
    };

    let errors = config.validate();
    if !errors.is_empty() {
        let list: Vec<String> = errors.iter().map(ToString::to_string).collect();
        anyhow::bail!("Invalid configuration in {}: {}", path.display(), list.join("; "));
    }
    Ok(config)
}

/// Initialises tracing; `RUST_LOG` overrides `logging.level`
fn init_tracing(logging: &LoggingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}

// ============================================================================
// Graceful shutdown signal handler
// ============================================================================

/// Waits for SIGTERM or SIGINT and triggers the cancellation token
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

// ============================================================================
// Main entry point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config()?;
    init_tracing(&config.logging);

    info!(
        api = %config.api.base_url,
        database = %config.storage.database_path.display(),
        "Verdiplan daemon starting (verdipland)"
    );

    let shutdown_token = CancellationToken::new();

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let service = DaemonService::new(config, shutdown_token.clone()).await?;

    let result = service.run().await;

    match &result {
        Ok(()) => info!("Verdiplan daemon shut down gracefully"),
        Err(e) => error!(error = %e, "Verdiplan daemon exiting with error"),
    }

    result
}

// ============================================================================
// Tests
// ============================================================================
