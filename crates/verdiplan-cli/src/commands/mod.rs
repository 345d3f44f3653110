//! CLI subcommands and the wiring they share

pub mod auth;
pub mod capture;
pub mod cleanup;
pub mod config;
pub mod queue;
pub mod snapshots;
pub mod status;
pub mod sync;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use verdiplan_api::{token, ApiClient};
use verdiplan_cache::{DatabasePool, SqliteOfflineStore};
use verdiplan_core::config::Config;

/// Resolves the configuration file path
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(Config::default_path)
}

/// Loads the configuration
///
/// An explicitly given file must exist and parse. The default file is
/// optional; without it the defaults apply.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let path = config_path(explicit);
    if explicit.is_some() || path.exists() {
        let config =
            Config::load(&path).with_context(|| format!("Failed to load {}", path.display()))?;
        debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    } else {
        Ok(Config::default())
    }
}

/// Configuration plus the opened offline store
pub struct AppContext {
    pub config: Config,
    pub pool: DatabasePool,
    pub store: Arc<SqliteOfflineStore>,
}

impl AppContext {
    pub async fn open(explicit: Option<&Path>) -> Result<Self> {
        let config = load_config(explicit)?;
        Self::with_config(config).await
    }

    pub async fn with_config(config: Config) -> Result<Self> {
        let pool = DatabasePool::new(&config.storage.database_path)
            .await
            .context("Failed to open database")?;
        let store = Arc::new(SqliteOfflineStore::new(pool.pool().clone()));
        Ok(Self {
            config,
            pool,
            store,
        })
    }

    /// Builds the API client with the configured token source
    pub fn api(&self) -> Result<Arc<ApiClient>> {
        let tokens = Arc::from(token::from_config(&self.config.auth));
        let client = ApiClient::new(&self.config.api, tokens).context("Failed to create API client")?;
        Ok(Arc::new(client))
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

/// Parses `key=value` pairs; values that are valid JSON keep their type
pub fn parse_key_values(pairs: &[String]) -> Result<serde_json::Map<String, serde_json::Value>> {
    let mut map = serde_json::Map::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .with_context(|| format!("Expected key=value, got '{pair}'"))?;
        let key = key.trim();
        if key.is_empty() {
            anyhow::bail!("Empty key in '{pair}'");
        }
        let value = serde_json::from_str(value)
            .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
        map.insert(key.to_string(), value);
    }
    Ok(map)
}
