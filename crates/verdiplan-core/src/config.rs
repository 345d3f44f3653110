//! Configuration module for Verdiplan.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for Verdiplan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub auth: AuthConfig,
    pub storage: StorageConfig,
    pub sync: SyncConfig,
    pub gateway: GatewayConfig,
    pub logging: LoggingConfig,
}

/// Remote REST API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL every endpoint path is appended to.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

/// Token lookup settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Keyring user name under the `verdiplan` service.
    pub account: String,
    /// Environment variable that overrides the keyring when set.
    pub token_env: String,
}

/// Local store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,
}

/// Synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Failed attempts after which a queued action is parked. `0` disables parking.
    pub max_action_attempts: u32,
    /// Seconds between connectivity probes of the API host.
    pub connectivity_probe_interval: u64,
    /// Seconds between periodic refreshes of the status snapshot.
    pub status_refresh_interval: u64,
    /// Days uploaded media are kept before `cleanup` removes them.
    pub uploaded_retention_days: u32,
}

/// Network interception layer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Whether the daemon runs the local gateway server.
    pub enabled: bool,
    /// Address the gateway server listens on.
    pub listen_addr: String,
    /// Upstream origin the web app is served from. Must not be the gateway's
    /// own `listen_addr`.
    pub app_origin: String,
    /// Host whose requests always go to the network.
    pub api_host: String,
    /// Same-origin path prefix whose requests always go to the network.
    pub api_path_prefix: String,
    /// Name of the versioned precache generation.
    pub precache_name: String,
    /// Name of the runtime cache generation.
    pub runtime_cache_name: String,
    /// Paths fetched into the precache on install.
    pub static_assets: Vec<String>,
    /// Background-sync tag that surfaces the pending-photos notification.
    pub background_sync_tag: String,
    /// Icon (and badge) used for notifications.
    pub app_icon: String,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/verdiplan/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("verdiplan")
            .join("config.yaml")
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.facilitaai.com.br/verdiplan".to_string(),
            request_timeout_secs: 60,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            account: "default".to_string(),
            token_env: "VERDIPLAN_TOKEN".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("~/.local/share"))
                .join("verdiplan")
                .join("verdiplan.db"),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_action_attempts: 10,
            connectivity_probe_interval: 15,
            status_refresh_interval: 5,
            uploaded_retention_days: 30,
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_addr: "127.0.0.1:8787".to_string(),
            app_origin: "http://localhost:5173".to_string(),
            api_host: "api.facilitaai.com.br".to_string(),
            api_path_prefix: "/verdiplan".to_string(),
            precache_name: "verdiplan-v1".to_string(),
            runtime_cache_name: "verdiplan-runtime".to_string(),
            static_assets: vec![
                "/".to_string(),
                "/index.html".to_string(),
                "/logo.png".to_string(),
                "/manifest.json".to_string(),
            ],
            background_sync_tag: "sync-photos".to_string(),
            app_icon: "/logo.png".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.status_refresh_interval"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

fn positive(errors: &mut Vec<ValidationError>, field: &str, value: u64) {
    if value == 0 {
        errors.push(ValidationError {
            field: field.into(),
            message: "must be greater than 0".into(),
        });
    }
}

fn http_url(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    match url::Url::parse(value) {
        Ok(u) if matches!(u.scheme(), "http" | "https") && u.host_str().is_some() => {}
        Ok(u) => errors.push(ValidationError {
            field: field.into(),
            message: format!("unsupported URL '{value}' (scheme '{}')", u.scheme()),
        }),
        Err(e) => errors.push(ValidationError {
            field: field.into(),
            message: format!("invalid URL '{value}': {e}"),
        }),
    }
}

/// Returns true when `origin` would connect to the socket at `listen`
fn origin_targets(origin: &url::Url, listen: &SocketAddr) -> bool {
    if origin.port_or_known_default() != Some(listen.port()) {
        return false;
    }
    let origin_ip = match origin.host() {
        Some(url::Host::Domain(name)) if name.eq_ignore_ascii_case("localhost") => None,
        Some(url::Host::Domain(_)) | None => return false,
        Some(url::Host::Ipv4(ip)) => Some(IpAddr::V4(ip)),
        Some(url::Host::Ipv6(ip)) => Some(IpAddr::V6(ip)),
    };
    let listen_ip = listen.ip();
    match origin_ip {
        // localhost resolves to a loopback address
        None => listen_ip.is_loopback() || listen_ip.is_unspecified(),
        Some(ip) if listen_ip.is_unspecified() => ip.is_loopback() || ip.is_unspecified(),
        Some(ip) => ip == listen_ip,
    }
}

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- api ---
        http_url(&mut errors, "api.base_url", &self.api.base_url);
        positive(
            &mut errors,
            "api.request_timeout_secs",
            self.api.request_timeout_secs,
        );

        // --- auth ---
        if self.auth.account.trim().is_empty() {
            errors.push(ValidationError {
                field: "auth.account".into(),
                message: "must not be empty".into(),
            });
        }

        // --- storage ---
        if self.storage.database_path.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "storage.database_path".into(),
                message: "must not be empty".into(),
            });
        }

        // --- sync ---
        positive(
            &mut errors,
            "sync.connectivity_probe_interval",
            self.sync.connectivity_probe_interval,
        );
        positive(
            &mut errors,
            "sync.status_refresh_interval",
            self.sync.status_refresh_interval,
        );

        // --- gateway ---
        if self.gateway.listen_addr.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError {
                field: "gateway.listen_addr".into(),
                message: format!("not a socket address: '{}'", self.gateway.listen_addr),
            });
        }
        http_url(&mut errors, "gateway.app_origin", &self.gateway.app_origin);
        if let (Ok(listen), Ok(origin)) = (
            self.gateway.listen_addr.parse::<SocketAddr>(),
            url::Url::parse(&self.gateway.app_origin),
        ) {
            if origin_targets(&origin, &listen) {
                errors.push(ValidationError {
                    field: "gateway.app_origin".into(),
                    message: format!(
                        "points at the gateway itself ({}); use the upstream web app origin",
                        self.gateway.listen_addr
                    ),
                });
            }
        }
        if self.gateway.api_host.trim().is_empty() {
            errors.push(ValidationError {
                field: "gateway.api_host".into(),
                message: "must not be empty".into(),
            });
        }
        if !self.gateway.api_path_prefix.starts_with('/') {
            errors.push(ValidationError {
                field: "gateway.api_path_prefix".into(),
                message: "must start with '/'".into(),
            });
        }
        if self.gateway.precache_name.is_empty() || self.gateway.runtime_cache_name.is_empty() {
            errors.push(ValidationError {
                field: "gateway.precache_name".into(),
                message: "cache names must not be empty".into(),
            });
        } else if self.gateway.precache_name == self.gateway.runtime_cache_name {
            errors.push(ValidationError {
                field: "gateway.runtime_cache_name".into(),
                message: "must differ from gateway.precache_name".into(),
            });
        }
        if let Some(bad) = self
            .gateway
            .static_assets
            .iter()
            .find(|asset| !asset.starts_with('/'))
        {
            errors.push(ValidationError {
                field: "gateway.static_assets".into(),
                message: format!("asset paths must start with '/': '{bad}'"),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use verdiplan_core::config::ConfigBuilder;
/// use std::path::PathBuf;
///
/// let config = ConfigBuilder::new()
///     .api_base_url("http://127.0.0.1:3000")
///     .storage_database_path(PathBuf::from("/tmp/verdiplan.db"))
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- api ---

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api.base_url = url.into();
        self
    }

    pub fn api_request_timeout_secs(mut self, seconds: u64) -> Self {
        self.config.api.request_timeout_secs = seconds;
        self
    }

    // --- auth ---

    pub fn auth_account(mut self, account: impl Into<String>) -> Self {
        self.config.auth.account = account.into();
        self
    }

    // --- storage ---

    pub fn storage_database_path(mut self, path: PathBuf) -> Self {
        self.config.storage.database_path = path;
        self
    }

    // --- sync ---

    pub fn sync_max_action_attempts(mut self, n: u32) -> Self {
        self.config.sync.max_action_attempts = n;
        self
    }

    pub fn sync_connectivity_probe_interval(mut self, seconds: u64) -> Self {
        self.config.sync.connectivity_probe_interval = seconds;
        self
    }

    pub fn sync_status_refresh_interval(mut self, seconds: u64) -> Self {
        self.config.sync.status_refresh_interval = seconds;
        self
    }

    // --- gateway ---

    pub fn gateway_enabled(mut self, enabled: bool) -> Self {
        self.config.gateway.enabled = enabled;
        self
    }

    pub fn gateway_listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.gateway.listen_addr = addr.into();
        self
    }

    pub fn gateway_app_origin(mut self, origin: impl Into<String>) -> Self {
        self.config.gateway.app_origin = origin.into();
        self
    }

    pub fn gateway_api_host(mut self, host: impl Into<String>) -> Self {
        self.config.gateway.api_host = host.into();
        self
    }

    pub fn gateway_static_assets(mut self, assets: Vec<String>) -> Self {
        self.config.gateway.static_assets = assets;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_json(mut self, json: bool) -> Self {
        self.config.logging.json = json;
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
