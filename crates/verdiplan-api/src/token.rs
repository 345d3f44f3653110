//! Bearer token sources
//!
//! Tokens are issued by the login flow of the application shell and are
//! only read here, never refreshed.

use anyhow::{Context, Result};
use tracing::{debug, info};

use verdiplan_core::config::AuthConfig;

/// Keyring service name used for every Verdiplan credential
pub const KEYRING_SERVICE: &str = "verdiplan";

/// Supplies the bearer token attached to API requests
pub trait TokenSource: Send + Sync {
    /// Returns the current token, or `None` when no one is logged in
    fn token(&self) -> Result<Option<String>>;
}

// ============================================================================
// KeyringTokenSource
// ============================================================================

/// Reads the token from the system keyring
///
/// Uses the `keyring` crate to reach the OS credential store (e.g., GNOME
/// Keyring, KDE Wallet, macOS Keychain). The entry lives under the service
/// "verdiplan" with the configured account as the username.
pub struct KeyringTokenSource {
    account: String,
}

impl KeyringTokenSource {
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
        }
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    /// Stores a token for the account
    pub fn store(&self, token: &str) -> Result<()> {
        let entry = keyring::Entry::new(KEYRING_SERVICE, &self.account)
            .context("Failed to create keyring entry")?;

        entry
            .set_password(token)
            .context("Failed to store token in keyring")?;

        debug!(account = %self.account, "Stored token in keyring");
        Ok(())
    }

    /// Removes the stored token; a missing entry is not an error
    pub fn clear(&self) -> Result<()> {
        let entry = keyring::Entry::new(KEYRING_SERVICE, &self.account)
            .context("Failed to create keyring entry")?;

        match entry.delete_credential() {
            Ok(()) => {
                info!(account = %self.account, "Cleared token from keyring");
                Ok(())
            }
            Err(keyring::Error::NoEntry) => {
                debug!(account = %self.account, "No token to clear");
                Ok(())
            }
            Err(e) => Err(anyhow::Error::new(e).context("Failed to delete from keyring")),
        }
    }
}

impl TokenSource for KeyringTokenSource {
    fn token(&self) -> Result<Option<String>> {
        let entry = keyring::Entry::new(KEYRING_SERVICE, &self.account)
            .context("Failed to create keyring entry")?;

        match entry.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => {
                debug!(account = %self.account, "No token found in keyring");
                Ok(None)
            }
            Err(e) => Err(anyhow::Error::new(e).context("Failed to read from keyring")),
        }
    }
}

// ============================================================================
// StaticTokenSource
// ============================================================================

/// A fixed token, used in tests and for the environment override
#[derive(Debug, Clone, Default)]
pub struct StaticTokenSource {
    token: Option<String>,
}

impl StaticTokenSource {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    /// A source that never yields a token
    pub fn none() -> Self {
        Self { token: None }
    }
}

impl TokenSource for StaticTokenSource {
    fn token(&self) -> Result<Option<String>> {
        Ok(self.token.clone())
    }
}

/// Picks the token source for the given auth settings
///
/// A non-empty value in the `auth.token_env` environment variable wins over
/// the keyring.
pub fn from_config(auth: &AuthConfig) -> Box<dyn TokenSource> {
    match std::env::var(&auth.token_env) {
        Ok(token) if !token.trim().is_empty() => {
            debug!(var = %auth.token_env, "Using token from environment");
            Box::new(StaticTokenSource::new(token.trim()))
        }
        _ => Box::new(KeyringTokenSource::new(auth.account.clone())),
    }
}
