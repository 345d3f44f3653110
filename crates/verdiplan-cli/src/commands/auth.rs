//! Auth commands - Manage the API bearer token
//!
//! Provides the `verdiplan auth` CLI subcommands which:
//! 1. `login`  - Stores a token issued by the application shell in the
//!    system keyring under the configured account.
//! 2. `logout` - Clears the token from the keyring.
//! 3. `status` - Shows where the token comes from and, with `--check`,
//!    whether the API accepts it.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Subcommand;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use verdiplan_api::{KeyringTokenSource, TokenSource};
use verdiplan_core::config::AuthConfig;
use verdiplan_core::ports::IRemoteApi;

use super::{load_config, AppContext};
use crate::output::{get_formatter, OutputFormat, OutputFormatter};

#[derive(Debug, Subcommand)]
pub enum AuthCommand {
    /// Store a bearer token in the system keyring
    Login {
        /// Token value; read from stdin when omitted
        #[arg(long)]
        token: Option<String>,
    },
    /// Remove the stored token
    Logout,
    /// Show which token is in use
    Status {
        /// Also call the API to check the token is accepted
        #[arg(long)]
        check: bool,
    },
}

/// Where the active token comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenOrigin {
    Environment,
    Keyring,
    Missing,
}

impl TokenOrigin {
    fn as_str(self) -> &'static str {
        match self {
            TokenOrigin::Environment => "environment",
            TokenOrigin::Keyring => "keyring",
            TokenOrigin::Missing => "none",
        }
    }
}

impl AuthCommand {
    pub async fn execute(&self, config: Option<&Path>, format: OutputFormat) -> Result<()> {
        let fmt = get_formatter(format);
        match self {
            AuthCommand::Login { token } => {
                let auth = load_config(config)?.auth;
                execute_login(&auth, token.clone(), format, &*fmt).await
            }
            AuthCommand::Logout => {
                let auth = load_config(config)?.auth;
                let source = KeyringTokenSource::new(auth.account.clone());
                source.clear()?;
                if format.is_json() {
                    fmt.print_json(&json!({ "account": auth.account, "logged_out": true }));
                } else {
                    fmt.success(&format!("Removed stored token for '{}'", auth.account));
                    if env_token(&auth).is_some() {
                        fmt.warn(&format!(
                            "{} is still set and will keep being used",
                            auth.token_env
                        ));
                    }
                }
                Ok(())
            }
            AuthCommand::Status { check } => execute_status(config, *check, format, &*fmt).await,
        }
    }
}

async fn execute_login(
    auth: &AuthConfig,
    token: Option<String>,
    format: OutputFormat,
    fmt: &dyn OutputFormatter,
) -> Result<()> {
    let token = match token {
        Some(token) => token,
        None => {
            if !format.is_json() {
                fmt.info("Paste the token and press Enter:");
            }
            let mut line = String::new();
            BufReader::new(tokio::io::stdin())
                .read_line(&mut line)
                .await
                .context("Failed to read token from stdin")?;
            line
        }
    };
    let token = token.trim();
    if token.is_empty() {
        anyhow::bail!("The token is empty");
    }

    let source = KeyringTokenSource::new(auth.account.clone());
    source.store(token)?;
    info!(account = %auth.account, "Token stored");

    if format.is_json() {
        fmt.print_json(&json!({ "account": auth.account, "stored": true }));
    } else {
        fmt.success(&format!("Token stored for '{}'", auth.account));
    }
    Ok(())
}

async fn execute_status(
    config: Option<&Path>,
    check: bool,
    format: OutputFormat,
    fmt: &dyn OutputFormatter,
) -> Result<()> {
    let auth = load_config(config)?.auth;
    let origin = token_origin(&auth)?;

    let accepted = if check && origin != TokenOrigin::Missing {
        let ctx = AppContext::open(config).await?;
        let result = ctx.api()?.ping().await;
        ctx.close().await;
        Some(result.map_err(|e| e.to_string()))
    } else {
        None
    };

    if format.is_json() {
        fmt.print_json(&json!({
            "account": auth.account,
            "token_source": origin.as_str(),
            "api_reachable": accepted.as_ref().map(Result::is_ok),
            "error": accepted.as_ref().and_then(|r| r.as_ref().err()),
        }));
        return Ok(());
    }

    fmt.field("Account", &auth.account);
    match origin {
        TokenOrigin::Environment => fmt.field("Token", &format!("from ${}", auth.token_env)),
        TokenOrigin::Keyring => fmt.field("Token", "stored in keyring"),
        TokenOrigin::Missing => {
            fmt.warn("No token configured. Run 'verdiplan auth login'.");
            return Ok(());
        }
    }
    match accepted {
        Some(Ok(())) => fmt.success("API accepted the token"),
        Some(Err(e)) => fmt.error(&format!("API check failed: {e}")),
        None => {}
    }
    Ok(())
}

fn env_token(auth: &AuthConfig) -> Option<String> {
    std::env::var(&auth.token_env)
        .ok()
        .filter(|t| !t.trim().is_empty())
}

fn token_origin(auth: &AuthConfig) -> Result<TokenOrigin> {
    if env_token(auth).is_some() {
        return Ok(TokenOrigin::Environment);
    }
    let stored = KeyringTokenSource::new(auth.account.clone()).token()?;
    Ok(if stored.is_some() {
        TokenOrigin::Keyring
    } else {
        TokenOrigin::Missing
    })
}
