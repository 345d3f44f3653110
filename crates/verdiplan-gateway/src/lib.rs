//! Verdiplan Gateway - Network interception layer
//!
//! Provides:
//! - `Router`: decides per URL whether a request is intercepted and how
//! - `Interceptor`: cache-first and network-only strategies, cache
//!   generation lifecycle, background-sync / push / notification-click
//!   handling
//! - `ReqwestTransport`: the network side of the interceptor
//! - `GatewayServer`: local HTTP/1 proxy answering through the interceptor

pub mod interceptor;
pub mod request;
pub mod router;
pub mod server;
pub mod transport;

pub use interceptor::Interceptor;
pub use request::{GatewayRequest, GatewayResponse};
pub use router::{Route, Router};
pub use server::GatewayServer;
pub use transport::{ReqwestTransport, Transport};

use thiserror::Error;

/// Errors raised by the interception layer
///
/// Network failures on intercepted API calls never surface as errors; they
/// are turned into the synthetic offline response.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// An asset could not be fetched or stored during install
    #[error("Install failed for {url}: {reason}")]
    InstallFailed { url: String, reason: String },

    /// The response cache rejected an operation
    #[error("Cache error: {0}")]
    Cache(String),

    /// The network could not be reached
    #[error("Transport error: {0}")]
    Transport(String),

    /// The incoming request could not be interpreted
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A push or notification payload was not valid JSON
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// The configuration cannot be used by the gateway
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        GatewayError::Transport(e.to_string())
    }
}
