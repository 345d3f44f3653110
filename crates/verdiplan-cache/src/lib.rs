//! Verdiplan Cache - Durable offline store
//!
//! SQLite-based persistence for:
//! - Media captured while offline
//! - Snapshots of the last remote task listing
//! - The queue of mutations waiting for connectivity
//! - Response-cache generations used by the gateway
//!
//! ## Architecture
//!
//! This crate implements the `IOfflineStore` and `IResponseCache` ports from
//! `verdiplan-core` using SQLite as the storage backend. It is a driven
//! (secondary) adapter in the hexagonal architecture.
//!
//! ## Key Components
//!
//! - [`DatabasePool`] - Connection pool with versioned migrations
//! - [`SqliteOfflineStore`] - `IOfflineStore` implementation
//! - [`SqliteResponseCache`] - `IResponseCache` implementation
//! - [`CacheError`] - Error types for cache operations
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use verdiplan_cache::{DatabasePool, SqliteOfflineStore};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::new(Path::new("/home/user/.local/share/verdiplan/verdiplan.db")).await?;
//! let store = SqliteOfflineStore::new(pool.pool().clone());
//! // Use store as IOfflineStore...
//! # Ok(())
//! # }
//! ```

pub mod pool;
pub mod response_cache;
pub mod store;

mod codec;

pub use pool::DatabasePool;
pub use response_cache::SqliteResponseCache;
pub use store::SqliteOfflineStore;

/// Errors that can occur during cache operations
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Serialization or deserialization of domain types failed
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An entity passed to a bulk write was rejected
    #[error("Invalid entity: {0}")]
    InvalidEntity(String),
}

impl From<sqlx::Error> for CacheError {
    fn from(e: sqlx::Error) -> Self {
        CacheError::QueryFailed(e.to_string())
    }
}
