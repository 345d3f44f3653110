//! Verdiplan Core - Domain types and port definitions
//!
//! This crate contains the hexagonal architecture core of the offline layer:
//! - **Domain entities** - `PendingMedia`, `CachedEntitySnapshot`, `SyncQueueItem`, `CachedResponse`
//! - **Port definitions** - Traits for adapters: `IOfflineStore`, `IRemoteApi`, `IResponseCache`,
//!   `INotificationService`, `IClientLauncher`
//! - **Configuration** - YAML configuration shared by the daemon and the CLI
//!
//! # Architecture
//!
//! The domain module contains plain data types with validation and no I/O.
//! Ports define trait interfaces that adapter crates implement.

pub mod config;
pub mod domain;
pub mod ports;
