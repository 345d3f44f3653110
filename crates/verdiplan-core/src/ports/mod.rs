//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the domain core
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IOfflineStore`] - Durable local store (media, snapshots, action queue)
//! - [`IRemoteApi`] - Verdiplan REST API operations
//! - [`IResponseCache`] - Named HTTP response cache generations
//! - [`INotificationService`] - Local notifications
//! - [`IClientLauncher`] - Opening the application window

pub mod notification;
pub mod offline_store;
pub mod remote_api;
pub mod response_cache;

pub use notification::{IClientLauncher, INotificationService, Notification, NotificationPriority};
pub use offline_store::IOfflineStore;
pub use remote_api::IRemoteApi;
pub use response_cache::IResponseCache;
