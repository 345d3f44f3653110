//! Verdiplan Sync - Offline queue draining
//!
//! Provides:
//! - The sync queue manager (one pass at a time, media before actions)
//! - An edge-triggered connectivity monitor with a periodic API probe
//! - A status aggregator for user-facing sync state
//! - Task snapshots with offline fallback
//!
//! ## Modules
//!
//! - [`manager`] - Sync pass state machine and queue statistics
//! - [`connectivity`] - Online flag, reconnect trigger and probe loop
//! - [`status`] - Pending count, syncing flag and last sync time
//! - [`events`] - Lifecycle events broadcast by the manager
//! - [`snapshots`] - Remote task list with snapshot fallback

pub mod connectivity;
pub mod events;
pub mod manager;
pub mod snapshots;
pub mod status;

pub use connectivity::{ConnectivityMonitor, ConnectivityState};
pub use events::{Progress, SyncEvent};
pub use manager::{QueueStats, SyncOutcome, SyncQueueManager, SyncReport};
pub use snapshots::{SnapshotService, TaskList, TaskSource};
pub use status::{StatusAggregator, SyncStatus};
