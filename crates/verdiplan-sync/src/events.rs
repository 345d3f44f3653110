//! Sync lifecycle events
//!
//! Events are broadcast on a `tokio::sync::broadcast` channel. Each
//! subscriber gets its own receiver; dropping the receiver unsubscribes.
//! Slow subscribers may observe `RecvError::Lagged` and skip events.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use verdiplan_core::domain::{MediaRef, QueueItemId};

/// Capacity of the event channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Position of an item within the media phase of a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// Items processed so far (successes plus failures)
    pub current: usize,
    pub total: usize,
}

/// An event emitted by the sync queue manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    /// The media phase started with `count` pending items
    SyncStart { count: usize },
    PhotoUploaded { photo: MediaRef, progress: Progress },
    PhotoFailed {
        photo: MediaRef,
        error: String,
        progress: Progress,
    },
    /// The media phase finished
    SyncComplete { success: usize, failed: usize },
    /// A queued action was acknowledged and removed
    ActionSynced { item: QueueItemId, kind: String },
    /// A queued action failed and stays queued
    ActionFailed {
        item: QueueItemId,
        error: String,
        attempts: u32,
    },
    /// A queued action was skipped because it ran out of attempts
    ActionParked { item: QueueItemId, attempts: u32 },
}

/// Creates the sender half of a new event channel
pub(crate) fn channel() -> broadcast::Sender<SyncEvent> {
    let (tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
    tx
}
