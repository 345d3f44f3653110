//! Domain entities and business logic
//!
//! This module contains the core domain types for Verdiplan's offline layer:
//! - Newtypes for type-safe identifiers
//! - Pending media captured while offline
//! - Cached entity snapshots used as a read fallback
//! - Queued remote actions
//! - Cached HTTP responses for the interception layer
//! - Domain-specific error types

pub mod errors;
pub mod media;
pub mod newtypes;
pub mod queue;
pub mod response;
pub mod snapshot;

// Re-export commonly used types
pub use errors::DomainError;
pub use media::{guess_mime_type, MediaContent, MediaMetadata, MediaRef, PendingMedia};
pub use newtypes::*;
pub use queue::{QueueAction, SyncQueueItem};
pub use response::CachedResponse;
pub use snapshot::CachedEntitySnapshot;
