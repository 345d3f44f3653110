//! Action queue domain types
//!
//! Every mutation made while offline is recorded as a `SyncQueueItem` and
//! replayed against the remote API by the synchronizer. An item is removed
//! only after the remote acknowledges it.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::DomainError;
use super::newtypes::{IdempotencyKey, QueueItemId, TaskId};

// ============================================================================
// QueueAction
// ============================================================================

/// A remote mutation waiting to be replayed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueueAction {
    /// Create a new task with the given body
    EntityCreate { payload: Value },
    /// Patch an existing task
    EntityUpdate { id: TaskId, payload: Value },
}

impl QueueAction {
    pub const KIND_CREATE: &'static str = "entity_create";
    pub const KIND_UPDATE: &'static str = "entity_update";

    /// Stable name used in the store's `kind` column
    pub fn kind(&self) -> &'static str {
        match self {
            QueueAction::EntityCreate { .. } => Self::KIND_CREATE,
            QueueAction::EntityUpdate { .. } => Self::KIND_UPDATE,
        }
    }

    /// Target entity id, if the action addresses an existing entity
    pub fn target_id(&self) -> Option<&TaskId> {
        match self {
            QueueAction::EntityCreate { .. } => None,
            QueueAction::EntityUpdate { id, .. } => Some(id),
        }
    }

    pub fn payload(&self) -> &Value {
        match self {
            QueueAction::EntityCreate { payload } | QueueAction::EntityUpdate { payload, .. } => {
                payload
            }
        }
    }

    /// Rebuilds an action from its stored columns
    ///
    /// # Errors
    /// Returns `DomainError::UnknownActionKind` for an unrecognised kind and
    /// `DomainError::ValidationFailed` when an update row has no target id
    pub fn from_parts(
        kind: &str,
        target_id: Option<&str>,
        payload: Value,
    ) -> Result<Self, DomainError> {
        match kind {
            Self::KIND_CREATE => Ok(QueueAction::EntityCreate { payload }),
            Self::KIND_UPDATE => {
                let id = target_id.ok_or_else(|| {
                    DomainError::ValidationFailed("entity_update requires a target id".into())
                })?;
                Ok(QueueAction::EntityUpdate {
                    id: TaskId::new(id)?,
                    payload,
                })
            }
            other => Err(DomainError::UnknownActionKind(other.to_string())),
        }
    }
}

impl fmt::Display for QueueAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueAction::EntityCreate { .. } => write!(f, "create task"),
            QueueAction::EntityUpdate { id, .. } => write!(f, "update task {id}"),
        }
    }
}

// ============================================================================
// SyncQueueItem
// ============================================================================

/// One persisted unit of pending remote work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncQueueItem {
    pub id: QueueItemId,
    pub action: QueueAction,
    /// Sent as the `Idempotency-Key` header on every attempt
    pub idempotency_key: IdempotencyKey,
    pub enqueued_at: DateTime<Utc>,
    pub attempt_count: u32,
    pub last_error: Option<String>,
}

impl SyncQueueItem {
    /// Returns true once the item has used up its attempts
    ///
    /// A `max_attempts` of 0 means attempts are unlimited.
    pub fn is_parked(&self, max_attempts: u32) -> bool {
        max_attempts > 0 && self.attempt_count >= max_attempts
    }
}
