//! Cached entity snapshots
//!
//! The last successful list fetch of remote tasks, kept as a read-only
//! fallback for when the API is unreachable. The whole collection is replaced
//! on every successful fetch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::DomainError;
use super::newtypes::TaskId;

/// A locally cached copy of one remote entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedEntitySnapshot {
    /// Remote entity id, taken from the entity's `id` field
    pub id: TaskId,
    /// The entity as returned by the remote API
    pub fields: Value,
    pub cached_at: DateTime<Utc>,
}

impl CachedEntitySnapshot {
    /// Builds a snapshot from a raw remote entity
    ///
    /// # Errors
    /// Returns `DomainError::InvalidEntity` if the value is not a JSON object
    /// or has no usable `id` field
    pub fn from_entity(entity: Value, cached_at: DateTime<Utc>) -> Result<Self, DomainError> {
        let id = match entity.as_object() {
            Some(obj) => match obj.get("id") {
                Some(raw) => TaskId::from_json(raw)
                    .map_err(|e| DomainError::InvalidEntity(format!("bad id: {e}")))?,
                None => {
                    return Err(DomainError::InvalidEntity(
                        "entity has no 'id' field".into(),
                    ))
                }
            },
            None => {
                return Err(DomainError::InvalidEntity(format!(
                    "expected a JSON object, got {entity}"
                )))
            }
        };

        Ok(Self {
            id,
            fields: entity,
            cached_at,
        })
    }

    /// Looks up a top-level field of the cached entity
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}
