//! Domain error types
//!
//! Validation failures raised while constructing domain values.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Task identifiers must be non-empty and free of path separators
    #[error("Invalid task id: {0}")]
    InvalidTaskId(String),

    /// Media content failed validation (empty filename, empty body...)
    #[error("Invalid media: {0}")]
    InvalidMedia(String),

    /// An entity snapshot had no usable identifier
    #[error("Invalid entity: {0}")]
    InvalidEntity(String),

    /// A queue action could not be decoded from its stored form
    #[error("Unknown queue action kind: {0}")]
    UnknownActionKind(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),
}
