//! Column encoding helpers shared by the store and the response cache
//!
//! | Domain Type         | SQL Type | Strategy                                 |
//! |---------------------|----------|------------------------------------------|
//! | MediaId, QueueItemId| INTEGER  | rowid                                    |
//! | TaskId              | TEXT     | `.as_str()` / `TaskId::new()`            |
//! | IdempotencyKey      | TEXT     | UUID string                              |
//! | DateTime<Utc>       | TEXT     | RFC 3339, UTC, fixed microsecond precision |
//! | JSON maps / values  | TEXT     | serde_json                               |

use chrono::{DateTime, SecondsFormat, Utc};

use crate::CacheError;

/// Formats a timestamp so that lexicographic order equals time order
pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_datetime(s: &str) -> Result<DateTime<Utc>, CacheError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            CacheError::SerializationError(format!("Failed to parse datetime '{}': {}", s, e))
        })
}

pub(crate) fn parse_optional_datetime(
    s: Option<String>,
) -> Result<Option<DateTime<Utc>>, CacheError> {
    match s {
        Some(ref val) if !val.is_empty() => parse_datetime(val).map(Some),
        _ => Ok(None),
    }
}

pub(crate) fn parse_json<T: serde::de::DeserializeOwned>(
    column: &str,
    raw: &str,
) -> Result<T, CacheError> {
    serde_json::from_str(raw)
        .map_err(|e| CacheError::SerializationError(format!("Invalid {column} JSON: {e}")))
}

pub(crate) fn to_json<T: serde::Serialize>(column: &str, value: &T) -> Result<String, CacheError> {
    serde_json::to_string(value)
        .map_err(|e| CacheError::SerializationError(format!("Cannot encode {column}: {e}")))
}
