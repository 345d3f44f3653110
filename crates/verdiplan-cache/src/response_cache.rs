//! SQLite implementation of IResponseCache
//!
//! One table holds every generation; the `cache_name` column identifies the
//! generation and `(cache_name, request_key)` is unique, so a `put` for an
//! existing key replaces the previous entry.

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use verdiplan_core::domain::CachedResponse;
use verdiplan_core::ports::IResponseCache;

use crate::codec::{format_datetime, parse_datetime, parse_json, to_json};
use crate::CacheError;

/// SQLite-based response cache
pub struct SqliteResponseCache {
    pool: SqlitePool,
}

impl SqliteResponseCache {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn response_from_row(row: &SqliteRow) -> Result<CachedResponse, CacheError> {
    let status: i64 = row.get("status");
    let headers_str: String = row.get("headers");
    let stored_at_str: String = row.get("stored_at");

    let status = u16::try_from(status)
        .map_err(|_| CacheError::SerializationError(format!("Invalid HTTP status {status}")))?;

    Ok(CachedResponse {
        cache_name: row.get("cache_name"),
        request_key: row.get("request_key"),
        url: row.get("url"),
        status,
        headers: parse_json("headers", &headers_str)?,
        body: row.get("body"),
        stored_at: parse_datetime(&stored_at_str)?,
    })
}

#[async_trait::async_trait]
impl IResponseCache for SqliteResponseCache {
    async fn put(&self, entry: &CachedResponse) -> anyhow::Result<()> {
        let headers = to_json("headers", &entry.headers)?;
        // Stamp with the write time so match_request prefers the freshest copy
        let stored_at = format_datetime(&Utc::now());

        sqlx::query(
            "INSERT OR REPLACE INTO cached_responses \
             (cache_name, request_key, url, status, headers, body, stored_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&entry.cache_name)
        .bind(&entry.request_key)
        .bind(&entry.url)
        .bind(i64::from(entry.status))
        .bind(&headers)
        .bind(&entry.body)
        .bind(&stored_at)
        .execute(&self.pool)
        .await
        .map_err(CacheError::from)?;

        tracing::trace!(cache = %entry.cache_name, url = %entry.url, "Stored cached response");
        Ok(())
    }

    async fn match_request(&self, request_key: &str) -> anyhow::Result<Option<CachedResponse>> {
        let row = sqlx::query(
            "SELECT * FROM cached_responses WHERE request_key = ? \
             ORDER BY stored_at DESC LIMIT 1",
        )
        .bind(request_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(CacheError::from)?;

        match row {
            Some(ref r) => Ok(Some(response_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn cache_names(&self) -> anyhow::Result<Vec<String>> {
        let names: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT cache_name FROM cached_responses ORDER BY cache_name")
                .fetch_all(&self.pool)
                .await
                .map_err(CacheError::from)?;
        Ok(names)
    }

    async fn delete_cache(&self, cache_name: &str) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM cached_responses WHERE cache_name = ?")
            .bind(cache_name)
            .execute(&self.pool)
            .await
            .map_err(CacheError::from)?;

        let deleted = result.rows_affected();
        tracing::debug!(cache = %cache_name, entries = deleted, "Deleted cache generation");
        Ok(deleted > 0)
    }

    async fn has_cache(&self, cache_name: &str) -> anyhow::Result<bool> {
        let exists: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM cached_responses WHERE cache_name = ?)",
        )
        .bind(cache_name)
        .fetch_one(&self.pool)
        .await
        .map_err(CacheError::from)?;
        Ok(exists != 0)
    }
}
