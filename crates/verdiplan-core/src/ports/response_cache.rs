//! Response cache port (driven/secondary port)
//!
//! Named cache generations for the network interception layer. Semantics
//! follow browser cache storage: `put` overwrites an entry with the same
//! request key, and `match_request` searches every generation.

use crate::domain::CachedResponse;

/// Port trait for named response-cache generations
#[async_trait::async_trait]
pub trait IResponseCache: Send + Sync {
    /// Stores (or replaces) an entry in the generation named in the entry
    async fn put(&self, entry: &CachedResponse) -> anyhow::Result<()>;

    /// Finds an entry by request key in any generation
    async fn match_request(&self, request_key: &str) -> anyhow::Result<Option<CachedResponse>>;

    /// Names of every generation holding at least one entry
    async fn cache_names(&self) -> anyhow::Result<Vec<String>>;

    /// Deletes a generation; returns whether it existed
    async fn delete_cache(&self, cache_name: &str) -> anyhow::Result<bool>;

    async fn has_cache(&self, cache_name: &str) -> anyhow::Result<bool>;
}
