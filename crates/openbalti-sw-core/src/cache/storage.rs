use async_trait::async_trait;

use crate::error::CacheError;
use crate::models::Response;

use super::CachedEntry;

/// Named caches of URL-keyed responses.
///
/// `put` overwrites by key, so repeating a write is harmless. Reads against a
/// namespace that does not exist return `Ok(None)`.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create the namespace if missing.
    async fn open(&self, name: &str) -> Result<(), CacheError>;

    async fn has(&self, name: &str) -> Result<bool, CacheError>;

    /// Namespace names in creation order.
    async fn keys(&self) -> Result<Vec<String>, CacheError>;

    /// Drop a namespace and everything in it. Returns whether it existed.
    async fn delete(&self, name: &str) -> Result<bool, CacheError>;

    /// Store `response` under `key`, opening the namespace if needed.
    async fn put(&self, name: &str, key: &str, response: &Response) -> Result<(), CacheError>;

    async fn match_in(&self, name: &str, key: &str) -> Result<Option<CachedEntry>, CacheError>;

    async fn entries(&self, name: &str) -> Result<Vec<CachedEntry>, CacheError>;

    /// First match across all namespaces, oldest namespace first.
    async fn match_any(&self, key: &str) -> Result<Option<CachedEntry>, CacheError> {
        for name in self.keys().await? {
            if let Some(entry) = self.match_in(&name, key).await? {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }
}
