use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::CacheError;
use crate::models::Response;

use super::{CacheStorage, CachedEntry};

/// In-process cache storage.
#[derive(Debug, Default)]
pub struct MemoryCacheStorage {
    // Vec keeps creation order for `keys` and `match_any`
    caches: RwLock<Vec<(String, HashMap<String, CachedEntry>)>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn open(&self, name: &str) -> Result<(), CacheError> {
        let mut caches = self.caches.write().await;
        if !caches.iter().any(|(n, _)| n == name) {
            caches.push((name.to_string(), HashMap::new()));
        }
        Ok(())
    }

    async fn has(&self, name: &str) -> Result<bool, CacheError> {
        Ok(self.caches.read().await.iter().any(|(n, _)| n == name))
    }

    async fn keys(&self) -> Result<Vec<String>, CacheError> {
        Ok(self.caches.read().await.iter().map(|(n, _)| n.clone()).collect())
    }

    async fn delete(&self, name: &str) -> Result<bool, CacheError> {
        let mut caches = self.caches.write().await;
        let before = caches.len();
        caches.retain(|(n, _)| n != name);
        Ok(caches.len() != before)
    }

    async fn put(&self, name: &str, key: &str, response: &Response) -> Result<(), CacheError> {
        let mut caches = self.caches.write().await;
        let entry = CachedEntry::new(key, response.clone());
        match caches.iter_mut().find(|(n, _)| n == name) {
            Some((_, entries)) => {
                entries.insert(key.to_string(), entry);
            }
            None => {
                let mut entries = HashMap::new();
                entries.insert(key.to_string(), entry);
                caches.push((name.to_string(), entries));
            }
        }
        Ok(())
    }

    async fn match_in(&self, name: &str, key: &str) -> Result<Option<CachedEntry>, CacheError> {
        Ok(self
            .caches
            .read()
            .await
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, entries)| entries.get(key).cloned()))
    }

    async fn entries(&self, name: &str) -> Result<Vec<CachedEntry>, CacheError> {
        let caches = self.caches.read().await;
        let mut entries: Vec<CachedEntry> = caches
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, entries)| entries.values().cloned().collect())
            .unwrap_or_default();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "https://openbalti.com/logo.png";

    #[tokio::test]
    async fn test_put_then_match() {
        let storage = MemoryCacheStorage::new();
        storage
            .put("openbalti-static-v4.0.0", KEY, &Response::text(200, "OK", "png"))
            .await
            .unwrap();

        let entry = storage
            .match_in("openbalti-static-v4.0.0", KEY)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.response.text_body(), "png");
        assert!(storage.match_in("openbalti-api-v4.0.0", KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_overwrites_by_key() {
        let storage = MemoryCacheStorage::new();
        storage.put("a", KEY, &Response::text(200, "OK", "one")).await.unwrap();
        storage.put("a", KEY, &Response::text(200, "OK", "two")).await.unwrap();

        let entries = storage.entries("a").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].response.text_body(), "two");
    }

    #[tokio::test]
    async fn test_keys_keep_creation_order_and_delete() {
        let storage = MemoryCacheStorage::new();
        storage.open("b").await.unwrap();
        storage.open("a").await.unwrap();
        storage.open("b").await.unwrap();
        assert_eq!(storage.keys().await.unwrap(), vec!["b", "a"]);

        assert!(storage.delete("b").await.unwrap());
        assert!(!storage.delete("b").await.unwrap());
        assert_eq!(storage.keys().await.unwrap(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_match_any_prefers_oldest_namespace() {
        let storage = MemoryCacheStorage::new();
        storage.put("first", KEY, &Response::text(200, "OK", "first")).await.unwrap();
        storage.put("second", KEY, &Response::text(200, "OK", "second")).await.unwrap();

        let entry = storage.match_any(KEY).await.unwrap().unwrap();
        assert_eq!(entry.response.text_body(), "first");
        assert!(storage.match_any("https://openbalti.com/nope").await.unwrap().is_none());
    }
}
