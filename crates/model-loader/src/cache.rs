//! # Response Cache
//!
//! Raw command responses keyed by [`CacheHash`]. The single-item and
//! collection loaders consult the client's cache before executing a command and
//! store every successful response after it. Nothing outlives the process.

use crate::cache_hash::CacheHash;
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;

/// Errors reported by a cache backend.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    #[error("Cache error: {0}")]
    Other(String),
}

/// Key-value storage for raw responses with optional expiry.
#[async_trait]
pub trait ResponseCache: Send + Sync {
    /// Returns `None` if the key is absent or expired.
    async fn get(&self, key: &CacheHash) -> Option<Value>;

    /// Stores `value`; `ttl: None` falls back to the backend's default.
    async fn set(&self, key: CacheHash, value: Value, ttl: Option<Duration>)
        -> Result<(), CacheError>;

    async fn delete(&self, key: &CacheHash) -> Result<(), CacheError>;

    async fn clear(&self) -> Result<(), CacheError>;
}

struct CacheEntry {
    value: Value,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Instant::now())
    }
}

/// Process-lifetime cache backed by a [`DashMap`].
#[derive(Default)]
pub struct InMemoryCache {
    entries: DashMap<CacheHash, CacheEntry>,
    default_ttl: Option<Duration>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries written without an explicit TTL expire after `ttl`.
    pub fn with_default_ttl(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            default_ttl: Some(ttl),
        }
    }

    /// Number of stored entries, expired ones included until they are read.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Synchronous form of [`ResponseCache::clear`] for use inside event listeners.
    pub fn invalidate_all(&self) {
        self.entries.clear();
    }
}

#[async_trait]
impl ResponseCache for InMemoryCache {
    async fn get(&self, key: &CacheHash) -> Option<Value> {
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired() {
                return Some(entry.value.clone());
            }
        }
        self.entries.remove_if(key, |_, entry| entry.is_expired());
        None
    }

    async fn set(
        &self,
        key: CacheHash,
        value: Value,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let expires_at = ttl.or(self.default_ttl).map(|d| Instant::now() + d);
        self.entries.insert(key, CacheEntry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &CacheHash) -> Result<(), CacheError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.entries.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Args;
    use serde_json::json;

    fn key(name: &str) -> CacheHash {
        CacheHash::new(name, &Args::new())
    }

    #[tokio::test]
    async fn test_cache_trait_object() {
        let cache: Box<dyn ResponseCache> = Box::new(InMemoryCache::new());
        cache.set(key("Issue"), json!({ "n": 1 }), None).await.unwrap();
        assert_eq!(cache.get(&key("Issue")).await, Some(json!({ "n": 1 })));

        cache.delete(&key("Issue")).await.unwrap();
        assert_eq!(cache.get(&key("Issue")).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_after_ttl() {
        let cache = InMemoryCache::with_default_ttl(Duration::from_secs(30));
        cache.set(key("Issue"), json!(1), None).await.unwrap();
        cache
            .set(key("Repository"), json!(2), Some(Duration::from_secs(120)))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(60)).await;

        assert_eq!(cache.get(&key("Issue")).await, None);
        assert_eq!(cache.get(&key("Repository")).await, Some(json!(2)));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_all_empties_cache() {
        let cache = InMemoryCache::new();
        cache.set(key("Issue"), json!(1), None).await.unwrap();
        assert!(!cache.is_empty());
        cache.invalidate_all();
        assert!(cache.is_empty());
    }
}
