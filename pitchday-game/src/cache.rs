//! Key/value slate cache with TTL and a non-durable in-process fallback.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Storage seam for cached slates. The embedding application supplies the
/// durable implementation (a remote KV store); the kernel ships only the
/// in-process fallback. Writers to the same key are last-write-wins; every
/// write for a key is an idempotent snapshot of the same logical slate.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch a JSON blob, or `None` when absent or expired.
    ///
    /// # Errors
    ///
    /// Returns an error when the backing store is unreachable or corrupt.
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;

    /// Store a JSON blob, optionally expiring after `ttl`.
    ///
    /// # Errors
    ///
    /// Returns an error when the write cannot be completed.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> anyhow::Result<()>;
}

struct MemoryEntry {
    value: String,
    expires_at: Option<Instant>,
}

/// Single-process, non-durable fallback store. Expiry is an absolute
/// timestamp checked on read; expired entries are evicted lazily. No
/// cross-process consistency is offered or implied.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, MemoryEntry>>,
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let expired = match entries.get(key) {
            Some(entry) => entry.expires_at.is_some_and(|at| Instant::now() >= at),
            None => return Ok(None),
        };
        if expired {
            entries.remove(key);
            return Ok(None);
        }
        Ok(entries.get(key).map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> anyhow::Result<()> {
        let entry = MemoryEntry {
            value: value.to_string(),
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), entry);
        Ok(())
    }
}

/// Presence of both values selects the durable backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub rest_url: Option<String>,
    #[serde(default)]
    pub rest_token: Option<String>,
}

impl CacheConfig {
    #[must_use]
    pub fn is_durable(&self) -> bool {
        self.credentials().is_some()
    }

    fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.rest_url, &self.rest_token) {
            (Some(url), Some(token)) if !url.trim().is_empty() && !token.trim().is_empty() => {
                Some((url.trim(), token.trim()))
            }
            _ => None,
        }
    }

    /// Constructor-time strategy selection: the injected durable store when
    /// both configuration values are present, else the in-process fallback.
    pub fn select<F>(&self, durable: F) -> Arc<dyn CacheStore>
    where
        F: FnOnce(&str, &str) -> Arc<dyn CacheStore>,
    {
        match self.credentials() {
            Some((url, token)) => durable(url, token),
            None => {
                log::debug!("cache config incomplete; using in-process memory cache");
                Arc::new(MemoryCache::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_cache_round_trips() {
        let cache = MemoryCache::new();
        assert_eq!(cache.get("missing").await.unwrap(), None);
        cache.set("k", "v1", None).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v1"));
        cache.set("k", "v2", None).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn expired_entries_read_as_missing() {
        let cache = MemoryCache::new();
        cache
            .set("k", "v", Some(Duration::from_millis(10)))
            .await
            .unwrap();
        assert!(cache.get("k").await.unwrap().is_some());
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
        // Evicted, not merely hidden.
        assert_eq!(cache.entries.lock().unwrap().len(), 0);
    }

    #[test]
    fn config_selects_backend_by_presence() {
        let empty = CacheConfig::default();
        assert!(!empty.is_durable());

        let partial = CacheConfig {
            rest_url: Some("https://kv.example".to_string()),
            rest_token: Some("  ".to_string()),
        };
        assert!(!partial.is_durable());

        let full = CacheConfig {
            rest_url: Some("https://kv.example".to_string()),
            rest_token: Some("token".to_string()),
        };
        assert!(full.is_durable());

        let mut called = false;
        let _store = full.select(|url, token| {
            called = true;
            assert_eq!(url, "https://kv.example");
            assert_eq!(token, "token");
            Arc::new(MemoryCache::new())
        });
        assert!(called);

        let mut called = false;
        let _store = empty.select(|_, _| {
            called = true;
            Arc::new(MemoryCache::new())
        });
        assert!(!called);
    }
}
