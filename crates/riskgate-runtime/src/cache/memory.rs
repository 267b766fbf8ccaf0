//! In-process cache
//!
//! Suitable for tests and single-node deployments. Expiry uses
//! `tokio::time::Instant` so paused-clock tests can advance it. Expired
//! entries are dropped lazily on read and swept in bulk on writes at most
//! once per sweep interval.

use super::CacheStore;
use crate::error::{Result, RuntimeError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map(|at| now >= at).unwrap_or(false)
    }
}

const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Default)]
struct Entries {
    map: HashMap<String, CacheEntry>,
    next_sweep: Option<Instant>,
}

impl Entries {
    /// Drop every expired entry if the sweep interval has elapsed
    fn sweep(&mut self, now: Instant, interval: Duration) {
        if self.next_sweep.is_some_and(|at| now < at) {
            return;
        }
        let before = self.map.len();
        self.map.retain(|_, entry| !entry.is_expired(now));
        let swept = before - self.map.len();
        if swept > 0 {
            tracing::trace!(swept, remaining = self.map.len(), "memory cache swept");
        }
        self.next_sweep = Some(now + interval);
    }
}

/// In-memory implementation of [`CacheStore`]
#[derive(Debug, Clone)]
pub struct MemoryCache {
    entries: Arc<Mutex<Entries>>,
    sweep_interval: Duration,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::with_sweep_interval(DEFAULT_SWEEP_INTERVAL)
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sweep_interval(sweep_interval: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(Entries::default())),
            sweep_interval,
        }
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .map
            .values()
            .filter(|e| !e.is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_key(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries
            .lock()
            .map
            .get(key)
            .map(|e| !e.is_expired(now))
            .unwrap_or(false)
    }

    /// Entries held in memory, expired or not
    pub fn stored_entries(&self) -> usize {
        self.entries.lock().map.len()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        match entries.map.get(key) {
            Some(entry) if entry.is_expired(now) => {
                entries.map.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        entries.sweep(now, self.sweep_interval);
        entries.map.insert(
            key.to_string(),
            CacheEntry {
                value: value.to_string(),
                expires_at: Some(now + ttl),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.lock().map.remove(key);
        Ok(())
    }

    async fn incr_with_expiry(&self, key: &str, ttl: Duration) -> Result<i64> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        entries.sweep(now, self.sweep_interval);

        let current = match entries.map.get(key) {
            Some(entry) if !entry.is_expired(now) => Some(entry.clone()),
            _ => None,
        };

        let (count, expires_at) = match current {
            Some(entry) => {
                let value: i64 = entry.value.parse().map_err(|_| {
                    RuntimeError::Cache(format!("value at '{}' is not an integer", key))
                })?;
                (value + 1, entry.expires_at)
            }
            None => (1, None),
        };

        let expires_at = if count == 1 { Some(now + ttl) } else { expires_at };
        entries.map.insert(
            key.to_string(),
            CacheEntry {
                value: count.to_string(),
                expires_at,
            },
        );
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let cache = MemoryCache::new();
        cache.set("k", "v", Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some("v".to_string()));

        cache.delete("k").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);

        // Deleting again is fine
        cache.delete("k").await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire() {
        let cache = MemoryCache::new();
        cache.set("k", "v", Duration::from_secs(5)).await.unwrap();

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_incr_sets_expiry_on_create_only() {
        let cache = MemoryCache::new();
        let ttl = Duration::from_secs(10);

        assert_eq!(cache.incr_with_expiry("c", ttl).await.unwrap(), 1);
        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(cache.incr_with_expiry("c", ttl).await.unwrap(), 2);

        // Second increment did not push the expiry out
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(cache.incr_with_expiry("c", ttl).await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_counters_are_swept_on_write() {
        let cache = MemoryCache::new();
        let hour = Duration::from_secs(3600);

        // One counter per customer per hour, never read again
        for hour_index in 0..3 {
            for customer in 0..500 {
                let key = format!("velocity:cus_{}:{}", customer, hour_index);
                cache.incr_with_expiry(&key, hour).await.unwrap();
            }
            tokio::time::advance(hour + Duration::from_secs(1)).await;
        }

        cache.incr_with_expiry("velocity:cus_0:3", hour).await.unwrap();
        assert_eq!(cache.stored_entries(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_waits_for_interval() {
        let cache = MemoryCache::with_sweep_interval(Duration::from_secs(60));
        cache.set("short", "v", Duration::from_secs(1)).await.unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;
        cache.set("other", "v", Duration::from_secs(600)).await.unwrap();
        // Expired but not yet swept
        assert_eq!(cache.stored_entries(), 2);
        assert_eq!(cache.len(), 1);

        tokio::time::advance(Duration::from_secs(60)).await;
        cache.set("third", "v", Duration::from_secs(600)).await.unwrap();
        assert_eq!(cache.stored_entries(), 2);
        assert!(!cache.contains_key("short"));
    }

    #[tokio::test]
    async fn test_incr_rejects_non_integer() {
        let cache = MemoryCache::new();
        cache.set("c", "abc", Duration::from_secs(60)).await.unwrap();
        assert!(cache.incr_with_expiry("c", Duration::from_secs(60)).await.is_err());
    }
}
