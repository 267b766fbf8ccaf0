//! Cache boundary
//!
//! Key-value store with TTLs and atomic counters. Used for trust-score
//! reads, custom-rule lists and velocity counters. Callers treat every
//! cache error as a miss.

mod memory;
#[cfg(feature = "redis")]
mod redis_cache;

pub use memory::MemoryCache;
#[cfg(feature = "redis")]
pub use redis_cache::{RedisCache, RedisCacheConfig};

use crate::error::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// Cache store trait
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch a raw value
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store a value with a time-to-live
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Remove a key; removing a missing key is not an error
    async fn delete(&self, key: &str) -> Result<()>;

    /// Atomically increment a counter. The expiry is applied only by the
    /// increment that creates the key (when the new value is 1).
    async fn incr_with_expiry(&self, key: &str, ttl: Duration) -> Result<i64>;
}

/// Read and decode a JSON value
pub async fn get_json<T: DeserializeOwned>(cache: &dyn CacheStore, key: &str) -> Result<Option<T>> {
    match cache.get(key).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Encode and store a JSON value
pub async fn set_json<T: Serialize + Sync>(
    cache: &dyn CacheStore,
    key: &str,
    value: &T,
    ttl: Duration,
) -> Result<()> {
    let raw = serde_json::to_string(value)?;
    cache.set(key, &raw, ttl).await
}
