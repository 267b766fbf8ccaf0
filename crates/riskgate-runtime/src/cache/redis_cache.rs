//! Redis-backed cache

use super::CacheStore;
use crate::error::{Result, RuntimeError};
use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection settings. Timeouts bound every cache round trip made on the
/// detection path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisCacheConfig {
    pub url: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,
}

fn default_namespace() -> String {
    "riskgate".to_string()
}

fn default_response_timeout_ms() -> u64 {
    50
}

fn default_connection_timeout_ms() -> u64 {
    500
}

impl RedisCacheConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            namespace: default_namespace(),
            response_timeout_ms: default_response_timeout_ms(),
            connection_timeout_ms: default_connection_timeout_ms(),
        }
    }
}

/// [`CacheStore`] on top of a multiplexed Redis connection
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
    namespace: String,
}

impl RedisCache {
    pub async fn connect(config: &RedisCacheConfig) -> Result<Self> {
        let client = redis::Client::open(config.url.as_str())
            .map_err(|e| RuntimeError::Cache(format!("Failed to create Redis client: {}", e)))?;

        let manager_config = ConnectionManagerConfig::new()
            .set_response_timeout(Duration::from_millis(config.response_timeout_ms))
            .set_connection_timeout(Duration::from_millis(config.connection_timeout_ms));

        let conn = ConnectionManager::new_with_config(client, manager_config)
            .await
            .map_err(|e| RuntimeError::Cache(format!("Failed to connect to Redis: {}", e)))?;

        tracing::info!("Connected to Redis cache (namespace '{}')", config.namespace);
        Ok(Self {
            conn,
            namespace: config.namespace.clone(),
        })
    }

    fn key(&self, key: &str) -> String {
        if self.namespace.is_empty() {
            key.to_string()
        } else {
            format!("{}:{}", self.namespace, key)
        }
    }
}

fn cache_err(op: &str, key: &str, e: redis::RedisError) -> RuntimeError {
    RuntimeError::Cache(format!("{} {} failed: {}", op, key, e))
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let key = self.key(key);
        let mut conn = self.conn.clone();
        conn.get::<_, Option<String>>(&key)
            .await
            .map_err(|e| cache_err("GET", &key, e))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let key = self.key(key);
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(&key, value, ttl.as_secs().max(1))
            .await
            .map_err(|e| cache_err("SETEX", &key, e))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let key = self.key(key);
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(&key)
            .await
            .map_err(|e| cache_err("DEL", &key, e))
    }

    async fn incr_with_expiry(&self, key: &str, ttl: Duration) -> Result<i64> {
        let key = self.key(key);
        let mut conn = self.conn.clone();
        let count: i64 = conn
            .incr(&key, 1)
            .await
            .map_err(|e| cache_err("INCR", &key, e))?;

        if count == 1 {
            conn.expire::<_, ()>(&key, ttl.as_secs().max(1) as i64)
                .await
                .map_err(|e| cache_err("EXPIRE", &key, e))?;
        }
        Ok(count)
    }
}
