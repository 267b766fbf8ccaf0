//! Pipeline initialization
//!
//! Turns [`ServerConfig`] into backends and a wired [`FraudDetector`].
//! Redis and Postgres are used when configured and compiled in; anything
//! else falls back to the in-memory implementations.

use crate::api::rest::AppState;
use crate::config::ServerConfig;
use anyhow::Result;
use riskgate_runtime::{
    CacheStore, DetectionRepository, GeoIpResolver, MemoryCache, MemoryStore, RangeTableGeoIp,
    RuleRepository, TrustScoreRepository, WebhookEventRepository,
};
use riskgate_sdk::{FraudDetectorBuilder, SignatureVerifier, WebhookGate};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Storage handles shared by the pipeline and the webhook gate
#[derive(Clone)]
pub struct Backends {
    pub cache: Arc<dyn CacheStore>,
    pub trust: Arc<dyn TrustScoreRepository>,
    pub rules: Arc<dyn RuleRepository>,
    pub detections: Arc<dyn DetectionRepository>,
    pub events: Arc<dyn WebhookEventRepository>,
}

impl Backends {
    /// One store object behind every repository boundary
    pub fn with_store<S>(cache: Arc<dyn CacheStore>, store: Arc<S>) -> Self
    where
        S: TrustScoreRepository
            + RuleRepository
            + DetectionRepository
            + WebhookEventRepository
            + 'static,
    {
        Self {
            cache,
            trust: store.clone(),
            rules: store.clone(),
            detections: store.clone(),
            events: store,
        }
    }

    pub fn memory() -> Self {
        Self::with_store(Arc::new(MemoryCache::new()), Arc::new(MemoryStore::new()))
    }
}

/// Connect the configured cache and store
pub async fn connect_backends(config: &ServerConfig) -> Result<Backends> {
    let cache = connect_cache(config).await?;

    #[cfg(feature = "sqlx")]
    if let Some(url) = &config.database_url {
        let store = riskgate_runtime::PgStore::connect(url, config.database_max_connections).await?;
        store.ensure_schema().await?;
        info!("Using Postgres store");
        return Ok(Backends::with_store(cache, Arc::new(store)));
    }

    if config.database_url.is_some() {
        warn!("database_url set but built without the `sqlx` feature, using in-memory store");
    } else {
        warn!("No database configured, records will not survive a restart");
    }
    Ok(Backends::with_store(cache, Arc::new(MemoryStore::new())))
}

async fn connect_cache(config: &ServerConfig) -> Result<Arc<dyn CacheStore>> {
    #[cfg(feature = "redis")]
    if let Some(url) = &config.redis_url {
        let redis_config = riskgate_runtime::RedisCacheConfig::new(url.clone());
        let cache = riskgate_runtime::RedisCache::connect(&redis_config).await?;
        info!("Using Redis cache");
        return Ok(Arc::new(cache));
    }

    if config.redis_url.is_some() {
        warn!("redis_url set but built without the `redis` feature, using in-memory cache");
    } else {
        info!("Using in-memory cache");
    }
    Ok(Arc::new(MemoryCache::new()))
}

/// `.mmdb` files use the MaxMind reader when built with `maxminddb`,
/// anything else is read as a JSON range table
fn load_geoip(path: &Path) -> Result<Arc<dyn GeoIpResolver>> {
    #[cfg(feature = "maxminddb")]
    {
        if riskgate_runtime::detector::is_maxmind_path(path) {
            return Ok(Arc::new(riskgate_runtime::MaxMindGeoIp::open(path)?));
        }
    }
    Ok(Arc::new(RangeTableGeoIp::load(path)?))
}

/// Wire the fraud pipeline and webhook gate on top of `backends`
pub fn init_state(config: &ServerConfig, backends: Backends) -> Result<AppState> {
    let mut builder = FraudDetectorBuilder::new()
        .with_config(config.engine.clone())
        .with_cache(backends.cache.clone())
        .with_trust_store(backends.trust.clone())
        .with_rule_store(backends.rules.clone())
        .with_detection_store(backends.detections.clone());

    match &config.geoip_path {
        Some(path) => builder = builder.with_geoip(load_geoip(path)?),
        None => warn!("No geo-ip database configured, geolocation detector will abstain"),
    }

    let detector = Arc::new(builder.build()?);
    let verifier = SignatureVerifier::new(config.webhook_secret.as_bytes().to_vec())
        .with_tolerance(config.signature_tolerance_secs);
    let gate = WebhookGate::new(verifier, backends.events.clone(), detector.clone());

    Ok(AppState { detector, gate })
}
