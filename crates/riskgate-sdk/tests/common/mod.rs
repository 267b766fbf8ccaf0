//! Shared fixtures for SDK integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use riskgate_runtime::detector::GeoRange;
use riskgate_runtime::{
    DetectionRecord, DetectionRepository, MemoryCache, MemoryStore, RangeTableGeoIp, RetryPolicy,
    RuntimeError,
};
use riskgate_sdk::{EngineConfig, FraudDetector, FraudDetectorBuilder};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

pub struct Harness {
    pub detector: Arc<FraudDetector>,
    pub store: MemoryStore,
    pub cache: MemoryCache,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(|builder| builder)
    }

    /// Memory backends plus a small geo table; `customize` can override
    pub fn with(customize: impl FnOnce(FraudDetectorBuilder) -> FraudDetectorBuilder) -> Self {
        let store = MemoryStore::new();
        let cache = MemoryCache::new();
        let config = EngineConfig::default().with_job_retry(RetryPolicy::none());

        let builder = FraudDetectorBuilder::new()
            .with_config(config)
            .with_cache(Arc::new(cache.clone()))
            .with_store(Arc::new(store.clone()))
            .with_geoip(Arc::new(geo_table()));
        let detector = customize(builder).build().expect("detector builds");

        Self {
            detector: Arc::new(detector),
            store,
            cache,
        }
    }

    /// Wait for queued background jobs
    pub async fn settle(&self) {
        assert!(
            self.detector.jobs().drain(Duration::from_secs(5)).await,
            "background jobs did not finish"
        );
    }
}

pub fn geo_table() -> RangeTableGeoIp {
    let range = |start: &str, end: &str, country: &str, proxy: bool| GeoRange {
        start: start.parse::<IpAddr>().unwrap(),
        end: end.parse::<IpAddr>().unwrap(),
        country: country.to_string(),
        anonymous_proxy: proxy,
    };
    RangeTableGeoIp::from_ranges(vec![
        range("8.8.8.0", "8.8.8.255", "US", false),
        range("90.0.0.0", "90.127.255.255", "FR", false),
        range("185.220.100.0", "185.220.103.255", "DE", true),
    ])
    .unwrap()
}

/// Detection store that always fails
pub struct BrokenDetectionStore;

#[async_trait]
impl DetectionRepository for BrokenDetectionStore {
    async fn insert(&self, _record: &DetectionRecord) -> riskgate_runtime::Result<()> {
        Err(RuntimeError::Storage("disk full".to_string()))
    }

    async fn get(&self, _id: &str) -> riskgate_runtime::Result<Option<DetectionRecord>> {
        Err(RuntimeError::Storage("disk full".to_string()))
    }
}
