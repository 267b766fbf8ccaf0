//! RiskGate Runtime - detection engine and supporting services
//!
//! This crate runs the fraud decision pipeline up to (but excluding) the
//! orchestration layer:
//! - Detection engine with concurrent detector fan-out
//! - Velocity, geolocation and trust-score detectors
//! - Additive scoring strategy
//! - Custom rule evaluation and administration
//! - Trust score service
//! - Cache and persistence boundaries with in-memory, Redis and Postgres backends
//! - Background job dispatch

pub mod cache;
pub mod detector;
pub mod engine;
pub mod error;
pub mod jobs;
pub mod observability;
pub mod rules;
pub mod scoring;
pub mod store;
pub mod trust;

// Re-export main types
pub use cache::{CacheStore, MemoryCache};
#[cfg(feature = "redis")]
pub use cache::{RedisCache, RedisCacheConfig};
pub use detector::{
    Detector, GeoIpResolver, GeolocationDetector, RangeTableGeoIp, TrustScoreDetector,
    VelocityDetector,
};
#[cfg(feature = "maxminddb")]
pub use detector::MaxMindGeoIp;
pub use engine::DetectionEngine;
pub use error::{Result, RuntimeError};
pub use jobs::{
    ExplanationTrigger, Job, JobDispatcher, JobHandler, LoggingExplanationTrigger,
    PipelineJobHandler, RetryPolicy,
};
pub use observability::{Metrics, MetricsCollector};
pub use rules::{CustomRuleEngine, DetectorSummary, MatchedRule, RuleOutcome, RuleService};
pub use scoring::{AdditiveStrategy, DecisionThresholds, ScoringStrategy};
#[cfg(feature = "sqlx")]
pub use store::PgStore;
pub use store::{
    DetectionRecord, DetectionRepository, MemoryStore, RuleRepository, TrustScoreRepository,
    WebhookEventRepository,
};
pub use trust::TrustScoreService;
