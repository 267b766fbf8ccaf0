//! Builder pattern for FraudDetector

use crate::config::EngineConfig;
use crate::error::{Result, SdkError};
use crate::fraud_detector::FraudDetector;
use riskgate_runtime::{
    AdditiveStrategy, CacheStore, CustomRuleEngine, DetectionEngine, DetectionRepository, Detector,
    ExplanationTrigger, GeoIpResolver, GeolocationDetector, JobDispatcher, LoggingExplanationTrigger,
    MemoryCache, MemoryStore, MetricsCollector, PipelineJobHandler, RuleRepository, RuleService,
    ScoringStrategy, TrustScoreDetector, TrustScoreRepository, TrustScoreService, VelocityDetector,
};
use std::sync::Arc;

/// Builder for [`FraudDetector`]
///
/// # Example
///
/// ```rust,ignore
/// use riskgate_sdk::FraudDetectorBuilder;
///
/// // Everything in memory (tests, single node)
/// let detector = FraudDetectorBuilder::new()
///     .with_memory_backends()
///     .build()?;
///
/// // Redis cache and Postgres store
/// let detector = FraudDetectorBuilder::new()
///     .with_cache(Arc::new(redis_cache))
///     .with_store(Arc::new(pg_store))
///     .with_geoip(Arc::new(geo_table))
///     .build()?;
/// ```
#[derive(Default)]
pub struct FraudDetectorBuilder {
    config: EngineConfig,
    cache: Option<Arc<dyn CacheStore>>,
    trust_store: Option<Arc<dyn TrustScoreRepository>>,
    rule_store: Option<Arc<dyn RuleRepository>>,
    detection_store: Option<Arc<dyn DetectionRepository>>,
    geoip: Option<Arc<dyn GeoIpResolver>>,
    strategy: Option<Arc<dyn ScoringStrategy>>,
    explanations: Option<Arc<dyn ExplanationTrigger>>,
    extra_detectors: Vec<Arc<dyn Detector>>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl FraudDetectorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Use one backend for trust scores, rules and detection records
    pub fn with_store<S>(mut self, store: Arc<S>) -> Self
    where
        S: TrustScoreRepository + RuleRepository + DetectionRepository + 'static,
    {
        self.trust_store = Some(store.clone());
        self.rule_store = Some(store.clone());
        self.detection_store = Some(store);
        self
    }

    pub fn with_trust_store(mut self, store: Arc<dyn TrustScoreRepository>) -> Self {
        self.trust_store = Some(store);
        self
    }

    pub fn with_rule_store(mut self, store: Arc<dyn RuleRepository>) -> Self {
        self.rule_store = Some(store);
        self
    }

    pub fn with_detection_store(mut self, store: Arc<dyn DetectionRepository>) -> Self {
        self.detection_store = Some(store);
        self
    }

    /// In-memory cache and store for anything not configured yet
    pub fn with_memory_backends(mut self) -> Self {
        if self.cache.is_none() {
            self.cache = Some(Arc::new(MemoryCache::new()));
        }
        let store = Arc::new(MemoryStore::new());
        if self.trust_store.is_none() {
            self.trust_store = Some(store.clone());
        }
        if self.rule_store.is_none() {
            self.rule_store = Some(store.clone());
        }
        if self.detection_store.is_none() {
            self.detection_store = Some(store);
        }
        self
    }

    /// Geo-IP database for the geolocation detector. Without one the
    /// detector abstains.
    pub fn with_geoip(mut self, resolver: Arc<dyn GeoIpResolver>) -> Self {
        self.geoip = Some(resolver);
        self
    }

    /// Replace the default additive strategy
    pub fn with_strategy(mut self, strategy: Arc<dyn ScoringStrategy>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn with_explanation_trigger(mut self, trigger: Arc<dyn ExplanationTrigger>) -> Self {
        self.explanations = Some(trigger);
        self
    }

    /// Register an additional detector next to the built-in ones
    pub fn add_detector(mut self, detector: Arc<dyn Detector>) -> Self {
        self.extra_detectors.push(detector);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Wire the pipeline. Spawns the job worker, so it must run inside a
    /// tokio runtime.
    pub fn build(self) -> Result<FraudDetector> {
        self.config.validate()?;

        let missing = |what: &str| SdkError::ConfigError(format!("no {} configured", what));
        let cache = self.cache.ok_or_else(|| missing("cache"))?;
        let trust_store = self.trust_store.ok_or_else(|| missing("trust score store"))?;
        let rule_store = self.rule_store.ok_or_else(|| missing("rule store"))?;
        let detections = self
            .detection_store
            .ok_or_else(|| missing("detection store"))?;
        let metrics = self.metrics.unwrap_or_default();

        let trust = Arc::new(
            TrustScoreService::new(cache.clone(), trust_store)
                .with_ttl(self.config.trust_cache_ttl()),
        );

        let strategy = self
            .strategy
            .unwrap_or_else(|| Arc::new(AdditiveStrategy::new(self.config.thresholds)));
        let mut engine = DetectionEngine::new(strategy).with_metrics(metrics.clone());
        engine.register_detector(Arc::new(VelocityDetector::new(cache.clone())));
        engine.register_detector(Arc::new(match self.geoip {
            Some(resolver) => GeolocationDetector::new(resolver),
            None => {
                tracing::warn!("no geo-ip database configured, geolocation detector will abstain");
                GeolocationDetector::unavailable()
            }
        }));
        engine.register_detector(Arc::new(TrustScoreDetector::new(trust.clone())));
        for detector in self.extra_detectors {
            engine.register_detector(detector);
        }

        let rules = CustomRuleEngine::new(cache.clone(), rule_store.clone())
            .with_ttl(self.config.rule_cache_ttl())
            .with_slow_threshold(self.config.rule_eval_warn())
            .with_metrics(metrics.clone());
        let rule_service = Arc::new(RuleService::new(cache, rule_store));

        let explanations = self
            .explanations
            .unwrap_or_else(|| Arc::new(LoggingExplanationTrigger));
        let handler = Arc::new(PipelineJobHandler::new(trust.clone(), explanations));
        let jobs =
            JobDispatcher::start_with_metrics(handler, self.config.job_retry.clone(), metrics.clone());

        tracing::info!(
            detectors = ?engine.detector_ids(),
            strategy = engine.strategy().name(),
            "fraud detector built"
        );

        Ok(FraudDetector {
            config: self.config,
            engine,
            rules,
            rule_service,
            trust,
            detections,
            jobs,
            metrics,
        })
    }
}
