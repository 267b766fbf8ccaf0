//! End-to-end tests for the detection engine with the built-in detectors

use chrono::{TimeZone, Utc};
use riskgate_core::{Decision, DetectionContext, RuleCondition, RuleDraft, RuleField};
use riskgate_core::ComparisonOperator as Op;
use riskgate_runtime::detector::{GeoRange, GEOLOCATION_DETECTOR_ID, TRUST_SCORE_DETECTOR_ID, VELOCITY_DETECTOR_ID};
use riskgate_runtime::{
    AdditiveStrategy, CacheStore, CustomRuleEngine, DetectionEngine, DetectorSummary,
    GeolocationDetector, MemoryCache, MemoryStore, RangeTableGeoIp, RuleService,
    TrustScoreDetector, TrustScoreService, VelocityDetector,
};
use std::net::IpAddr;
use std::sync::Arc;

struct Harness {
    engine: DetectionEngine,
    cache: MemoryCache,
    store: MemoryStore,
}

fn geo_table() -> RangeTableGeoIp {
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

fn harness() -> Harness {
    let cache = MemoryCache::new();
    let store = MemoryStore::new();
    let trust = Arc::new(TrustScoreService::new(
        Arc::new(cache.clone()),
        Arc::new(store.clone()),
    ));

    let mut engine = DetectionEngine::new(Arc::new(AdditiveStrategy::default()));
    engine.register_detector(Arc::new(TrustScoreDetector::new(trust)));
    engine.register_detector(Arc::new(GeolocationDetector::new(Arc::new(geo_table()))));
    engine.register_detector(Arc::new(VelocityDetector::new(Arc::new(cache.clone()))));

    Harness { engine, cache, store }
}

fn context() -> riskgate_core::DetectionContextBuilder {
    DetectionContext::builder("org_1", "pi_1", 5000, "USD")
        .timestamp(Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap())
}

#[tokio::test]
async fn test_detectors_registered_in_priority_order() {
    let h = harness();
    assert_eq!(
        h.engine.detector_ids(),
        vec![VELOCITY_DETECTOR_ID, GEOLOCATION_DETECTOR_ID, TRUST_SCORE_DETECTOR_ID]
    );
}

#[tokio::test]
async fn test_anonymous_without_geo_data_allows_with_zero_score() {
    let h = harness();
    let result = h.engine.detect(Arc::new(context().build())).await.unwrap();

    assert_eq!(result.score, 0.0);
    assert_eq!(result.decision, Decision::Allow);
    assert!(result.detector(GEOLOCATION_DETECTOR_ID).is_none());
    // Nothing tracked for anonymous payments
    assert!(h.cache.is_empty());
}

#[tokio::test]
async fn test_new_customer_is_allowed() {
    let h = harness();
    let ctx = context().customer_id("cus_new").build();
    let result = h.engine.detect(Arc::new(ctx)).await.unwrap();

    // velocity (0, 80) and neutral trust (20, 80)
    assert_eq!(result.score, 10.0);
    assert_eq!(result.decision, Decision::Allow);
}

#[tokio::test]
async fn test_twelve_transactions_in_one_hour() {
    let h = harness();
    let ctx = Arc::new(
        context()
            .customer_id("cus_busy")
            .customer_ip("90.1.2.3")
            .card_country("FR")
            .build(),
    );

    let mut last = None;
    for _ in 0..12 {
        last = Some(h.engine.detect(ctx.clone()).await.unwrap());
    }
    let result = last.unwrap();

    let velocity = result.detector(VELOCITY_DETECTOR_ID).unwrap();
    assert_eq!(velocity.score, 40.0);
    assert_eq!(velocity.confidence, 90.0);
    assert_eq!(result.detector(TRUST_SCORE_DETECTOR_ID).unwrap().score, 20.0);
    assert_eq!(result.detector(GEOLOCATION_DETECTOR_ID).unwrap().score, 0.0);

    // (40*90 + 0*90 + 20*80) / (90 + 90 + 80)
    assert!((result.score - 5200.0 / 260.0).abs() < 1e-9);
    assert_eq!(result.decision, Decision::Allow);
}

#[tokio::test]
async fn test_geo_mismatch_scores_high() {
    let h = harness();
    let ctx = context()
        .customer_ip("8.8.8.8")
        .card_country("NG")
        .build();
    let result = h.engine.detect(Arc::new(ctx)).await.unwrap();

    let geo = result.detector(GEOLOCATION_DETECTOR_ID).unwrap();
    assert_eq!(geo.score, 30.0);
    assert_eq!(geo.confidence, 85.0);
}

#[tokio::test]
async fn test_velocity_failure_is_omitted() {
    struct DownCache;

    #[async_trait::async_trait]
    impl CacheStore for DownCache {
        async fn get(&self, _key: &str) -> riskgate_runtime::Result<Option<String>> {
            Err(riskgate_runtime::RuntimeError::Cache("down".into()))
        }
        async fn set(&self, _k: &str, _v: &str, _t: std::time::Duration) -> riskgate_runtime::Result<()> {
            Err(riskgate_runtime::RuntimeError::Cache("down".into()))
        }
        async fn delete(&self, _key: &str) -> riskgate_runtime::Result<()> {
            Err(riskgate_runtime::RuntimeError::Cache("down".into()))
        }
        async fn incr_with_expiry(&self, _k: &str, _t: std::time::Duration) -> riskgate_runtime::Result<i64> {
            Err(riskgate_runtime::RuntimeError::Cache("down".into()))
        }
    }

    let cache: Arc<dyn CacheStore> = Arc::new(DownCache);
    let store = MemoryStore::new();
    let trust = Arc::new(TrustScoreService::new(cache.clone(), Arc::new(store)));

    let mut engine = DetectionEngine::new(Arc::new(AdditiveStrategy::default()));
    engine.register_detector(Arc::new(VelocityDetector::new(cache.clone())));
    engine.register_detector(Arc::new(TrustScoreDetector::new(trust)));

    let ctx = context().customer_id("cus_1").build();
    let result = engine.detect(Arc::new(ctx)).await.unwrap();

    // Velocity skipped, trust still served from the store
    assert!(result.detector(VELOCITY_DETECTOR_ID).is_none());
    assert_eq!(result.detector(TRUST_SCORE_DETECTOR_ID).unwrap().score, 20.0);
}

#[tokio::test]
async fn test_amount_rule_forces_block() {
    let h = harness();
    let rules = RuleService::new(Arc::new(h.cache.clone()), Arc::new(h.store.clone()));
    rules
        .create_rule(
            "org_1",
            RuleDraft {
                name: "large payments".to_string(),
                condition: RuleCondition::leaf(RuleField::Amount, Op::Gt, 50_000.0),
                action: Decision::Block,
                priority: 1,
                active: true,
            },
        )
        .await
        .unwrap();

    let ctx = DetectionContext::builder("org_1", "pi_big", 60_000, "USD").build();
    let result = h.engine.detect(Arc::new(ctx.clone())).await.unwrap();
    assert_eq!(result.decision, Decision::Allow);

    let engine = CustomRuleEngine::new(Arc::new(h.cache.clone()), Arc::new(h.store.clone()));
    let outcome = engine
        .apply_custom_rules(
            "org_1",
            &ctx,
            &DetectorSummary::from_result(&result),
            result.decision,
        )
        .await;
    assert_eq!(outcome.decision, Decision::Block);
    assert_eq!(outcome.matched_rule.unwrap().name, "large payments");
}

#[tokio::test]
async fn test_rules_reference_detector_facts() {
    let h = harness();
    let rules = RuleService::new(Arc::new(h.cache.clone()), Arc::new(h.store.clone()));
    rules
        .create_rule(
            "org_1",
            RuleDraft {
                name: "us traffic to review".to_string(),
                condition: RuleCondition::all(vec![
                    RuleCondition::leaf(RuleField::IpCountry, Op::Eq, "us"),
                    RuleCondition::leaf(RuleField::TrustScore, Op::Lt, 60.0),
                ]),
                action: Decision::Review,
                priority: 1,
                active: true,
            },
        )
        .await
        .unwrap();

    let ctx = context()
        .customer_id("cus_1")
        .customer_ip("8.8.8.8")
        .card_country("US")
        .build();
    let result = h.engine.detect(Arc::new(ctx.clone())).await.unwrap();

    let engine = CustomRuleEngine::new(Arc::new(h.cache.clone()), Arc::new(h.store.clone()));
    let outcome = engine
        .apply_custom_rules("org_1", &ctx, &DetectorSummary::from_result(&result), result.decision)
        .await;
    assert_eq!(outcome.decision, Decision::Review);
}
