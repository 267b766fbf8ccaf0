use super::Detector;
use crate::cache::CacheStore;
use crate::error::{Result, RuntimeError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use riskgate_core::{DetectionContext, DetectorResult, RiskLevel};
use std::sync::Arc;
use std::time::Duration;

pub const VELOCITY_DETECTOR_ID: &str = "velocity";

const WINDOW: Duration = Duration::from_secs(3600);
const HIGH_ABOVE: i64 = 10;
const MEDIUM_FROM: i64 = 5;

/// Counter key for a customer in the UTC hour containing `at`
pub fn velocity_key(customer_id: &str, at: DateTime<Utc>) -> String {
    format!("velocity:{}:{}", customer_id, at.format("%Y-%m-%d-%H"))
}

/// Source of the current time used to pick the hour bucket
pub type VelocityClock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Counts a customer's transactions in the current UTC clock hour.
///
/// The bucket comes from the detector's clock at processing time, never
/// from the payment's own timestamp.
pub struct VelocityDetector {
    cache: Arc<dyn CacheStore>,
    clock: VelocityClock,
}

impl VelocityDetector {
    pub fn new(cache: Arc<dyn CacheStore>) -> Self {
        Self::with_clock(cache, Arc::new(Utc::now))
    }

    pub fn with_clock(cache: Arc<dyn CacheStore>, clock: VelocityClock) -> Self {
        Self { cache, clock }
    }

    fn classify(count: i64) -> (RiskLevel, f64, f64) {
        if count > HIGH_ABOVE {
            (RiskLevel::High, 40.0, 90.0)
        } else if count >= MEDIUM_FROM {
            (RiskLevel::Medium, 20.0, 70.0)
        } else {
            (RiskLevel::Low, 0.0, 80.0)
        }
    }
}

#[async_trait]
impl Detector for VelocityDetector {
    fn id(&self) -> &str {
        VELOCITY_DETECTOR_ID
    }

    fn priority(&self) -> i32 {
        10
    }

    async fn detect(&self, context: &DetectionContext) -> Result<Option<DetectorResult>> {
        // Anonymous transactions are never tracked
        let Some(customer_id) = context.customer() else {
            return Ok(Some(
                DetectorResult::new(VELOCITY_DETECTOR_ID, 0.0, 80.0, "Anonymous transaction")
                    .with_metadata("risk_level", "low"),
            ));
        };

        let key = velocity_key(customer_id, (self.clock)());
        let count = self
            .cache
            .incr_with_expiry(&key, WINDOW)
            .await
            .map_err(|e| RuntimeError::detector(VELOCITY_DETECTOR_ID, e.to_string()))?;

        let (level, score, confidence) = Self::classify(count);
        tracing::debug!(customer_id, count, ?level, "velocity counted");

        let reason = match level {
            RiskLevel::High => format!("{} transactions this hour exceeds {}", count, HIGH_ABOVE),
            RiskLevel::Medium => format!("{} transactions this hour", count),
            RiskLevel::Low => format!("Normal velocity ({} this hour)", count),
        };

        Ok(Some(
            DetectorResult::new(VELOCITY_DETECTOR_ID, score, confidence, reason)
                .with_metadata("count", count)
                .with_metadata("risk_level", format!("{:?}", level).to_lowercase()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use chrono::TimeZone;
    use parking_lot::Mutex;

    fn ctx_at(customer: Option<&str>, at: DateTime<Utc>) -> DetectionContext {
        let mut builder = DetectionContext::builder("org_1", "pi_1", 1000, "USD").timestamp(at);
        if let Some(c) = customer {
            builder = builder.customer_id(c);
        }
        builder.build()
    }

    #[test]
    fn test_velocity_key_format() {
        let at = Utc.with_ymd_and_hms(2024, 3, 7, 9, 59, 59).unwrap();
        assert_eq!(velocity_key("cus_1", at), "velocity:cus_1:2024-03-07-09");
    }

    fn manual_clock(start: DateTime<Utc>) -> (VelocityClock, Arc<Mutex<DateTime<Utc>>>) {
        let now = Arc::new(Mutex::new(start));
        let handle = now.clone();
        (Arc::new(move || *handle.lock()), now)
    }

    fn count(result: &DetectorResult) -> Option<f64> {
        result.metadata_value("count").and_then(|v| v.as_f64())
    }

    #[tokio::test]
    async fn test_counter_increments_within_hour_and_resets_next_hour() {
        let cache = Arc::new(MemoryCache::new());
        let base = Utc.with_ymd_and_hms(2024, 3, 7, 9, 0, 0).unwrap();
        let (clock, now) = manual_clock(base);
        let detector = VelocityDetector::with_clock(cache.clone(), clock);

        for n in 1..=3i64 {
            *now.lock() = base + chrono::Duration::minutes(n * 10);
            let result = detector.detect(&ctx_at(Some("cus_1"), base)).await.unwrap().unwrap();
            assert_eq!(count(&result), Some(n as f64));
        }

        *now.lock() = Utc.with_ymd_and_hms(2024, 3, 7, 10, 0, 1).unwrap();
        let result = detector.detect(&ctx_at(Some("cus_1"), base)).await.unwrap().unwrap();
        assert_eq!(count(&result), Some(1.0));
    }

    #[tokio::test]
    async fn test_stale_payment_timestamp_counts_in_current_hour() {
        let cache = Arc::new(MemoryCache::new());
        let now = Utc.with_ymd_and_hms(2024, 3, 7, 9, 30, 0).unwrap();
        let (clock, _) = manual_clock(now);
        let detector = VelocityDetector::with_clock(cache.clone(), clock);

        // Delivered late: created two hours and one week ago
        let stale = [
            now - chrono::Duration::hours(2),
            now - chrono::Duration::weeks(1),
            now,
        ];
        for (n, at) in stale.into_iter().enumerate() {
            let result = detector.detect(&ctx_at(Some("cus_1"), at)).await.unwrap().unwrap();
            assert_eq!(count(&result), Some((n + 1) as f64));
        }

        assert_eq!(cache.len(), 1);
        assert_eq!(
            cache.get(&velocity_key("cus_1", now)).await.unwrap(),
            Some("3".to_string())
        );
    }

    #[tokio::test]
    async fn test_thresholds() {
        let cache = Arc::new(MemoryCache::new());
        let detector = VelocityDetector::new(cache);
        let at = Utc.with_ymd_and_hms(2024, 3, 7, 9, 0, 0).unwrap();
        let ctx = ctx_at(Some("cus_1"), at);

        let mut results = Vec::new();
        for _ in 0..12 {
            results.push(detector.detect(&ctx).await.unwrap().unwrap());
        }

        // 4th transaction: low
        assert_eq!((results[3].score, results[3].confidence), (0.0, 80.0));
        // 5th and 10th: medium
        assert_eq!((results[4].score, results[4].confidence), (20.0, 70.0));
        assert_eq!((results[9].score, results[9].confidence), (20.0, 70.0));
        // 11th onwards: high
        assert_eq!((results[10].score, results[10].confidence), (40.0, 90.0));
        assert_eq!((results[11].score, results[11].confidence), (40.0, 90.0));
    }

    #[tokio::test]
    async fn test_anonymous_customer_is_low_and_untracked() {
        let cache = Arc::new(MemoryCache::new());
        let detector = VelocityDetector::new(cache.clone());

        let result = detector.detect(&ctx_at(None, Utc::now())).await.unwrap().unwrap();
        assert_eq!(result.score, 0.0);
        assert!(cache.is_empty());
    }
}
