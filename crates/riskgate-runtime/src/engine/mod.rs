//! Detection engine
//!
//! Fans a transaction out to every registered detector on its own tokio
//! task, waits for all of them, and folds the surviving opinions through
//! the scoring strategy.

use crate::detector::Detector;
use crate::error::Result;
use crate::observability::{names, Metrics, MetricsCollector};
use crate::scoring::ScoringStrategy;
use chrono::Utc;
use futures::future::join_all;
use riskgate_core::{DetectionContext, DetectorResult, FraudDetectionResult};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

pub struct DetectionEngine {
    /// Sorted ascending by priority
    detectors: Vec<Arc<dyn Detector>>,
    strategy: Arc<dyn ScoringStrategy>,
    metrics: Arc<dyn Metrics>,
}

impl DetectionEngine {
    pub fn new(strategy: Arc<dyn ScoringStrategy>) -> Self {
        Self {
            detectors: Vec::new(),
            strategy,
            metrics: Arc::new(MetricsCollector::new()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Add a detector. Equal priorities keep registration order.
    pub fn register_detector(&mut self, detector: Arc<dyn Detector>) {
        debug!(
            detector = detector.id(),
            priority = detector.priority(),
            "registering detector"
        );
        self.detectors.push(detector);
        self.detectors.sort_by_key(|d| d.priority());
    }

    pub fn detector_ids(&self) -> Vec<&str> {
        self.detectors.iter().map(|d| d.id()).collect()
    }

    pub fn strategy(&self) -> &Arc<dyn ScoringStrategy> {
        &self.strategy
    }

    /// Run all applicable detectors concurrently and score the outcome.
    ///
    /// Individual detector failures, abstentions and panics are logged and
    /// omitted. Only a scoring failure fails the whole call.
    pub async fn detect(&self, context: Arc<DetectionContext>) -> Result<FraudDetectionResult> {
        let start = Instant::now();

        let applicable: Vec<Arc<dyn Detector>> = self
            .detectors
            .iter()
            .filter(|d| {
                let ok = d.validate(&context);
                if !ok {
                    debug!(detector = d.id(), "detector skipped by validation");
                }
                ok
            })
            .cloned()
            .collect();

        let handles = applicable.iter().map(|detector| {
            let detector = detector.clone();
            let context = context.clone();
            tokio::spawn(async move { detector.detect(&context).await })
        });
        let outcomes = join_all(handles).await;

        let mut results: Vec<DetectorResult> = Vec::with_capacity(outcomes.len());
        for (detector, outcome) in applicable.iter().zip(outcomes) {
            match outcome {
                Ok(Ok(Some(result))) => {
                    debug!(
                        detector = detector.id(),
                        score = result.score,
                        confidence = result.confidence,
                        "detector finished"
                    );
                    results.push(result);
                }
                Ok(Ok(None)) => {
                    debug!(detector = detector.id(), "detector abstained");
                    self.metrics.increment(names::DETECTOR_ABSTENTIONS);
                }
                Ok(Err(e)) => {
                    warn!(detector = detector.id(), "detector failed: {}", e);
                    self.metrics.increment(names::DETECTOR_FAILURES);
                }
                Err(join_error) => {
                    warn!(detector = detector.id(), "detector task aborted: {}", join_error);
                    self.metrics.increment(names::DETECTOR_FAILURES);
                }
            }
        }

        let score = self.strategy.calculate_score(&results)?;
        let decision = self.strategy.make_decision(score);

        let elapsed = start.elapsed();
        self.metrics
            .record_execution_time(names::DETECTION_SECONDS, elapsed);

        Ok(FraudDetectionResult {
            decision,
            score,
            detector_results: results,
            execution_time_ms: elapsed.as_millis() as u64,
            timestamp: Utc::now(),
        })
    }
}
