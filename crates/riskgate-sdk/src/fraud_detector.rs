//! Fraud decision orchestrator
//!
//! `detect_fraud` runs the engine, applies custom rules, persists the
//! outcome and queues follow-up jobs. It always produces a decision:
//! engine failures degrade to manual review and persistence failures are
//! only logged.

use crate::config::EngineConfig;
use crate::error::Result;
use riskgate_core::{Decision, DetectionContext, FraudDetectionResult, TrustScoreEvent};
use riskgate_runtime::observability::names;
use riskgate_runtime::{
    CustomRuleEngine, DetectionEngine, DetectionRecord, DetectionRepository, DetectorSummary, Job,
    JobDispatcher, MatchedRule, Metrics, MetricsCollector, RuleService, TrustScoreService,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Outcome of one detection call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudDecision {
    /// Engine result; `decision` reflects any custom rule override
    pub result: FraudDetectionResult,
    pub matched_rule: Option<MatchedRule>,
    /// Id of the persisted detection record, absent if persistence failed
    pub record_id: Option<String>,
}

impl FraudDecision {
    pub fn decision(&self) -> Decision {
        self.result.decision
    }
}

/// Trust event implied by a final decision
pub fn trust_event_for(decision: Decision) -> Option<TrustScoreEvent> {
    match decision {
        Decision::Allow => Some(TrustScoreEvent::SuccessfulPayment),
        Decision::Block => Some(TrustScoreEvent::BlockedTransaction),
        Decision::Review => None,
    }
}

pub struct FraudDetector {
    pub(crate) config: EngineConfig,
    pub(crate) engine: DetectionEngine,
    pub(crate) rules: CustomRuleEngine,
    pub(crate) rule_service: Arc<RuleService>,
    pub(crate) trust: Arc<TrustScoreService>,
    pub(crate) detections: Arc<dyn DetectionRepository>,
    pub(crate) jobs: JobDispatcher,
    pub(crate) metrics: Arc<MetricsCollector>,
}

impl FraudDetector {
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn rule_service(&self) -> Arc<RuleService> {
        self.rule_service.clone()
    }

    pub fn trust_service(&self) -> Arc<TrustScoreService> {
        self.trust.clone()
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    pub fn jobs(&self) -> &JobDispatcher {
        &self.jobs
    }

    /// Queue a background job
    pub fn dispatch(&self, job: Job) -> Result<()> {
        Ok(self.jobs.dispatch(job)?)
    }

    /// Score a transaction and decide ALLOW, REVIEW or BLOCK
    pub async fn detect_fraud(&self, context: DetectionContext) -> FraudDecision {
        let start = Instant::now();
        let context = Arc::new(context);

        let mut result = match self.engine.detect(context.clone()).await {
            Ok(result) => result,
            Err(e) => {
                warn!(
                    organization_id = %context.organization_id,
                    payment_id = %context.payment_id,
                    "detection engine failed, falling back to manual review: {}",
                    e
                );
                self.metrics.increment(names::ENGINE_FAILURES);
                FraudDetectionResult::manual_review(start.elapsed().as_millis() as u64)
            }
        };

        let summary = DetectorSummary::from_result(&result);
        let outcome = self
            .rules
            .apply_custom_rules(&context.organization_id, &context, &summary, result.decision)
            .await;
        result.decision = outcome.decision;

        let elapsed = start.elapsed();
        if elapsed > self.config.latency_budget() {
            warn!(
                payment_id = %context.payment_id,
                elapsed_ms = elapsed.as_millis() as u64,
                budget_ms = self.config.latency_budget_ms,
                "detection exceeded latency budget"
            );
        }

        let matched_rule_id = outcome.matched_rule.as_ref().map(|r| r.id.clone());
        let record_id = match self.persist(&context, &result, matched_rule_id).await {
            Ok(record_id) => {
                self.dispatch_follow_ups(&context, result.decision, &record_id);
                Some(record_id)
            }
            Err(e) => {
                error!(
                    payment_id = %context.payment_id,
                    "failed to persist detection, returning decision anyway: {}",
                    e
                );
                self.metrics.increment(names::PERSISTENCE_FAILURES);
                None
            }
        };

        self.metrics.increment(match result.decision {
            Decision::Allow => names::DECISIONS_ALLOW,
            Decision::Review => names::DECISIONS_REVIEW,
            Decision::Block => names::DECISIONS_BLOCK,
        });

        info!(
            organization_id = %context.organization_id,
            payment_id = %context.payment_id,
            decision = %result.decision,
            score = result.score,
            detectors = result.detector_results.len(),
            matched_rule = ?outcome.matched_rule.as_ref().map(|r| r.id.as_str()),
            elapsed_ms = elapsed.as_millis() as u64,
            "fraud decision"
        );

        FraudDecision {
            result,
            matched_rule: outcome.matched_rule,
            record_id,
        }
    }

    async fn persist(
        &self,
        context: &DetectionContext,
        result: &FraudDetectionResult,
        matched_rule_id: Option<String>,
    ) -> Result<String> {
        let record = DetectionRecord::new(context, result, matched_rule_id)?;
        self.detections.insert(&record).await?;
        Ok(record.id)
    }

    fn dispatch_follow_ups(&self, context: &DetectionContext, decision: Decision, record_id: &str) {
        if let (Some(customer_id), Some(event)) = (context.customer(), trust_event_for(decision)) {
            let job = Job::UpdateTrustScore {
                organization_id: context.organization_id.clone(),
                customer_id: customer_id.to_string(),
                event,
            };
            if let Err(e) = self.jobs.dispatch(job) {
                warn!(payment_id = %context.payment_id, "trust score job not queued: {}", e);
            }
        }

        let job = Job::GenerateExplanation {
            organization_id: context.organization_id.clone(),
            record_id: record_id.to_string(),
        };
        if let Err(e) = self.jobs.dispatch(job) {
            warn!(record_id, "explanation job not queued: {}", e);
        }
    }
}
