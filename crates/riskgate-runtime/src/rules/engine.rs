use super::evaluator::evaluate_condition;
use super::summary::DetectorSummary;
use crate::cache::{self, CacheStore};
use crate::error::Result;
use crate::observability::{names, Metrics, MetricsCollector};
use crate::store::RuleRepository;
use riskgate_core::{CustomRule, Decision, DetectionContext, MAX_ACTIVE_RULES};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const DEFAULT_RULE_CACHE_TTL: Duration = Duration::from_secs(300);
const DEFAULT_SLOW_EVALUATION: Duration = Duration::from_millis(10);

pub fn rules_cache_key(organization_id: &str) -> String {
    format!("custom_rules:{}", organization_id)
}

/// The rule that decided the outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedRule {
    pub id: String,
    pub name: String,
    pub action: Decision,
}

impl From<&CustomRule> for MatchedRule {
    fn from(rule: &CustomRule) -> Self {
        Self {
            id: rule.id.clone(),
            name: rule.name.clone(),
            action: rule.action,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleOutcome {
    pub decision: Decision,
    pub matched_rule: Option<MatchedRule>,
}

impl RuleOutcome {
    pub fn unchanged(decision: Decision) -> Self {
        Self {
            decision,
            matched_rule: None,
        }
    }
}

/// Applies an organization's active rules on top of the scored decision
pub struct CustomRuleEngine {
    cache: Arc<dyn CacheStore>,
    store: Arc<dyn RuleRepository>,
    ttl: Duration,
    slow_after: Duration,
    metrics: Arc<dyn Metrics>,
}

impl CustomRuleEngine {
    pub fn new(cache: Arc<dyn CacheStore>, store: Arc<dyn RuleRepository>) -> Self {
        Self {
            cache,
            store,
            ttl: DEFAULT_RULE_CACHE_TTL,
            slow_after: DEFAULT_SLOW_EVALUATION,
            metrics: Arc::new(MetricsCollector::new()),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Evaluations slower than this are logged as warnings
    pub fn with_slow_threshold(mut self, slow_after: Duration) -> Self {
        self.slow_after = slow_after;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Active rules in evaluation order. Cache problems fall through to
    /// the store; store problems are returned.
    pub async fn active_rules(&self, organization_id: &str) -> Result<Vec<CustomRule>> {
        let key = rules_cache_key(organization_id);

        match cache::get_json::<Vec<CustomRule>>(self.cache.as_ref(), &key).await {
            Ok(Some(rules)) => return Ok(rules),
            Ok(None) => {}
            Err(e) => warn!(key = %key, "rule cache read failed: {}", e),
        }

        let rules = self
            .store
            .list_active(organization_id, MAX_ACTIVE_RULES)
            .await?;

        if let Err(e) = cache::set_json(self.cache.as_ref(), &key, &rules, self.ttl).await {
            warn!(key = %key, "rule cache write failed: {}", e);
        }
        Ok(rules)
    }

    /// First matching rule wins and its action replaces `current`
    /// outright, in either direction. Rules that fail to evaluate are
    /// skipped. If the rules cannot be loaded `current` is returned.
    pub async fn apply_custom_rules(
        &self,
        organization_id: &str,
        context: &DetectionContext,
        summary: &DetectorSummary,
        current: Decision,
    ) -> RuleOutcome {
        let start = Instant::now();

        let rules = match self.active_rules(organization_id).await {
            Ok(rules) => rules,
            Err(e) => {
                warn!(organization_id, "custom rules unavailable, keeping decision: {}", e);
                return RuleOutcome::unchanged(current);
            }
        };

        let mut outcome = RuleOutcome::unchanged(current);
        for rule in &rules {
            match evaluate_condition(&rule.condition, context, summary) {
                Ok(true) => {
                    info!(
                        organization_id,
                        rule_id = %rule.id,
                        rule = %rule.name,
                        from = %current,
                        to = %rule.action,
                        "custom rule matched"
                    );
                    self.metrics.increment(names::RULE_OVERRIDES);
                    outcome = RuleOutcome {
                        decision: rule.action,
                        matched_rule: Some(MatchedRule::from(rule)),
                    };
                    break;
                }
                Ok(false) => debug!(rule_id = %rule.id, "custom rule did not match"),
                Err(e) => {
                    warn!(rule_id = %rule.id, "skipping custom rule: {}", e);
                    self.metrics.increment(names::RULE_ERRORS);
                }
            }
        }

        let elapsed = start.elapsed();
        self.metrics
            .record_execution_time(names::RULE_EVALUATION_SECONDS, elapsed);
        if elapsed > self.slow_after {
            warn!(
                organization_id,
                elapsed_ms = elapsed.as_millis() as u64,
                rules = rules.len(),
                "custom rule evaluation was slow"
            );
        }

        outcome
    }
}
