//! Pipeline configuration

use crate::error::{Result, SdkError};
use riskgate_runtime::{DecisionThresholds, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for the fraud decision pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Score bands shared by the whole pipeline
    pub thresholds: DecisionThresholds,

    /// Detections slower than this are logged as warnings
    pub latency_budget_ms: u64,

    /// Rule evaluations slower than this are logged as warnings
    pub rule_eval_warn_ms: u64,

    pub trust_cache_ttl_secs: u64,

    pub rule_cache_ttl_secs: u64,

    /// Retry policy for background jobs
    pub job_retry: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            thresholds: DecisionThresholds::default(),
            latency_budget_ms: 500,
            rule_eval_warn_ms: 10,
            trust_cache_ttl_secs: 3600,
            rule_cache_ttl_secs: 300,
            job_retry: RetryPolicy::default(),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thresholds(mut self, thresholds: DecisionThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_latency_budget(mut self, budget: Duration) -> Self {
        self.latency_budget_ms = budget.as_millis() as u64;
        self
    }

    pub fn with_job_retry(mut self, policy: RetryPolicy) -> Self {
        self.job_retry = policy;
        self
    }

    pub fn latency_budget(&self) -> Duration {
        Duration::from_millis(self.latency_budget_ms)
    }

    pub fn rule_eval_warn(&self) -> Duration {
        Duration::from_millis(self.rule_eval_warn_ms)
    }

    pub fn trust_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.trust_cache_ttl_secs)
    }

    pub fn rule_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.rule_cache_ttl_secs)
    }

    pub fn validate(&self) -> Result<()> {
        self.thresholds
            .validate()
            .map_err(|e| SdkError::ConfigError(e.to_string()))?;
        if self.trust_cache_ttl_secs == 0 || self.rule_cache_ttl_secs == 0 {
            return Err(SdkError::ConfigError(
                "cache TTLs must be at least one second".to_string(),
            ));
        }
        if self.job_retry.max_attempts == 0 {
            return Err(SdkError::ConfigError(
                "job_retry.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
