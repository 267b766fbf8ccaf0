use crate::error::Result;
use chrono::{DateTime, Utc};
use riskgate_core::{Decision, DetectionContext, FraudDetectionResult};
use serde::{Deserialize, Serialize};

/// Persisted outcome of one detection call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub id: String,
    pub organization_id: String,
    pub payment_id: String,
    pub customer_id: Option<String>,
    pub customer_email: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub decision: Decision,
    pub score: f64,
    /// Detector results as stored JSON
    pub detector_results: serde_json::Value,
    pub matched_rule_id: Option<String>,
    pub execution_time_ms: u64,
    pub created_at: DateTime<Utc>,
}

impl DetectionRecord {
    pub fn new(
        context: &DetectionContext,
        result: &FraudDetectionResult,
        matched_rule_id: Option<String>,
    ) -> Result<Self> {
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            organization_id: context.organization_id.clone(),
            payment_id: context.payment_id.clone(),
            customer_id: context.customer().map(str::to_string),
            customer_email: context.customer_email.clone(),
            amount: context.amount,
            currency: context.currency.clone(),
            decision: result.decision,
            score: result.score,
            detector_results: serde_json::to_value(&result.detector_results)?,
            matched_rule_id,
            execution_time_ms: result.execution_time_ms,
            created_at: result.timestamp,
        })
    }
}
