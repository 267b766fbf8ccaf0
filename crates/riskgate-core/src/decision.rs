//! Decisions and detector opinions

use crate::error::CoreError;
use crate::value::Value;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Final outcome for a payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    Allow,
    Review,
    Block,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Allow => "ALLOW",
            Decision::Review => "REVIEW",
            Decision::Block => "BLOCK",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Decision {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ALLOW" => Ok(Decision::Allow),
            "REVIEW" => Ok(Decision::Review),
            "BLOCK" => Ok(Decision::Block),
            other => Err(CoreError::InvalidValue(format!("unknown decision '{}'", other))),
        }
    }
}

/// Coarse risk band a detector reports alongside its score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// One detector's opinion about a transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorResult {
    pub detector_id: String,
    /// 0-100
    pub score: f64,
    /// 0-100
    pub confidence: f64,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, Value>>,
}

impl DetectorResult {
    pub fn new(
        detector_id: impl Into<String>,
        score: f64,
        confidence: f64,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            detector_id: detector_id.into(),
            score: score.clamp(0.0, 100.0),
            confidence: confidence.clamp(0.0, 100.0),
            reason: reason.into(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn metadata_value(&self, key: &str) -> Option<&Value> {
        self.metadata.as_ref().and_then(|m| m.get(key))
    }
}

/// Envelope returned by the detection engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudDetectionResult {
    pub decision: Decision,
    /// Aggregate score, 0-100
    pub score: f64,
    pub detector_results: Vec<DetectorResult>,
    pub execution_time_ms: u64,
    pub timestamp: DateTime<Utc>,
}

impl FraudDetectionResult {
    /// Conservative stand-in used when the engine itself fails
    pub fn manual_review(execution_time_ms: u64) -> Self {
        Self {
            decision: Decision::Review,
            score: 50.0,
            detector_results: Vec::new(),
            execution_time_ms,
            timestamp: Utc::now(),
        }
    }

    pub fn detector(&self, detector_id: &str) -> Option<&DetectorResult> {
        self.detector_results
            .iter()
            .find(|r| r.detector_id == detector_id)
    }
}
