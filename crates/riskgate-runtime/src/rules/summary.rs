use crate::detector::{GEOLOCATION_DETECTOR_ID, TRUST_SCORE_DETECTOR_ID, VELOCITY_DETECTOR_ID};
use riskgate_core::FraudDetectionResult;
use serde::{Deserialize, Serialize};

/// Detector-derived facts that rule conditions can reference
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectorSummary {
    /// Transactions this hour, from the velocity detector
    pub velocity: Option<f64>,
    pub trust_score: Option<f64>,
    /// Country resolved from the customer IP
    pub ip_country: Option<String>,
    /// Aggregate score
    pub risk_score: f64,
}

impl DetectorSummary {
    pub fn from_result(result: &FraudDetectionResult) -> Self {
        let metadata_number = |detector: &str, key: &str| {
            result
                .detector(detector)
                .and_then(|r| r.metadata_value(key))
                .and_then(|v| v.as_f64())
        };

        Self {
            velocity: metadata_number(VELOCITY_DETECTOR_ID, "count"),
            trust_score: metadata_number(TRUST_SCORE_DETECTOR_ID, "trust_score"),
            ip_country: result
                .detector(GEOLOCATION_DETECTOR_ID)
                .and_then(|r| r.metadata_value("ip_country"))
                .and_then(|v| v.as_str())
                .map(str::to_string),
            risk_score: result.score,
        }
    }
}
