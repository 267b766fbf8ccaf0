use super::Detector;
use crate::error::Result;
use crate::trust::TrustScoreService;
use async_trait::async_trait;
use riskgate_core::{DetectionContext, DetectorResult};
use std::sync::Arc;

pub const TRUST_SCORE_DETECTOR_ID: &str = "trust_score";

const CONFIDENCE: f64 = 80.0;

/// Maps the customer's trust score to risk
pub struct TrustScoreDetector {
    service: Arc<TrustScoreService>,
}

impl TrustScoreDetector {
    pub fn new(service: Arc<TrustScoreService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Detector for TrustScoreDetector {
    fn id(&self) -> &str {
        TRUST_SCORE_DETECTOR_ID
    }

    fn priority(&self) -> i32 {
        30
    }

    async fn detect(&self, context: &DetectionContext) -> Result<Option<DetectorResult>> {
        // Cannot assess: reported as medium but carries no weight
        let Some(customer_id) = context.customer() else {
            return Ok(Some(DetectorResult::new(
                TRUST_SCORE_DETECTOR_ID,
                20.0,
                0.0,
                "No customer id, trust cannot be assessed",
            )));
        };

        let trust = self
            .service
            .get_trust_score(&context.organization_id, customer_id)
            .await;

        let (score, reason) = if trust < 30 {
            (40.0, format!("Low trust score ({})", trust))
        } else if trust <= 70 {
            (20.0, format!("Neutral trust score ({})", trust))
        } else {
            (0.0, format!("High trust score ({})", trust))
        };

        Ok(Some(
            DetectorResult::new(TRUST_SCORE_DETECTOR_ID, score, CONFIDENCE, reason)
                .with_metadata("trust_score", trust as f64),
        ))
    }
}
