//! Scoring strategies
//!
//! A strategy folds detector opinions into one 0-100 score and maps that
//! score onto a decision. The engine holds it as `Arc<dyn ScoringStrategy>`.

use crate::error::{Result, RuntimeError};
use riskgate_core::{Decision, DetectorResult};
use serde::{Deserialize, Serialize};

pub trait ScoringStrategy: Send + Sync {
    fn name(&self) -> &str;

    fn calculate_score(&self, results: &[DetectorResult]) -> Result<f64>;

    fn make_decision(&self, score: f64) -> Decision;
}

/// Score bands. `score < allow_below` allows, `score >= block_at` blocks,
/// everything in between goes to review.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecisionThresholds {
    #[serde(default = "default_allow_below")]
    pub allow_below: f64,
    #[serde(default = "default_block_at")]
    pub block_at: f64,
}

fn default_allow_below() -> f64 {
    30.0
}

fn default_block_at() -> f64 {
    70.0
}

impl Default for DecisionThresholds {
    fn default() -> Self {
        Self {
            allow_below: default_allow_below(),
            block_at: default_block_at(),
        }
    }
}

impl DecisionThresholds {
    pub fn new(allow_below: f64, block_at: f64) -> Result<Self> {
        let thresholds = Self {
            allow_below,
            block_at,
        };
        thresholds.validate()?;
        Ok(thresholds)
    }

    pub fn validate(&self) -> Result<()> {
        let in_range = |v: f64| v.is_finite() && (0.0..=100.0).contains(&v);
        if !in_range(self.allow_below) || !in_range(self.block_at) {
            return Err(RuntimeError::Config(
                "decision thresholds must be within 0..=100".to_string(),
            ));
        }
        if self.allow_below >= self.block_at {
            return Err(RuntimeError::Config(format!(
                "allow_below ({}) must be lower than block_at ({})",
                self.allow_below, self.block_at
            )));
        }
        Ok(())
    }

    pub fn decide(&self, score: f64) -> Decision {
        if score >= self.block_at {
            Decision::Block
        } else if score >= self.allow_below {
            Decision::Review
        } else {
            Decision::Allow
        }
    }
}

/// Confidence-weighted mean of detector scores
#[derive(Debug, Clone, Default)]
pub struct AdditiveStrategy {
    thresholds: DecisionThresholds,
}

impl AdditiveStrategy {
    pub fn new(thresholds: DecisionThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &DecisionThresholds {
        &self.thresholds
    }
}

impl ScoringStrategy for AdditiveStrategy {
    fn name(&self) -> &str {
        "additive"
    }

    fn calculate_score(&self, results: &[DetectorResult]) -> Result<f64> {
        let mut weighted = 0.0;
        let mut total_confidence = 0.0;

        for result in results {
            if !result.score.is_finite() || !result.confidence.is_finite() {
                return Err(RuntimeError::Scoring(format!(
                    "detector '{}' reported a non-finite value",
                    result.detector_id
                )));
            }
            weighted += result.score * result.confidence;
            total_confidence += result.confidence;
        }

        if total_confidence <= 0.0 {
            return Ok(0.0);
        }
        Ok((weighted / total_confidence).clamp(0.0, 100.0))
    }

    fn make_decision(&self, score: f64) -> Decision {
        self.thresholds.decide(score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn severity(d: Decision) -> u8 {
        match d {
            Decision::Allow => 0,
            Decision::Review => 1,
            Decision::Block => 2,
        }
    }

    #[test]
    fn test_no_results_scores_zero() {
        let strategy = AdditiveStrategy::default();
        assert_eq!(strategy.calculate_score(&[]).unwrap(), 0.0);
        assert_eq!(strategy.make_decision(0.0), Decision::Allow);
    }

    #[test]
    fn test_weighted_average() {
        let strategy = AdditiveStrategy::default();
        let results = vec![
            DetectorResult::new("velocity", 40.0, 90.0, "high"),
            DetectorResult::new("trust_score", 20.0, 80.0, "neutral"),
            DetectorResult::new("geolocation", 0.0, 90.0, "match"),
        ];

        // (40*90 + 20*80 + 0*90) / (90 + 80 + 90)
        let score = strategy.calculate_score(&results).unwrap();
        assert!((score - 20.0).abs() < 1e-9);
        assert_eq!(strategy.make_decision(score), Decision::Allow);
    }

    #[test]
    fn test_zero_confidence_carries_no_weight() {
        let strategy = AdditiveStrategy::default();
        let results = vec![
            DetectorResult::new("velocity", 0.0, 80.0, "low"),
            DetectorResult::new("trust_score", 20.0, 0.0, "cannot assess"),
        ];
        assert_eq!(strategy.calculate_score(&results).unwrap(), 0.0);

        let only_weightless = vec![DetectorResult::new("trust_score", 20.0, 0.0, "x")];
        assert_eq!(strategy.calculate_score(&only_weightless).unwrap(), 0.0);
    }

    #[test]
    fn test_non_finite_rejected() {
        let strategy = AdditiveStrategy::default();
        let mut bad = DetectorResult::new("broken", 10.0, 50.0, "x");
        bad.score = f64::NAN;
        assert!(matches!(
            strategy.calculate_score(&[bad]),
            Err(RuntimeError::Scoring(_))
        ));
    }

    #[test]
    fn test_threshold_boundaries() {
        let strategy = AdditiveStrategy::default();
        assert_eq!(strategy.make_decision(29.99), Decision::Allow);
        assert_eq!(strategy.make_decision(30.0), Decision::Review);
        assert_eq!(strategy.make_decision(69.99), Decision::Review);
        assert_eq!(strategy.make_decision(70.0), Decision::Block);
        assert_eq!(strategy.make_decision(100.0), Decision::Block);
    }

    #[test]
    fn test_decision_is_monotonic() {
        let strategy = AdditiveStrategy::default();
        let mut previous = Decision::Allow;
        for step in 0..=1000 {
            let decision = strategy.make_decision(step as f64 / 10.0);
            assert!(severity(decision) >= severity(previous));
            previous = decision;
        }
    }

    #[test]
    fn test_thresholds_validated() {
        assert!(DecisionThresholds::new(70.0, 30.0).is_err());
        assert!(DecisionThresholds::new(50.0, 50.0).is_err());
        assert!(DecisionThresholds::new(-1.0, 50.0).is_err());
        assert!(DecisionThresholds::new(20.0, 80.0).is_ok());
    }

    #[test]
    fn test_custom_thresholds() {
        let strategy = AdditiveStrategy::new(DecisionThresholds::new(10.0, 50.0).unwrap());
        assert_eq!(strategy.make_decision(20.0), Decision::Review);
        assert_eq!(strategy.make_decision(55.0), Decision::Block);
    }
}
