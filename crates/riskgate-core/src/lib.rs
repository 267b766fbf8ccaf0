//! RiskGate Core - shared types for the fraud decision pipeline
//!
//! - Transaction context handed to detectors
//! - Detector results, decisions and the detection envelope
//! - Custom rule condition trees
//! - Trust score rows and events
//! - Webhook idempotency records

pub mod context;
pub mod decision;
pub mod error;
pub mod rule;
pub mod trust;
pub mod value;
pub mod webhook;

pub use context::{DetectionContext, DetectionContextBuilder};
pub use decision::{Decision, DetectorResult, FraudDetectionResult, RiskLevel};
pub use error::{CoreError, Result};
pub use rule::{
    ComparisonOperator, CustomRule, LeafCondition, LogicalCondition, LogicalOperator,
    RuleCondition, RuleDraft, RuleField, MAX_ACTIVE_RULES,
};
pub use trust::{CustomerTrustScore, TrustScoreEvent, TrustStatus, DEFAULT_TRUST_SCORE};
pub use value::Value;
pub use webhook::WebhookEvent;
