//! RiskGate SDK
//!
//! High-level API for the fraud decision pipeline: build a
//! [`FraudDetector`], call [`FraudDetector::detect_fraud`], or feed
//! provider webhooks through a [`WebhookGate`].

pub mod builder;
pub mod config;
pub mod error;
pub mod fraud_detector;
pub mod webhook;

// Re-export main types
pub use builder::FraudDetectorBuilder;
pub use config::EngineConfig;
pub use error::{Result, SdkError};
pub use fraud_detector::{trust_event_for, FraudDecision, FraudDetector};
pub use webhook::{SignatureVerifier, WebhookEnvelope, WebhookGate, WebhookReceipt, SIGNATURE_HEADER};

// Re-export commonly used types from dependencies
pub use riskgate_core::{
    CustomRule, CustomerTrustScore, Decision, DetectionContext, DetectorResult, FraudDetectionResult,
    RuleDraft, TrustScoreEvent, Value,
};
pub use riskgate_runtime::{MatchedRule, MetricsCollector, RuntimeError};
