//! REST API type definitions
//!
//! Request and response types for the REST API endpoints.

use riskgate_sdk::{CustomerTrustScore, FraudDetector, TrustScoreEvent, WebhookGate, WebhookReceipt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub detector: Arc<FraudDetector>,
    pub gate: WebhookGate,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Webhook acknowledgement
#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub received: bool,
    pub duplicate: bool,
}

impl From<WebhookReceipt> for WebhookResponse {
    fn from(receipt: WebhookReceipt) -> Self {
        Self {
            received: receipt.received,
            duplicate: receipt.duplicate,
        }
    }
}

/// Manual trust list operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustAction {
    Whitelist,
    Blacklist,
}

impl From<TrustAction> for TrustScoreEvent {
    fn from(action: TrustAction) -> Self {
        match action {
            TrustAction::Whitelist => TrustScoreEvent::Whitelisted,
            TrustAction::Blacklist => TrustScoreEvent::Blacklisted,
        }
    }
}

/// Body of `POST .../trust`
#[derive(Debug, Deserialize)]
pub struct TrustUpdateRequest {
    pub action: TrustAction,
}

/// Trust score as returned by the admin API
#[derive(Debug, Serialize, Deserialize)]
pub struct TrustScorePayload {
    pub customer_id: String,
    pub score: u8,
    pub status: String,
    pub transaction_count: u32,
    pub fraud_count: u32,
}

impl From<CustomerTrustScore> for TrustScorePayload {
    fn from(row: CustomerTrustScore) -> Self {
        Self {
            customer_id: row.customer_id,
            score: row.score,
            status: row.status.as_str().to_string(),
            transaction_count: row.transaction_count,
            fraud_count: row.fraud_count,
        }
    }
}
