use crate::error::{Result, SdkError};
use chrono::{TimeZone, Utc};
use riskgate_core::{DetectionContext, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Provider event as delivered to the webhook endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEnvelope {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    /// Merchant account the event belongs to
    #[serde(alias = "account")]
    pub organization_id: String,
    /// Unix seconds
    #[serde(default)]
    pub created: Option<i64>,
    pub data: EventData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventData {
    pub object: PaymentObject,
}

/// Payment, charge or dispute object carried by the event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentObject {
    pub id: String,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default, alias = "receipt_email")]
    pub customer_email: Option<String>,
    #[serde(default, alias = "client_ip")]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub card: Option<CardDetails>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardDetails {
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub last4: Option<String>,
}

/// What the gate does with an event type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Run fraud detection
    Payment,
    /// Later stage of a payment already evaluated on creation
    Settlement,
    /// Record a chargeback against the customer's trust score
    Dispute,
    /// Recorded and acknowledged only
    Ignored,
}

impl EventKind {
    pub fn of(event_type: &str) -> Self {
        match event_type {
            "payment_intent.created" => EventKind::Payment,
            "payment_intent.succeeded" | "charge.succeeded" => EventKind::Settlement,
            "charge.dispute.created" => EventKind::Dispute,
            _ => EventKind::Ignored,
        }
    }
}

impl WebhookEnvelope {
    pub fn parse(body: &[u8]) -> Result<Self> {
        let envelope: WebhookEnvelope =
            serde_json::from_slice(body).map_err(|e| SdkError::PayloadError(e.to_string()))?;
        if envelope.id.trim().is_empty() {
            return Err(SdkError::PayloadError("event id is empty".to_string()));
        }
        if envelope.organization_id.trim().is_empty() {
            return Err(SdkError::PayloadError("organization id is empty".to_string()));
        }
        Ok(envelope)
    }

    pub fn kind(&self) -> EventKind {
        EventKind::of(&self.event_type)
    }

    /// Detection input for a payment event
    pub fn to_detection_context(&self) -> Result<DetectionContext> {
        let object = &self.data.object;
        let amount = object
            .amount
            .ok_or_else(|| SdkError::PayloadError("payment has no amount".to_string()))?;
        let currency = object
            .currency
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| SdkError::PayloadError("payment has no currency".to_string()))?;

        let mut builder =
            DetectionContext::builder(&self.organization_id, &object.id, amount, currency);
        if let Some(customer) = &object.customer {
            builder = builder.customer_id(customer);
        }
        if let Some(email) = &object.customer_email {
            builder = builder.customer_email(email);
        }
        if let Some(ip) = &object.ip_address {
            builder = builder.customer_ip(ip);
        }
        if let Some(card) = &object.card {
            if let Some(country) = &card.country {
                builder = builder.card_country(country);
            }
            if let Some(last4) = &card.last4 {
                builder = builder.card_last4(last4);
            }
        }
        for (key, value) in &object.metadata {
            builder = builder.metadata(key, value.clone());
        }
        if let Some(created) = self.created.and_then(|t| Utc.timestamp_opt(t, 0).single()) {
            builder = builder.timestamp(created);
        }
        Ok(builder.build())
    }
}
