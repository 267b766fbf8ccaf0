//! Transaction context handed to detectors and rule evaluation

use crate::value::Value;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Immutable description of one transaction under evaluation.
///
/// Built once by the ingestion layer and shared (behind an `Arc`) with every
/// detector. There are no setters; use [`DetectionContextBuilder`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionContext {
    pub organization_id: String,
    pub payment_id: String,
    pub customer_id: Option<String>,
    /// Amount in minor currency units (cents)
    pub amount: i64,
    /// ISO 4217 code, upper-case
    pub currency: String,
    pub customer_email: Option<String>,
    pub customer_ip: Option<String>,
    /// ISO 3166-1 alpha-2 code of the card issuer
    pub card_country: Option<String>,
    pub card_last4: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    pub timestamp: DateTime<Utc>,
}

impl DetectionContext {
    pub fn builder(
        organization_id: impl Into<String>,
        payment_id: impl Into<String>,
        amount: i64,
        currency: impl Into<String>,
    ) -> DetectionContextBuilder {
        DetectionContextBuilder::new(organization_id, payment_id, amount, currency)
    }

    /// Customer id, treating blank strings as anonymous
    pub fn customer(&self) -> Option<&str> {
        self.customer_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    pub fn metadata_flag(&self, key: &str) -> bool {
        self.metadata.get(key).map(Value::is_truthy).unwrap_or(false)
    }
}

/// Builder for [`DetectionContext`]
#[derive(Debug, Clone)]
pub struct DetectionContextBuilder {
    inner: DetectionContext,
}

impl DetectionContextBuilder {
    pub fn new(
        organization_id: impl Into<String>,
        payment_id: impl Into<String>,
        amount: i64,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            inner: DetectionContext {
                organization_id: organization_id.into(),
                payment_id: payment_id.into(),
                customer_id: None,
                amount,
                currency: currency.into().to_ascii_uppercase(),
                customer_email: None,
                customer_ip: None,
                card_country: None,
                card_last4: None,
                metadata: HashMap::new(),
                timestamp: Utc::now(),
            },
        }
    }

    pub fn customer_id(mut self, id: impl Into<String>) -> Self {
        self.inner.customer_id = Some(id.into());
        self
    }

    pub fn customer_email(mut self, email: impl Into<String>) -> Self {
        self.inner.customer_email = Some(email.into());
        self
    }

    pub fn customer_ip(mut self, ip: impl Into<String>) -> Self {
        self.inner.customer_ip = Some(ip.into());
        self
    }

    pub fn card_country(mut self, country: impl Into<String>) -> Self {
        self.inner.card_country = Some(country.into().to_ascii_uppercase());
        self
    }

    pub fn card_last4(mut self, last4: impl Into<String>) -> Self {
        self.inner.card_last4 = Some(last4.into());
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.inner.metadata.insert(key.into(), value.into());
        self
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.inner.timestamp = timestamp;
        self
    }

    pub fn build(self) -> DetectionContext {
        self.inner
    }
}
