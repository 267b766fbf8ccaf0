//! Inbound provider event records used for de-duplication

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One delivery of a provider event.
///
/// `event_id` is globally unique; stores enforce it with a unique constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub event_id: String,
    pub event_type: String,
    pub organization_id: String,
    pub processed: bool,
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WebhookEvent {
    pub fn received(
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        organization_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            event_id: event_id.into(),
            event_type: event_type.into(),
            organization_id: organization_id.into(),
            processed: false,
            retry_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}
