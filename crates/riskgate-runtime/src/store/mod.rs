//! Persistence boundary
//!
//! Keyed CRUD traits for the rows the pipeline reads and writes. The
//! storage engine itself is external; [`MemoryStore`] backs tests and
//! single-node runs, [`PgStore`] (feature `sqlx`) backs production.

mod memory;
#[cfg(feature = "sqlx")]
mod postgres;
mod record;

pub use memory::MemoryStore;
#[cfg(feature = "sqlx")]
pub use postgres::PgStore;
pub use record::DetectionRecord;

use crate::error::Result;
use async_trait::async_trait;
use riskgate_core::{CustomRule, CustomerTrustScore, TrustScoreEvent, WebhookEvent};

/// Trust score rows, keyed by (organization, customer)
#[async_trait]
pub trait TrustScoreRepository: Send + Sync {
    async fn find(&self, organization_id: &str, customer_id: &str)
        -> Result<Option<CustomerTrustScore>>;

    /// Insert `row` unless one already exists; returns the stored row
    async fn insert_if_absent(&self, row: &CustomerTrustScore) -> Result<CustomerTrustScore>;

    /// Load or create the row, apply `event` and persist it as one atomic
    /// step. Concurrent events for the same customer never overwrite each
    /// other. Returns the stored row.
    async fn apply_event(
        &self,
        organization_id: &str,
        customer_id: &str,
        event: TrustScoreEvent,
    ) -> Result<CustomerTrustScore>;
}

/// Merchant rules
#[async_trait]
pub trait RuleRepository: Send + Sync {
    /// Active rules ordered by ascending priority, at most `limit`
    async fn list_active(&self, organization_id: &str, limit: usize) -> Result<Vec<CustomRule>>;

    /// Every rule of the organization ordered by ascending priority
    async fn list(&self, organization_id: &str) -> Result<Vec<CustomRule>>;

    async fn get(&self, organization_id: &str, rule_id: &str) -> Result<Option<CustomRule>>;

    async fn count_active(&self, organization_id: &str) -> Result<usize>;

    async fn insert(&self, rule: &CustomRule) -> Result<()>;

    async fn update(&self, rule: &CustomRule) -> Result<()>;

    /// Returns false when the rule did not exist
    async fn delete(&self, organization_id: &str, rule_id: &str) -> Result<bool>;
}

/// One row per detection call
#[async_trait]
pub trait DetectionRepository: Send + Sync {
    async fn insert(&self, record: &DetectionRecord) -> Result<()>;

    async fn get(&self, id: &str) -> Result<Option<DetectionRecord>>;
}

/// Idempotency records for inbound provider events
#[async_trait]
pub trait WebhookEventRepository: Send + Sync {
    /// Atomically insert the event. Returns `false` when the event id is
    /// already recorded (duplicate delivery).
    async fn insert_if_absent(&self, event: &WebhookEvent) -> Result<bool>;

    async fn get(&self, event_id: &str) -> Result<Option<WebhookEvent>>;

    async fn mark_processed(&self, event_id: &str) -> Result<()>;

    /// Returns the new retry count
    async fn increment_retry(&self, event_id: &str) -> Result<u32>;
}
