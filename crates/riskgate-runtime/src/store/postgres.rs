//! Postgres store (feature `sqlx`)

use super::{
    DetectionRecord, DetectionRepository, RuleRepository, TrustScoreRepository,
    WebhookEventRepository,
};
use crate::error::{Result, RuntimeError};
use async_trait::async_trait;
use riskgate_core::{CustomRule, CustomerTrustScore, TrustScoreEvent, TrustStatus, WebhookEvent};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::time::Duration;

const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS customer_trust_scores (
        organization_id TEXT NOT NULL,
        customer_id TEXT NOT NULL,
        score SMALLINT NOT NULL,
        status TEXT NOT NULL,
        transaction_count INTEGER NOT NULL DEFAULT 0,
        fraud_count INTEGER NOT NULL DEFAULT 0,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL,
        PRIMARY KEY (organization_id, customer_id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS custom_rules (
        id TEXT PRIMARY KEY,
        organization_id TEXT NOT NULL,
        name TEXT NOT NULL,
        condition JSONB NOT NULL,
        action TEXT NOT NULL,
        priority INTEGER NOT NULL,
        active BOOLEAN NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )"#,
    r#"CREATE INDEX IF NOT EXISTS custom_rules_org_priority
        ON custom_rules (organization_id, priority)"#,
    r#"CREATE TABLE IF NOT EXISTS fraud_detections (
        id TEXT PRIMARY KEY,
        organization_id TEXT NOT NULL,
        payment_id TEXT NOT NULL,
        customer_id TEXT,
        customer_email TEXT,
        amount BIGINT NOT NULL,
        currency TEXT NOT NULL,
        decision TEXT NOT NULL,
        score DOUBLE PRECISION NOT NULL,
        detector_results JSONB NOT NULL,
        matched_rule_id TEXT,
        execution_time_ms BIGINT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS webhook_events (
        event_id TEXT PRIMARY KEY,
        event_type TEXT NOT NULL,
        organization_id TEXT NOT NULL,
        processed BOOLEAN NOT NULL DEFAULT FALSE,
        retry_count INTEGER NOT NULL DEFAULT 0,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )"#,
];

fn db_err(context: &str, e: sqlx::Error) -> RuntimeError {
    RuntimeError::Storage(format!("{}: {}", context, e))
}

/// Postgres implementation of all repositories
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(url)
            .await
            .map_err(|e| db_err("connect", e))?;
        tracing::info!("Connected to Postgres store");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create tables when missing
    pub async fn ensure_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| db_err("ensure schema", e))?;
        }
        Ok(())
    }

    fn trust_from_row(row: &PgRow) -> Result<CustomerTrustScore> {
        let status: String = row.try_get("status").map_err(|e| db_err("status", e))?;
        let score: i16 = row.try_get("score").map_err(|e| db_err("score", e))?;
        let transaction_count: i32 = row
            .try_get("transaction_count")
            .map_err(|e| db_err("transaction_count", e))?;
        let fraud_count: i32 = row
            .try_get("fraud_count")
            .map_err(|e| db_err("fraud_count", e))?;
        Ok(CustomerTrustScore {
            organization_id: row
                .try_get("organization_id")
                .map_err(|e| db_err("organization_id", e))?,
            customer_id: row
                .try_get("customer_id")
                .map_err(|e| db_err("customer_id", e))?,
            score: score.clamp(0, 100) as u8,
            status: TrustStatus::parse(&status).unwrap_or(TrustStatus::Normal),
            transaction_count: transaction_count.max(0) as u32,
            fraud_count: fraud_count.max(0) as u32,
            created_at: row.try_get("created_at").map_err(|e| db_err("created_at", e))?,
            updated_at: row.try_get("updated_at").map_err(|e| db_err("updated_at", e))?,
        })
    }

    fn rule_from_row(row: &PgRow) -> Result<CustomRule> {
        let condition: serde_json::Value =
            row.try_get("condition").map_err(|e| db_err("condition", e))?;
        let action: String = row.try_get("action").map_err(|e| db_err("action", e))?;
        Ok(CustomRule {
            id: row.try_get("id").map_err(|e| db_err("id", e))?,
            organization_id: row
                .try_get("organization_id")
                .map_err(|e| db_err("organization_id", e))?,
            name: row.try_get("name").map_err(|e| db_err("name", e))?,
            condition: serde_json::from_value(condition)?,
            action: action.parse()?,
            priority: row.try_get("priority").map_err(|e| db_err("priority", e))?,
            active: row.try_get("active").map_err(|e| db_err("active", e))?,
            created_at: row.try_get("created_at").map_err(|e| db_err("created_at", e))?,
            updated_at: row.try_get("updated_at").map_err(|e| db_err("updated_at", e))?,
        })
    }

    fn detection_from_row(row: &PgRow) -> Result<DetectionRecord> {
        let decision: String = row.try_get("decision").map_err(|e| db_err("decision", e))?;
        let execution_time_ms: i64 = row
            .try_get("execution_time_ms")
            .map_err(|e| db_err("execution_time_ms", e))?;
        Ok(DetectionRecord {
            id: row.try_get("id").map_err(|e| db_err("id", e))?,
            organization_id: row
                .try_get("organization_id")
                .map_err(|e| db_err("organization_id", e))?,
            payment_id: row.try_get("payment_id").map_err(|e| db_err("payment_id", e))?,
            customer_id: row.try_get("customer_id").map_err(|e| db_err("customer_id", e))?,
            customer_email: row
                .try_get("customer_email")
                .map_err(|e| db_err("customer_email", e))?,
            amount: row.try_get("amount").map_err(|e| db_err("amount", e))?,
            currency: row.try_get("currency").map_err(|e| db_err("currency", e))?,
            decision: decision.parse()?,
            score: row.try_get("score").map_err(|e| db_err("score", e))?,
            detector_results: row
                .try_get("detector_results")
                .map_err(|e| db_err("detector_results", e))?,
            matched_rule_id: row
                .try_get("matched_rule_id")
                .map_err(|e| db_err("matched_rule_id", e))?,
            execution_time_ms: execution_time_ms.max(0) as u64,
            created_at: row.try_get("created_at").map_err(|e| db_err("created_at", e))?,
        })
    }

    fn webhook_from_row(row: &PgRow) -> Result<WebhookEvent> {
        let retry_count: i32 = row
            .try_get("retry_count")
            .map_err(|e| db_err("retry_count", e))?;
        Ok(WebhookEvent {
            event_id: row.try_get("event_id").map_err(|e| db_err("event_id", e))?,
            event_type: row.try_get("event_type").map_err(|e| db_err("event_type", e))?,
            organization_id: row
                .try_get("organization_id")
                .map_err(|e| db_err("organization_id", e))?,
            processed: row.try_get("processed").map_err(|e| db_err("processed", e))?,
            retry_count: retry_count.max(0) as u32,
            created_at: row.try_get("created_at").map_err(|e| db_err("created_at", e))?,
            updated_at: row.try_get("updated_at").map_err(|e| db_err("updated_at", e))?,
        })
    }
}

#[async_trait]
impl TrustScoreRepository for PgStore {
    async fn find(
        &self,
        organization_id: &str,
        customer_id: &str,
    ) -> Result<Option<CustomerTrustScore>> {
        let row = sqlx::query(
            "SELECT * FROM customer_trust_scores WHERE organization_id = $1 AND customer_id = $2",
        )
        .bind(organization_id)
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("find trust score", e))?;
        row.as_ref().map(Self::trust_from_row).transpose()
    }

    async fn insert_if_absent(&self, row: &CustomerTrustScore) -> Result<CustomerTrustScore> {
        sqlx::query(
            r#"INSERT INTO customer_trust_scores
                (organization_id, customer_id, score, status, transaction_count, fraud_count, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (organization_id, customer_id) DO NOTHING"#,
        )
        .bind(&row.organization_id)
        .bind(&row.customer_id)
        .bind(row.score as i16)
        .bind(row.status.as_str())
        .bind(row.transaction_count as i32)
        .bind(row.fraud_count as i32)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("insert trust score", e))?;

        self.find(&row.organization_id, &row.customer_id)
            .await?
            .ok_or_else(|| RuntimeError::NotFound(format!("trust score {}", row.customer_id)))
    }

    async fn apply_event(
        &self,
        organization_id: &str,
        customer_id: &str,
        event: TrustScoreEvent,
    ) -> Result<CustomerTrustScore> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_err("begin trust update", e))?;

        let fresh = CustomerTrustScore::new(organization_id, customer_id);
        sqlx::query(
            r#"INSERT INTO customer_trust_scores
                (organization_id, customer_id, score, status, transaction_count, fraud_count, created_at, updated_at)
            VALUES ($1, $2, $3, $4, 0, 0, $5, $5)
            ON CONFLICT (organization_id, customer_id) DO NOTHING"#,
        )
        .bind(organization_id)
        .bind(customer_id)
        .bind(fresh.score as i16)
        .bind(fresh.status.as_str())
        .bind(fresh.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_err("create trust score", e))?;

        // Row lock serializes concurrent events for the same customer
        let locked = sqlx::query(
            r#"SELECT * FROM customer_trust_scores
            WHERE organization_id = $1 AND customer_id = $2
            FOR UPDATE"#,
        )
        .bind(organization_id)
        .bind(customer_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db_err("lock trust score", e))?;

        let mut row = Self::trust_from_row(&locked)?;
        row.apply(event);

        sqlx::query(
            r#"UPDATE customer_trust_scores
            SET score = $3, status = $4, transaction_count = $5, fraud_count = $6, updated_at = $7
            WHERE organization_id = $1 AND customer_id = $2"#,
        )
        .bind(organization_id)
        .bind(customer_id)
        .bind(row.score as i16)
        .bind(row.status.as_str())
        .bind(row.transaction_count as i32)
        .bind(row.fraud_count as i32)
        .bind(row.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_err("update trust score", e))?;

        tx.commit()
            .await
            .map_err(|e| db_err("commit trust update", e))?;
        Ok(row)
    }
}

#[async_trait]
impl RuleRepository for PgStore {
    async fn list_active(&self, organization_id: &str, limit: usize) -> Result<Vec<CustomRule>> {
        let rows = sqlx::query(
            r#"SELECT * FROM custom_rules
            WHERE organization_id = $1 AND active
            ORDER BY priority ASC, created_at ASC
            LIMIT $2"#,
        )
        .bind(organization_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("list active rules", e))?;
        rows.iter().map(Self::rule_from_row).collect()
    }

    async fn list(&self, organization_id: &str) -> Result<Vec<CustomRule>> {
        let rows = sqlx::query(
            "SELECT * FROM custom_rules WHERE organization_id = $1 ORDER BY priority ASC, created_at ASC",
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("list rules", e))?;
        rows.iter().map(Self::rule_from_row).collect()
    }

    async fn get(&self, organization_id: &str, rule_id: &str) -> Result<Option<CustomRule>> {
        let row = sqlx::query("SELECT * FROM custom_rules WHERE organization_id = $1 AND id = $2")
            .bind(organization_id)
            .bind(rule_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_err("get rule", e))?;
        row.as_ref().map(Self::rule_from_row).transpose()
    }

    async fn count_active(&self, organization_id: &str) -> Result<usize> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM custom_rules WHERE organization_id = $1 AND active",
        )
        .bind(organization_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_err("count rules", e))?;
        Ok(count.max(0) as usize)
    }

    async fn insert(&self, rule: &CustomRule) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO custom_rules
                (id, organization_id, name, condition, action, priority, active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"#,
        )
        .bind(&rule.id)
        .bind(&rule.organization_id)
        .bind(&rule.name)
        .bind(serde_json::to_value(&rule.condition)?)
        .bind(rule.action.as_str())
        .bind(rule.priority)
        .bind(rule.active)
        .bind(rule.created_at)
        .bind(rule.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("insert rule", e))?;
        Ok(())
    }

    async fn update(&self, rule: &CustomRule) -> Result<()> {
        let result = sqlx::query(
            r#"UPDATE custom_rules SET
                name = $3, condition = $4, action = $5, priority = $6, active = $7, updated_at = $8
            WHERE organization_id = $1 AND id = $2"#,
        )
        .bind(&rule.organization_id)
        .bind(&rule.id)
        .bind(&rule.name)
        .bind(serde_json::to_value(&rule.condition)?)
        .bind(rule.action.as_str())
        .bind(rule.priority)
        .bind(rule.active)
        .bind(rule.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("update rule", e))?;

        if result.rows_affected() == 0 {
            return Err(RuntimeError::NotFound(format!("rule {}", rule.id)));
        }
        Ok(())
    }

    async fn delete(&self, organization_id: &str, rule_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM custom_rules WHERE organization_id = $1 AND id = $2")
            .bind(organization_id)
            .bind(rule_id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_err("delete rule", e))?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl DetectionRepository for PgStore {
    async fn insert(&self, record: &DetectionRecord) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO fraud_detections (
                id, organization_id, payment_id, customer_id, customer_email, amount, currency,
                decision, score, detector_results, matched_rule_id, execution_time_ms, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)"#,
        )
        .bind(&record.id)
        .bind(&record.organization_id)
        .bind(&record.payment_id)
        .bind(record.customer_id.as_deref())
        .bind(record.customer_email.as_deref())
        .bind(record.amount)
        .bind(&record.currency)
        .bind(record.decision.as_str())
        .bind(record.score)
        .bind(&record.detector_results)
        .bind(record.matched_rule_id.as_deref())
        .bind(record.execution_time_ms as i64)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("insert detection", e))?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<DetectionRecord>> {
        let row = sqlx::query("SELECT * FROM fraud_detections WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_err("get detection", e))?;
        row.as_ref().map(Self::detection_from_row).transpose()
    }
}

#[async_trait]
impl WebhookEventRepository for PgStore {
    async fn insert_if_absent(&self, event: &WebhookEvent) -> Result<bool> {
        // The primary key on event_id is the de-duplication boundary
        let result = sqlx::query(
            r#"INSERT INTO webhook_events
                (event_id, event_type, organization_id, processed, retry_count, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (event_id) DO NOTHING"#,
        )
        .bind(&event.event_id)
        .bind(&event.event_type)
        .bind(&event.organization_id)
        .bind(event.processed)
        .bind(event.retry_count as i32)
        .bind(event.created_at)
        .bind(event.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("insert webhook event", e))?;
        Ok(result.rows_affected() == 1)
    }

    async fn get(&self, event_id: &str) -> Result<Option<WebhookEvent>> {
        let row = sqlx::query("SELECT * FROM webhook_events WHERE event_id = $1")
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_err("get webhook event", e))?;
        row.as_ref().map(Self::webhook_from_row).transpose()
    }

    async fn mark_processed(&self, event_id: &str) -> Result<()> {
        sqlx::query(
            "UPDATE webhook_events SET processed = TRUE, updated_at = NOW() WHERE event_id = $1",
        )
        .bind(event_id)
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("mark webhook processed", e))?;
        Ok(())
    }

    async fn increment_retry(&self, event_id: &str) -> Result<u32> {
        let count: i32 = sqlx::query_scalar(
            r#"UPDATE webhook_events SET retry_count = retry_count + 1, updated_at = NOW()
            WHERE event_id = $1 RETURNING retry_count"#,
        )
        .bind(event_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_err("increment webhook retry", e))?;
        Ok(count.max(0) as u32)
    }
}
