use super::engine::rules_cache_key;
use crate::cache::CacheStore;
use crate::error::{Result, RuntimeError};
use crate::store::RuleRepository;
use chrono::Utc;
use riskgate_core::{CustomRule, RuleDraft, MAX_ACTIVE_RULES};
use std::sync::Arc;
use uuid::Uuid;

/// Rule administration. Every mutation drops the organization's cached
/// rule list.
pub struct RuleService {
    cache: Arc<dyn CacheStore>,
    store: Arc<dyn RuleRepository>,
}

impl RuleService {
    pub fn new(cache: Arc<dyn CacheStore>, store: Arc<dyn RuleRepository>) -> Self {
        Self { cache, store }
    }

    pub async fn list_rules(&self, organization_id: &str) -> Result<Vec<CustomRule>> {
        self.store.list(organization_id).await
    }

    pub async fn get_rule(&self, organization_id: &str, rule_id: &str) -> Result<CustomRule> {
        self.store
            .get(organization_id, rule_id)
            .await?
            .ok_or_else(|| RuntimeError::NotFound(format!("rule {}", rule_id)))
    }

    pub async fn create_rule(&self, organization_id: &str, draft: RuleDraft) -> Result<CustomRule> {
        draft.validate()?;
        if draft.active {
            self.ensure_capacity(organization_id).await?;
        }

        let now = Utc::now();
        let rule = CustomRule {
            id: Uuid::new_v4().to_string(),
            organization_id: organization_id.to_string(),
            name: draft.name.trim().to_string(),
            condition: draft.condition,
            action: draft.action,
            priority: draft.priority,
            active: draft.active,
            created_at: now,
            updated_at: now,
        };
        self.store.insert(&rule).await?;
        self.invalidate(organization_id).await;

        tracing::info!(organization_id, rule_id = %rule.id, "custom rule created");
        Ok(rule)
    }

    /// Replace a rule's definition, keeping its id and creation time
    pub async fn update_rule(
        &self,
        organization_id: &str,
        rule_id: &str,
        draft: RuleDraft,
    ) -> Result<CustomRule> {
        draft.validate()?;
        let existing = self.get_rule(organization_id, rule_id).await?;
        if draft.active && !existing.active {
            self.ensure_capacity(organization_id).await?;
        }

        let rule = CustomRule {
            name: draft.name.trim().to_string(),
            condition: draft.condition,
            action: draft.action,
            priority: draft.priority,
            active: draft.active,
            updated_at: Utc::now(),
            ..existing
        };
        self.store.update(&rule).await?;
        self.invalidate(organization_id).await;

        tracing::info!(organization_id, rule_id, "custom rule updated");
        Ok(rule)
    }

    pub async fn delete_rule(&self, organization_id: &str, rule_id: &str) -> Result<()> {
        if !self.store.delete(organization_id, rule_id).await? {
            return Err(RuntimeError::NotFound(format!("rule {}", rule_id)));
        }
        self.invalidate(organization_id).await;

        tracing::info!(organization_id, rule_id, "custom rule deleted");
        Ok(())
    }

    async fn ensure_capacity(&self, organization_id: &str) -> Result<()> {
        let active = self.store.count_active(organization_id).await?;
        if active >= MAX_ACTIVE_RULES {
            return Err(RuntimeError::InvalidRule(format!(
                "organization already has {} active rules (limit {})",
                active, MAX_ACTIVE_RULES
            )));
        }
        Ok(())
    }

    async fn invalidate(&self, organization_id: &str) {
        let key = rules_cache_key(organization_id);
        if let Err(e) = self.cache.delete(&key).await {
            tracing::warn!(key = %key, "rule cache invalidation failed: {}", e);
        }
    }
}
