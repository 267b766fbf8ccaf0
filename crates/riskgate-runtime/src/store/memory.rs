//! In-memory store
//!
//! Implements every repository trait over `parking_lot` maps. Data is lost
//! when the process restarts.

use super::{
    DetectionRecord, DetectionRepository, RuleRepository, TrustScoreRepository,
    WebhookEventRepository,
};
use crate::error::{Result, RuntimeError};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use riskgate_core::{CustomRule, CustomerTrustScore, TrustScoreEvent, WebhookEvent};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct Tables {
    trust_scores: HashMap<(String, String), CustomerTrustScore>,
    rules: HashMap<String, CustomRule>,
    detections: HashMap<String, DetectionRecord>,
    webhook_events: HashMap<String, WebhookEvent>,
}

/// In-memory implementation of all repositories
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail until cleared
    pub fn simulate_outage(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RuntimeError::Storage("store unavailable".to_string()));
        }
        Ok(())
    }

    pub fn detection_count(&self) -> usize {
        self.tables.read().detections.len()
    }

    pub fn detections(&self) -> Vec<DetectionRecord> {
        let mut records: Vec<_> = self.tables.read().detections.values().cloned().collect();
        records.sort_by_key(|r| r.created_at);
        records
    }
}

fn sort_rules(rules: &mut [CustomRule]) {
    rules.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
}

#[async_trait]
impl TrustScoreRepository for MemoryStore {
    async fn find(
        &self,
        organization_id: &str,
        customer_id: &str,
    ) -> Result<Option<CustomerTrustScore>> {
        self.check()?;
        let key = (organization_id.to_string(), customer_id.to_string());
        Ok(self.tables.read().trust_scores.get(&key).cloned())
    }

    async fn insert_if_absent(&self, row: &CustomerTrustScore) -> Result<CustomerTrustScore> {
        self.check()?;
        let key = (row.organization_id.clone(), row.customer_id.clone());
        let mut tables = self.tables.write();
        Ok(tables.trust_scores.entry(key).or_insert_with(|| row.clone()).clone())
    }

    async fn apply_event(
        &self,
        organization_id: &str,
        customer_id: &str,
        event: TrustScoreEvent,
    ) -> Result<CustomerTrustScore> {
        self.check()?;
        let key = (organization_id.to_string(), customer_id.to_string());
        let mut tables = self.tables.write();
        let row = tables
            .trust_scores
            .entry(key)
            .or_insert_with(|| CustomerTrustScore::new(organization_id, customer_id));
        row.apply(event);
        Ok(row.clone())
    }
}

#[async_trait]
impl RuleRepository for MemoryStore {
    async fn list_active(&self, organization_id: &str, limit: usize) -> Result<Vec<CustomRule>> {
        let mut rules: Vec<_> = self
            .list(organization_id)
            .await?
            .into_iter()
            .filter(|r| r.active)
            .collect();
        rules.truncate(limit);
        Ok(rules)
    }

    async fn list(&self, organization_id: &str) -> Result<Vec<CustomRule>> {
        self.check()?;
        let mut rules: Vec<_> = self
            .tables
            .read()
            .rules
            .values()
            .filter(|r| r.organization_id == organization_id)
            .cloned()
            .collect();
        sort_rules(&mut rules);
        Ok(rules)
    }

    async fn get(&self, organization_id: &str, rule_id: &str) -> Result<Option<CustomRule>> {
        self.check()?;
        Ok(self
            .tables
            .read()
            .rules
            .get(rule_id)
            .filter(|r| r.organization_id == organization_id)
            .cloned())
    }

    async fn count_active(&self, organization_id: &str) -> Result<usize> {
        self.check()?;
        Ok(self
            .tables
            .read()
            .rules
            .values()
            .filter(|r| r.organization_id == organization_id && r.active)
            .count())
    }

    async fn insert(&self, rule: &CustomRule) -> Result<()> {
        self.check()?;
        match self.tables.write().rules.entry(rule.id.clone()) {
            Entry::Occupied(_) => Err(RuntimeError::Conflict(format!("rule {}", rule.id))),
            Entry::Vacant(slot) => {
                slot.insert(rule.clone());
                Ok(())
            }
        }
    }

    async fn update(&self, rule: &CustomRule) -> Result<()> {
        self.check()?;
        let mut tables = self.tables.write();
        match tables.rules.get_mut(&rule.id) {
            Some(existing) if existing.organization_id == rule.organization_id => {
                *existing = rule.clone();
                Ok(())
            }
            _ => Err(RuntimeError::NotFound(format!("rule {}", rule.id))),
        }
    }

    async fn delete(&self, organization_id: &str, rule_id: &str) -> Result<bool> {
        self.check()?;
        let mut tables = self.tables.write();
        let owned = tables
            .rules
            .get(rule_id)
            .map(|r| r.organization_id == organization_id)
            .unwrap_or(false);
        if owned {
            tables.rules.remove(rule_id);
        }
        Ok(owned)
    }
}

#[async_trait]
impl DetectionRepository for MemoryStore {
    async fn insert(&self, record: &DetectionRecord) -> Result<()> {
        self.check()?;
        self.tables
            .write()
            .detections
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<DetectionRecord>> {
        self.check()?;
        Ok(self.tables.read().detections.get(id).cloned())
    }
}

#[async_trait]
impl WebhookEventRepository for MemoryStore {
    async fn insert_if_absent(&self, event: &WebhookEvent) -> Result<bool> {
        self.check()?;
        match self.tables.write().webhook_events.entry(event.event_id.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(event.clone());
                Ok(true)
            }
        }
    }

    async fn get(&self, event_id: &str) -> Result<Option<WebhookEvent>> {
        self.check()?;
        Ok(self.tables.read().webhook_events.get(event_id).cloned())
    }

    async fn mark_processed(&self, event_id: &str) -> Result<()> {
        self.check()?;
        let mut tables = self.tables.write();
        let event = tables
            .webhook_events
            .get_mut(event_id)
            .ok_or_else(|| RuntimeError::NotFound(format!("webhook event {}", event_id)))?;
        event.processed = true;
        event.updated_at = Utc::now();
        Ok(())
    }

    async fn increment_retry(&self, event_id: &str) -> Result<u32> {
        self.check()?;
        let mut tables = self.tables.write();
        let event = tables
            .webhook_events
            .get_mut(event_id)
            .ok_or_else(|| RuntimeError::NotFound(format!("webhook event {}", event_id)))?;
        event.retry_count += 1;
        event.updated_at = Utc::now();
        Ok(event.retry_count)
    }
}
