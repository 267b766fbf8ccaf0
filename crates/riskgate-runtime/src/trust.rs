//! Trust score service
//!
//! Reads go cache -> store -> lazily created default row and fail open to
//! the neutral score. Writes update the durable row first and then delete
//! the cache entry so the next read re-hydrates from storage.

use crate::cache::CacheStore;
use crate::error::Result;
use crate::store::TrustScoreRepository;
use riskgate_core::{CustomerTrustScore, TrustScoreEvent, DEFAULT_TRUST_SCORE};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_TRUST_CACHE_TTL: Duration = Duration::from_secs(3600);

pub fn trust_cache_key(organization_id: &str, customer_id: &str) -> String {
    format!("trust_score:{}:{}", organization_id, customer_id)
}

pub struct TrustScoreService {
    cache: Arc<dyn CacheStore>,
    store: Arc<dyn TrustScoreRepository>,
    ttl: Duration,
}

impl TrustScoreService {
    pub fn new(cache: Arc<dyn CacheStore>, store: Arc<dyn TrustScoreRepository>) -> Self {
        Self {
            cache,
            store,
            ttl: DEFAULT_TRUST_CACHE_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Current score for a customer. Never fails: any storage problem
    /// yields the neutral default.
    pub async fn get_trust_score(&self, organization_id: &str, customer_id: &str) -> u8 {
        match self.try_get_trust_score(organization_id, customer_id).await {
            Ok(score) => score,
            Err(e) => {
                tracing::warn!(
                    organization_id,
                    customer_id,
                    "trust score lookup failed, using default: {}",
                    e
                );
                DEFAULT_TRUST_SCORE
            }
        }
    }

    async fn try_get_trust_score(&self, organization_id: &str, customer_id: &str) -> Result<u8> {
        let key = trust_cache_key(organization_id, customer_id);

        match self.cache.get(&key).await {
            Ok(Some(raw)) => match raw.parse::<u8>() {
                Ok(score) => return Ok(score.min(100)),
                Err(_) => tracing::warn!(key = %key, "discarding malformed cached trust score"),
            },
            Ok(None) => {}
            Err(e) => tracing::warn!(key = %key, "trust cache read failed: {}", e),
        }

        let row = self.load_or_create(organization_id, customer_id).await?;

        if let Err(e) = self.cache.set(&key, &row.score.to_string(), self.ttl).await {
            tracing::warn!(key = %key, "trust cache write failed: {}", e);
        }
        Ok(row.score)
    }

    /// Full row, created with the default score when missing
    pub async fn get_trust_record(
        &self,
        organization_id: &str,
        customer_id: &str,
    ) -> Result<CustomerTrustScore> {
        self.load_or_create(organization_id, customer_id).await
    }

    async fn load_or_create(
        &self,
        organization_id: &str,
        customer_id: &str,
    ) -> Result<CustomerTrustScore> {
        if let Some(row) = self.store.find(organization_id, customer_id).await? {
            return Ok(row);
        }
        let fresh = CustomerTrustScore::new(organization_id, customer_id);
        self.store.insert_if_absent(&fresh).await
    }

    /// Apply an event, logging and swallowing failures
    pub async fn update_trust_score(
        &self,
        organization_id: &str,
        customer_id: &str,
        event: TrustScoreEvent,
    ) {
        if let Err(e) = self
            .try_update_trust_score(organization_id, customer_id, event)
            .await
        {
            tracing::error!(
                organization_id,
                customer_id,
                event = event.as_str(),
                "trust score update failed: {}",
                e
            );
        }
    }

    /// Apply an event and return the stored row
    pub async fn try_update_trust_score(
        &self,
        organization_id: &str,
        customer_id: &str,
        event: TrustScoreEvent,
    ) -> Result<CustomerTrustScore> {
        let row = self
            .store
            .apply_event(organization_id, customer_id, event)
            .await?;

        // Invalidate only after the durable write
        let key = trust_cache_key(organization_id, customer_id);
        if let Err(e) = self.cache.delete(&key).await {
            tracing::warn!(key = %key, "trust cache invalidation failed: {}", e);
        }

        tracing::info!(
            organization_id,
            customer_id,
            event = event.as_str(),
            score = row.score,
            "trust score updated"
        );
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::store::MemoryStore;

    fn service() -> (TrustScoreService, MemoryCache, MemoryStore) {
        let cache = MemoryCache::new();
        let store = MemoryStore::new();
        let service = TrustScoreService::new(Arc::new(cache.clone()), Arc::new(store.clone()));
        (service, cache, store)
    }

    #[tokio::test]
    async fn test_unseen_customer_gets_default_and_row() {
        let (service, cache, store) = service();

        assert_eq!(service.get_trust_score("org_1", "cus_1").await, 50);
        assert!(store.find("org_1", "cus_1").await.unwrap().is_some());
        assert_eq!(
            cache.get(&trust_cache_key("org_1", "cus_1")).await.unwrap(),
            Some("50".to_string())
        );
    }

    #[tokio::test]
    async fn test_cached_value_is_served() {
        let (service, cache, _store) = service();
        cache
            .set(&trust_cache_key("org_1", "cus_1"), "83", DEFAULT_TRUST_CACHE_TTL)
            .await
            .unwrap();
        assert_eq!(service.get_trust_score("org_1", "cus_1").await, 83);
    }

    #[tokio::test]
    async fn test_update_invalidates_cache() {
        let (service, cache, _store) = service();
        assert_eq!(service.get_trust_score("org_1", "cus_1").await, 50);

        service
            .update_trust_score("org_1", "cus_1", TrustScoreEvent::SuccessfulPayment)
            .await;
        assert!(!cache.contains_key(&trust_cache_key("org_1", "cus_1")));
        assert_eq!(service.get_trust_score("org_1", "cus_1").await, 55);
    }

    #[tokio::test]
    async fn test_store_outage_fails_open() {
        let (service, _cache, store) = service();
        store.simulate_outage(true);

        assert_eq!(service.get_trust_score("org_1", "cus_1").await, 50);
        // Swallowed, no panic
        service
            .update_trust_score("org_1", "cus_1", TrustScoreEvent::Chargeback)
            .await;
        assert!(service
            .try_update_trust_score("org_1", "cus_1", TrustScoreEvent::Chargeback)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_chargeback_clamps_to_zero() {
        let (service, _cache, _store) = service();
        for _ in 0..3 {
            service
                .update_trust_score("org_1", "cus_1", TrustScoreEvent::Chargeback)
                .await;
        }
        let row = service.get_trust_record("org_1", "cus_1").await.unwrap();
        assert_eq!(row.score, 0);
        assert_eq!(row.fraud_count, 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_updates_are_not_lost() {
        let (service, _cache, _store) = service();
        let service = Arc::new(service);
        assert_eq!(service.get_trust_score("org_1", "cus_1").await, 50);

        let updates: Vec<_> = (0..5)
            .map(|_| {
                let service = service.clone();
                tokio::spawn(async move {
                    service
                        .try_update_trust_score("org_1", "cus_1", TrustScoreEvent::SuccessfulPayment)
                        .await
                })
            })
            .collect();
        for update in futures::future::join_all(updates).await {
            update.unwrap().unwrap();
        }

        let row = service.get_trust_record("org_1", "cus_1").await.unwrap();
        assert_eq!(row.score, 75);
        assert_eq!(row.transaction_count, 5);
        assert_eq!(service.get_trust_score("org_1", "cus_1").await, 75);
    }
}
