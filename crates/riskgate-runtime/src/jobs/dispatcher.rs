use super::{ExplanationTrigger, Job, RetryPolicy};
use crate::error::{Result, RuntimeError};
use crate::observability::{names, Metrics, MetricsCollector};
use crate::trust::TrustScoreService;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Executes a single job attempt
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &Job) -> Result<()>;
}

/// Routes jobs to the trust score service and the explanation trigger
pub struct PipelineJobHandler {
    trust: Arc<TrustScoreService>,
    explanations: Arc<dyn ExplanationTrigger>,
}

impl PipelineJobHandler {
    pub fn new(trust: Arc<TrustScoreService>, explanations: Arc<dyn ExplanationTrigger>) -> Self {
        Self {
            trust,
            explanations,
        }
    }
}

#[async_trait]
impl JobHandler for PipelineJobHandler {
    async fn handle(&self, job: &Job) -> Result<()> {
        match job {
            Job::UpdateTrustScore {
                organization_id,
                customer_id,
                event,
            } => self
                .trust
                .try_update_trust_score(organization_id, customer_id, *event)
                .await
                .map(|_| ()),
            Job::GenerateExplanation {
                organization_id,
                record_id,
            } => {
                self.explanations
                    .generate_explanation(organization_id, record_id)
                    .await
            }
        }
    }
}

/// Fire-and-forget queue in front of a [`JobHandler`]
pub struct JobDispatcher {
    sender: mpsc::UnboundedSender<Job>,
    pending: Arc<AtomicUsize>,
}

impl JobDispatcher {
    /// Spawn the background worker. Must be called inside a tokio runtime.
    pub fn start(handler: Arc<dyn JobHandler>, policy: RetryPolicy) -> Self {
        Self::start_with_metrics(handler, policy, Arc::new(MetricsCollector::new()))
    }

    pub fn start_with_metrics(
        handler: Arc<dyn JobHandler>,
        policy: RetryPolicy,
        metrics: Arc<dyn Metrics>,
    ) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));

        tokio::spawn(Self::process_jobs(
            receiver,
            handler,
            policy,
            metrics,
            pending.clone(),
        ));
        tracing::debug!("job dispatcher started");

        Self { sender, pending }
    }

    /// Queue a job without waiting for it
    pub fn dispatch(&self, job: Job) -> Result<()> {
        self.pending.fetch_add(1, Ordering::SeqCst);
        self.sender.send(job).map_err(|e| {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            RuntimeError::Dispatch(format!("failed to queue {} job: worker stopped", e.0.kind()))
        })
    }

    /// Jobs queued or running
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Wait until every queued job has finished, or `timeout` elapses.
    /// Returns false on timeout.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let wait = async {
            while self.pending() > 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };
        tokio::time::timeout(timeout, wait).await.is_ok()
    }

    async fn process_jobs(
        mut receiver: mpsc::UnboundedReceiver<Job>,
        handler: Arc<dyn JobHandler>,
        policy: RetryPolicy,
        metrics: Arc<dyn Metrics>,
        pending: Arc<AtomicUsize>,
    ) {
        while let Some(job) = receiver.recv().await {
            let handler = handler.clone();
            let policy = policy.clone();
            let metrics = metrics.clone();
            let pending = pending.clone();

            // Each job retries on its own task so a slow job cannot stall the queue
            tokio::spawn(async move {
                Self::run_with_retry(&job, handler.as_ref(), &policy, metrics.as_ref()).await;
                pending.fetch_sub(1, Ordering::SeqCst);
            });
        }
        tracing::debug!("job dispatcher stopped (channel closed)");
    }

    async fn run_with_retry(
        job: &Job,
        handler: &dyn JobHandler,
        policy: &RetryPolicy,
        metrics: &dyn Metrics,
    ) {
        let attempts = policy.max_attempts.max(1);
        for attempt in 0..attempts {
            tokio::time::sleep(policy.delay_for(attempt)).await;
            match handler.handle(job).await {
                Ok(()) => {
                    tracing::debug!(job = job.kind(), attempt, "job finished");
                    return;
                }
                Err(e) if attempt + 1 < attempts => {
                    tracing::warn!(job = job.kind(), attempt, "job failed, retrying: {}", e);
                }
                Err(e) => {
                    tracing::error!(job = job.kind(), attempts, "job abandoned: {}", e);
                    metrics.increment(names::JOB_FAILURES);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct FlakyHandler {
        failures_left: Mutex<u32>,
        seen: Mutex<Vec<Job>>,
    }

    impl FlakyHandler {
        fn new(failures: u32) -> Arc<Self> {
            Arc::new(Self {
                failures_left: Mutex::new(failures),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl JobHandler for FlakyHandler {
        async fn handle(&self, job: &Job) -> Result<()> {
            self.seen.lock().push(job.clone());
            let mut left = self.failures_left.lock();
            if *left > 0 {
                *left -= 1;
                return Err(RuntimeError::Storage("unavailable".to_string()));
            }
            Ok(())
        }
    }

    fn explanation_job() -> Job {
        Job::GenerateExplanation {
            organization_id: "org_1".to_string(),
            record_id: "rec_1".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_job_retried_until_success() {
        let handler = FlakyHandler::new(2);
        let dispatcher = JobDispatcher::start(handler.clone(), RetryPolicy::default());

        dispatcher.dispatch(explanation_job()).unwrap();
        assert!(dispatcher.drain(Duration::from_secs(60)).await);
        assert_eq!(handler.seen.lock().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_job_abandoned_after_max_attempts() {
        let handler = FlakyHandler::new(10);
        let metrics = Arc::new(MetricsCollector::new());
        let dispatcher = JobDispatcher::start_with_metrics(
            handler.clone(),
            RetryPolicy::default(),
            metrics.clone(),
        );

        dispatcher.dispatch(explanation_job()).unwrap();
        assert!(dispatcher.drain(Duration::from_secs(60)).await);
        assert_eq!(handler.seen.lock().len(), 3);
        assert_eq!(metrics.counter(names::JOB_FAILURES).get(), 1);
    }

    #[tokio::test]
    async fn test_trust_job_applies_event() {
        use crate::cache::MemoryCache;
        use crate::jobs::LoggingExplanationTrigger;
        use crate::store::MemoryStore;
        use riskgate_core::TrustScoreEvent;

        let trust = Arc::new(TrustScoreService::new(
            Arc::new(MemoryCache::new()),
            Arc::new(MemoryStore::new()),
        ));
        let handler = PipelineJobHandler::new(trust.clone(), Arc::new(LoggingExplanationTrigger));
        let dispatcher = JobDispatcher::start(Arc::new(handler), RetryPolicy::none());

        dispatcher
            .dispatch(Job::UpdateTrustScore {
                organization_id: "org_1".to_string(),
                customer_id: "cus_1".to_string(),
                event: TrustScoreEvent::BlockedTransaction,
            })
            .unwrap();
        dispatcher.dispatch(explanation_job()).unwrap();

        assert!(dispatcher.drain(Duration::from_secs(5)).await);
        assert_eq!(trust.get_trust_score("org_1", "cus_1").await, 40);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_trust_jobs_accumulate() {
        use crate::cache::MemoryCache;
        use crate::jobs::LoggingExplanationTrigger;
        use crate::store::MemoryStore;
        use riskgate_core::TrustScoreEvent;

        let trust = Arc::new(TrustScoreService::new(
            Arc::new(MemoryCache::new()),
            Arc::new(MemoryStore::new()),
        ));
        let handler = PipelineJobHandler::new(trust.clone(), Arc::new(LoggingExplanationTrigger));
        let dispatcher = JobDispatcher::start(Arc::new(handler), RetryPolicy::none());

        for _ in 0..5 {
            dispatcher
                .dispatch(Job::UpdateTrustScore {
                    organization_id: "org_1".to_string(),
                    customer_id: "cus_1".to_string(),
                    event: TrustScoreEvent::SuccessfulPayment,
                })
                .unwrap();
        }

        assert!(dispatcher.drain(Duration::from_secs(5)).await);
        let row = trust.get_trust_record("org_1", "cus_1").await.unwrap();
        assert_eq!(row.score, 75);
        assert_eq!(row.transaction_count, 5);
    }

    #[test]
    fn test_job_serde_tagged() {
        let json = serde_json::to_value(explanation_job()).unwrap();
        assert_eq!(json["type"], "generate_explanation");
        assert_eq!(json["record_id"], "rec_1");
    }
}
