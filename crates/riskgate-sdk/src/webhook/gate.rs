use super::payload::{EventKind, WebhookEnvelope};
use super::signature::SignatureVerifier;
use crate::error::{Result, SdkError};
use crate::fraud_detector::FraudDetector;
use riskgate_core::{TrustScoreEvent, WebhookEvent};
use riskgate_runtime::observability::names;
use riskgate_runtime::{Job, Metrics, WebhookEventRepository};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Acknowledgement returned to the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookReceipt {
    pub received: bool,
    pub duplicate: bool,
    pub event_id: String,
}

/// Idempotency gate in front of the fraud pipeline.
///
/// A delivery is accepted at most once per event id. Accepted events are
/// processed on a background task so the provider gets its response
/// without waiting for detection.
#[derive(Clone)]
pub struct WebhookGate {
    verifier: SignatureVerifier,
    events: Arc<dyn WebhookEventRepository>,
    detector: Arc<FraudDetector>,
}

impl WebhookGate {
    pub fn new(
        verifier: SignatureVerifier,
        events: Arc<dyn WebhookEventRepository>,
        detector: Arc<FraudDetector>,
    ) -> Self {
        Self {
            verifier,
            events,
            detector,
        }
    }

    /// Verify, de-duplicate and schedule one delivery.
    ///
    /// Signature and payload problems are returned as errors for a 400;
    /// idempotency store failures as `SdkError::RuntimeError` for a 500.
    pub async fn receive(&self, signature: Option<&str>, body: &[u8]) -> Result<WebhookReceipt> {
        self.verifier.verify(signature, body)?;
        self.accept(body).await.map(|(receipt, _)| receipt)
    }

    /// Like [`receive`](Self::receive) without the signature check. The
    /// returned handle completes when background processing finishes.
    pub async fn accept(&self, body: &[u8]) -> Result<(WebhookReceipt, Option<JoinHandle<()>>)> {
        let envelope = WebhookEnvelope::parse(body)?;
        let metrics = self.detector.metrics();
        metrics.increment(names::WEBHOOK_RECEIVED);

        let record = WebhookEvent::received(
            &envelope.id,
            &envelope.event_type,
            &envelope.organization_id,
        );
        let inserted = self.events.insert_if_absent(&record).await.map_err(|e| {
            tracing::error!(event_id = %envelope.id, "idempotency store unavailable: {}", e);
            SdkError::from(e)
        })?;

        if !inserted {
            tracing::info!(event_id = %envelope.id, "duplicate webhook delivery ignored");
            metrics.increment(names::WEBHOOK_DUPLICATES);
            return Ok((
                WebhookReceipt {
                    received: true,
                    duplicate: true,
                    event_id: envelope.id,
                },
                None,
            ));
        }

        let event_id = envelope.id.clone();
        let gate = self.clone();
        let handle = tokio::spawn(async move { gate.process(envelope).await });

        Ok((
            WebhookReceipt {
                received: true,
                duplicate: false,
                event_id,
            },
            Some(handle),
        ))
    }

    async fn process(&self, envelope: WebhookEnvelope) {
        let event_id = envelope.id.clone();
        match self.route(envelope).await {
            Ok(()) => {
                if let Err(e) = self.events.mark_processed(&event_id).await {
                    tracing::warn!(event_id = %event_id, "failed to mark event processed: {}", e);
                }
            }
            Err(e) => {
                tracing::warn!(event_id = %event_id, "webhook processing failed: {}", e);
                match self.events.increment_retry(&event_id).await {
                    Ok(retries) => tracing::debug!(event_id = %event_id, retries, "retry recorded"),
                    Err(e) => {
                        tracing::warn!(event_id = %event_id, "failed to record retry: {}", e)
                    }
                }
            }
        }
    }

    async fn route(&self, envelope: WebhookEnvelope) -> Result<()> {
        match envelope.kind() {
            EventKind::Payment => {
                let context = envelope.to_detection_context()?;
                let decision = self.detector.detect_fraud(context).await;
                tracing::debug!(
                    event_id = %envelope.id,
                    decision = %decision.decision(),
                    "webhook payment evaluated"
                );
                Ok(())
            }
            EventKind::Dispute => {
                let Some(customer_id) = envelope
                    .data
                    .object
                    .customer
                    .as_deref()
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                else {
                    tracing::info!(event_id = %envelope.id, "dispute without customer, no trust update");
                    return Ok(());
                };
                self.detector.dispatch(Job::UpdateTrustScore {
                    organization_id: envelope.organization_id.clone(),
                    customer_id: customer_id.to_string(),
                    event: TrustScoreEvent::Chargeback,
                })
            }
            EventKind::Settlement => {
                tracing::debug!(
                    event_id = %envelope.id,
                    payment_id = %envelope.data.object.id,
                    event_type = %envelope.event_type,
                    "settlement acknowledged, payment was evaluated on creation"
                );
                Ok(())
            }
            EventKind::Ignored => {
                tracing::debug!(
                    event_id = %envelope.id,
                    event_type = %envelope.event_type,
                    "event type not handled"
                );
                Ok(())
            }
        }
    }
}
