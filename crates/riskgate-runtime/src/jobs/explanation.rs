use crate::error::Result;
use async_trait::async_trait;

/// Downstream explanation generator, invoked once per persisted detection
#[async_trait]
pub trait ExplanationTrigger: Send + Sync {
    async fn generate_explanation(&self, organization_id: &str, record_id: &str) -> Result<()>;
}

/// Records the request in the log and does nothing else
#[derive(Debug, Default, Clone)]
pub struct LoggingExplanationTrigger;

#[async_trait]
impl ExplanationTrigger for LoggingExplanationTrigger {
    async fn generate_explanation(&self, organization_id: &str, record_id: &str) -> Result<()> {
        tracing::info!(organization_id, record_id, "explanation requested");
        Ok(())
    }
}
