//! Background jobs
//!
//! Work triggered by a decision that must not delay the response: trust
//! score updates and explanation generation. Jobs are queued on an
//! unbounded channel and retried with exponential backoff.

mod backoff;
mod dispatcher;
mod explanation;

pub use backoff::RetryPolicy;
pub use dispatcher::{JobDispatcher, JobHandler, PipelineJobHandler};
pub use explanation::{ExplanationTrigger, LoggingExplanationTrigger};

use riskgate_core::TrustScoreEvent;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Job {
    UpdateTrustScore {
        organization_id: String,
        customer_id: String,
        event: TrustScoreEvent,
    },
    GenerateExplanation {
        organization_id: String,
        record_id: String,
    },
}

impl Job {
    pub fn kind(&self) -> &'static str {
        match self {
            Job::UpdateTrustScore { .. } => "update_trust_score",
            Job::GenerateExplanation { .. } => "generate_explanation",
        }
    }
}
