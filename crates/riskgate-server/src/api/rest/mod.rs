//! REST API implementation
//!
//! - types: Request/response type definitions
//! - extractors: Custom request extractors
//! - handlers: API endpoint handlers
//! - router: Router creation and configuration

mod extractors;
mod handlers;
mod router;
mod tests;
pub mod types;

// Re-export public API
pub use extractors::{JsonExtractor, SignatureHeader};
pub use router::create_router;
pub use types::{
    AppState, HealthResponse, TrustAction, TrustScorePayload, TrustUpdateRequest,
    WebhookResponse,
};
