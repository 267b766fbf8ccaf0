//! Router creation and configuration

use super::handlers::*;
use super::types::AppState;
use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create REST API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/v1/webhooks/:provider", post(receive_webhook))
        .route("/v1/orgs/:org_id/rules", get(list_rules).post(create_rule))
        .route(
            "/v1/orgs/:org_id/rules/:rule_id",
            put(update_rule).delete(delete_rule),
        )
        .route(
            "/v1/orgs/:org_id/customers/:customer_id/trust",
            get(get_trust_score).post(update_trust_score),
        )
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
