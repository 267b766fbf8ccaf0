//! API endpoint handlers
//!
//! HTTP request handlers for all REST API endpoints.

use super::extractors::{JsonExtractor, SignatureHeader};
use super::types::*;
use crate::error::ServerError;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use riskgate_sdk::{CustomRule, RuleDraft, TrustScoreEvent};
use tracing::info;

/// Health check endpoint
pub(super) async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Prometheus text exposition
pub(super) async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.detector.metrics().render_prometheus(),
    )
}

/// Provider webhook endpoint. Answers as soon as the event is recorded;
/// detection runs in the background.
#[axum::debug_handler]
pub(super) async fn receive_webhook(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    SignatureHeader(signature): SignatureHeader,
    body: Bytes,
) -> Result<Json<WebhookResponse>, ServerError> {
    let receipt = state.gate.receive(signature.as_deref(), &body).await?;
    info!(
        provider = %provider,
        event_id = %receipt.event_id,
        duplicate = receipt.duplicate,
        "webhook accepted"
    );
    Ok(Json(receipt.into()))
}

pub(super) async fn list_rules(
    State(state): State<AppState>,
    Path(org_id): Path<String>,
) -> Result<Json<Vec<CustomRule>>, ServerError> {
    let rules = state.detector.rule_service().list_rules(&org_id).await?;
    Ok(Json(rules))
}

pub(super) async fn create_rule(
    State(state): State<AppState>,
    Path(org_id): Path<String>,
    JsonExtractor(draft): JsonExtractor<RuleDraft>,
) -> Result<(StatusCode, Json<CustomRule>), ServerError> {
    let rule = state.detector.rule_service().create_rule(&org_id, draft).await?;
    info!(organization_id = %org_id, rule_id = %rule.id, "rule created");
    Ok((StatusCode::CREATED, Json(rule)))
}

pub(super) async fn update_rule(
    State(state): State<AppState>,
    Path((org_id, rule_id)): Path<(String, String)>,
    JsonExtractor(draft): JsonExtractor<RuleDraft>,
) -> Result<Json<CustomRule>, ServerError> {
    let rule = state
        .detector
        .rule_service()
        .update_rule(&org_id, &rule_id, draft)
        .await?;
    info!(organization_id = %org_id, rule_id = %rule.id, "rule updated");
    Ok(Json(rule))
}

pub(super) async fn delete_rule(
    State(state): State<AppState>,
    Path((org_id, rule_id)): Path<(String, String)>,
) -> Result<StatusCode, ServerError> {
    state
        .detector
        .rule_service()
        .delete_rule(&org_id, &rule_id)
        .await?;
    info!(organization_id = %org_id, rule_id = %rule_id, "rule deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn get_trust_score(
    State(state): State<AppState>,
    Path((org_id, customer_id)): Path<(String, String)>,
) -> Result<Json<TrustScorePayload>, ServerError> {
    let row = state
        .detector
        .trust_service()
        .get_trust_record(&org_id, &customer_id)
        .await?;
    Ok(Json(row.into()))
}

/// Manual whitelist/blacklist
pub(super) async fn update_trust_score(
    State(state): State<AppState>,
    Path((org_id, customer_id)): Path<(String, String)>,
    JsonExtractor(request): JsonExtractor<TrustUpdateRequest>,
) -> Result<Json<TrustScorePayload>, ServerError> {
    let event = TrustScoreEvent::from(request.action);
    let row = state
        .detector
        .trust_service()
        .try_update_trust_score(&org_id, &customer_id, event)
        .await?;
    Ok(Json(row.into()))
}
