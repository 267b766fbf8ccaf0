//! Tests for REST API components

#![cfg(test)]

use super::types::*;
use riskgate_sdk::{CustomerTrustScore, TrustScoreEvent, WebhookReceipt};

#[test]
fn test_trust_action_deserialize() {
    let request: TrustUpdateRequest = serde_json::from_str(r#"{"action": "blacklist"}"#).unwrap();
    assert_eq!(request.action, TrustAction::Blacklist);

    let unknown: Result<TrustUpdateRequest, _> = serde_json::from_str(r#"{"action": "promote"}"#);
    assert!(unknown.is_err());
}

#[test]
fn test_trust_action_maps_to_manual_events() {
    assert_eq!(
        TrustScoreEvent::from(TrustAction::Whitelist),
        TrustScoreEvent::Whitelisted
    );
    assert_eq!(
        TrustScoreEvent::from(TrustAction::Blacklist),
        TrustScoreEvent::Blacklisted
    );
}

#[test]
fn test_trust_payload_from_row() {
    let mut row = CustomerTrustScore::new("org_1", "cus_1");
    row.apply(TrustScoreEvent::Whitelisted);

    let payload = TrustScorePayload::from(row);
    assert_eq!(payload.customer_id, "cus_1");
    assert_eq!(payload.score, 90);
    assert_eq!(payload.status, "whitelisted");
}

#[test]
fn test_webhook_response_hides_event_id() {
    let receipt = WebhookReceipt {
        received: true,
        duplicate: true,
        event_id: "evt_1".to_string(),
    };
    let json = serde_json::to_value(WebhookResponse::from(receipt)).unwrap();
    assert_eq!(json, serde_json::json!({"received": true, "duplicate": true}));
}
