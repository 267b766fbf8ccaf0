//! Server error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use riskgate_runtime::RuntimeError;
use riskgate_sdk::SdkError;
use serde_json::json;
use thiserror::Error;

/// Server error type
#[derive(Debug, Error)]
pub enum ServerError {
    /// Invalid request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Webhook signature rejected
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            // Signature failures answer 400 so providers do not treat them as auth errors
            ServerError::InvalidRequest(_) | ServerError::Unauthorized(_) => {
                StatusCode::BAD_REQUEST
            }
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        }

        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

impl From<RuntimeError> for ServerError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::InvalidRule(msg) => ServerError::InvalidRequest(msg),
            RuntimeError::NotFound(msg) => ServerError::NotFound(msg),
            other => ServerError::InternalError(other.to_string()),
        }
    }
}

impl From<SdkError> for ServerError {
    fn from(err: SdkError) -> Self {
        match err {
            SdkError::SignatureError(msg) => ServerError::Unauthorized(msg),
            SdkError::PayloadError(msg) => ServerError::InvalidRequest(msg),
            SdkError::RuntimeError(inner) => inner.into(),
            SdkError::ConfigError(msg) => ServerError::InternalError(msg),
        }
    }
}

impl From<anyhow::Error> for ServerError {
    fn from(err: anyhow::Error) -> Self {
        ServerError::InternalError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_error_is_bad_request() {
        let err: ServerError = SdkError::SignatureError("stale timestamp".to_string()).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("stale timestamp"));
    }

    #[test]
    fn test_runtime_error_mapping() {
        let not_found: ServerError = RuntimeError::NotFound("rule r1".to_string()).into();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let invalid: ServerError = RuntimeError::InvalidRule("empty".to_string()).into();
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

        let storage: ServerError =
            SdkError::from(RuntimeError::Storage("down".to_string())).into();
        assert_eq!(storage.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_into_response_status() {
        let response = ServerError::NotFound("customer".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ServerError>();
    }
}
