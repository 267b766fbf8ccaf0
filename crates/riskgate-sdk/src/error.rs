//! SDK error types

use thiserror::Error;

/// SDK error type
#[derive(Error, Debug)]
pub enum SdkError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Webhook signature missing, malformed, stale or wrong
    #[error("Invalid signature: {0}")]
    SignatureError(String),

    /// Webhook body could not be understood
    #[error("Invalid payload: {0}")]
    PayloadError(String),

    /// Runtime error
    #[error("Runtime error: {0}")]
    RuntimeError(#[from] riskgate_runtime::RuntimeError),
}

/// Result type for SDK operations
pub type Result<T> = std::result::Result<T, SdkError>;
