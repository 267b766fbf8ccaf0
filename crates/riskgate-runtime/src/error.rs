//! Runtime error types

use thiserror::Error;

/// Runtime error
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Cache backend failure (treated as a miss by callers)
    #[error("Cache error: {0}")]
    Cache(String),

    /// Durable store failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unique constraint violated
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Detector failed while analysing a transaction
    #[error("Detector '{detector}' failed: {message}")]
    Detector { detector: String, message: String },

    /// Scoring strategy could not produce a score
    #[error("Scoring error: {0}")]
    Scoring(String),

    /// Condition could not be evaluated
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// Rule rejected by validation or limits
    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    /// Serialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Background job could not be queued
    #[error("Dispatch error: {0}")]
    Dispatch(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RuntimeError {
    pub fn detector(detector: impl Into<String>, message: impl Into<String>) -> Self {
        RuntimeError::Detector {
            detector: detector.into(),
            message: message.into(),
        }
    }
}

impl From<riskgate_core::CoreError> for RuntimeError {
    fn from(err: riskgate_core::CoreError) -> Self {
        match err {
            riskgate_core::CoreError::InvalidRule(msg) => RuntimeError::InvalidRule(msg),
            other => RuntimeError::Evaluation(other.to_string()),
        }
    }
}

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detector_error_display() {
        let err = RuntimeError::detector("velocity", "connection refused");
        assert_eq!(
            err.to_string(),
            "Detector 'velocity' failed: connection refused"
        );
    }

    #[test]
    fn test_core_error_conversion() {
        let err: RuntimeError =
            riskgate_core::CoreError::InvalidRule("empty name".to_string()).into();
        assert!(matches!(err, RuntimeError::InvalidRule(_)));
    }
}
