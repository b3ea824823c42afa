//! Error types for Synheart Flux signals

use thiserror::Error;

/// Errors raised by configuration, pipeline and boundary layers.
///
/// The estimators themselves never fail; they fall back to neutral values.
#[derive(Debug, Error)]
pub enum FluxError {
    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Unknown processor: {0}")]
    UnknownProcessor(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("State mismatch: expected {expected} state, found {found}")]
    StateMismatch { expected: String, found: String },
}

impl FluxError {
    pub(crate) fn invalid_parameter(name: &str, reason: impl Into<String>) -> Self {
        FluxError::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}
