//! Error types used by the adapters around the transport

use authwire_common::error::{ErrorClassification, ErrorSeverity};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for authwire plumbing (configuration, storage, codecs).
///
/// Failures of an HTTP call never use this type; they surface as
/// [`crate::NormalizedError`].
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum AuthWireError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for authwire operations
pub type Result<T> = std::result::Result<T, AuthWireError>;

impl From<serde_json::Error> for AuthWireError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl ErrorClassification for AuthWireError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::InvalidInput(_) => ErrorSeverity::Warning,
            Self::Config(_) | Self::Storage(_) | Self::Serialization(_) => ErrorSeverity::Error,
            Self::Internal(_) => ErrorSeverity::Critical,
        }
    }
}
