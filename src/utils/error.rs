//! Error types and handling
//!
//! Common error types used across the agent.

use crate::capture::CaptureError;
use crate::providers::ProviderError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Agent-wide error type
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Event source error: {0}")]
    EventSource(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),
}

/// Error response for the presentation layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<&AgentError> for ErrorResponse {
    fn from(error: &AgentError) -> Self {
        let code = match error {
            AgentError::Io(_) => "IO_ERROR",
            AgentError::Serialization(_) => "SERIALIZATION_ERROR",
            AgentError::Config(_) => "CONFIG_ERROR",
            AgentError::Capture(_) => "CAPTURE_ERROR",
            AgentError::Provider(inner) => return ErrorResponse::from(inner),
            AgentError::EventSource(_) => "EVENT_SOURCE_ERROR",
            AgentError::PermissionDenied(_) => "PERMISSION_DENIED",
        };

        ErrorResponse {
            code: code.to_string(),
            message: error.to_string(),
        }
    }
}

impl From<AgentError> for ErrorResponse {
    fn from(error: AgentError) -> Self {
        ErrorResponse::from(&error)
    }
}

impl From<&ProviderError> for ErrorResponse {
    fn from(error: &ProviderError) -> Self {
        ErrorResponse {
            code: error.kind().code().to_string(),
            message: error.to_string(),
        }
    }
}

/// Result type alias using AgentError
pub type AgentResult<T> = Result<T, AgentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_errors_keep_their_own_code() {
        let err = AgentError::from(ProviderError::PermissionDenied("READ_SMS".into()));
        let response = ErrorResponse::from(&err);
        assert_eq!(response.code, "PERMISSION_DENIED");
        assert!(response.message.contains("READ_SMS"));
    }

    #[test]
    fn test_config_error_code() {
        let response: ErrorResponse = AgentError::Config("bad interval".into()).into();
        assert_eq!(response.code, "CONFIG_ERROR");
        assert_eq!(response.message, "Configuration error: bad interval");
    }
}
