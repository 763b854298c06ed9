//! Error types for Tool Gateway operations

use std::time::Duration;
use thiserror::Error;
use verdict_core::{ToolFailure, ToolFailureKind};

/// Result type for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Errors that can occur while talking to the Tool Gateway
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    /// Connection refused, reset or aborted; the only transient kind
    #[error("Gateway connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Gateway request timed out after {0:?}")]
    Timeout(Duration),

    /// HTTP-level failure (non-2xx status, TLS, ...)
    #[error("Gateway request failed: {0}")]
    RequestFailed(String),

    /// JSON-RPC error object returned by the gateway
    #[error("Gateway error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// Tool ran but flagged its result as an error
    #[error("Tool '{name}' failed: {message}")]
    ToolFailed { name: String, message: String },

    #[error("Malformed gateway response: {0}")]
    MalformedResponse(String),

    /// Session already closed
    #[error("Not connected to the tool gateway")]
    NotConnected,

    /// Arguments do not satisfy the tool's declared schema
    #[error("Schema violation: {0}")]
    SchemaViolation(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
}

impl GatewayError {
    /// Whether a retry may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::ConnectionFailed(_))
    }

    /// Failure recorded in the conversation for a call that ended with this error
    pub fn to_tool_failure(&self) -> ToolFailure {
        match self {
            GatewayError::Timeout(_) => ToolFailure::new(ToolFailureKind::Timeout, self.to_string()),
            GatewayError::ConnectionFailed(_)
            | GatewayError::RequestFailed(_)
            | GatewayError::NotConnected
            | GatewayError::ConfigError(_)
            | GatewayError::EnvVarNotFound(_) => {
                ToolFailure::new(ToolFailureKind::Unavailable, self.to_string())
            }
            GatewayError::MalformedResponse(_) => {
                ToolFailure::new(ToolFailureKind::MalformedResponse, self.to_string())
            }
            GatewayError::Rpc { code, message } => {
                ToolFailure::new(ToolFailureKind::ToolError, message.clone()).with_code(*code)
            }
            GatewayError::ToolFailed { message, .. } | GatewayError::SchemaViolation(message) => {
                ToolFailure::new(ToolFailureKind::ToolError, message.clone())
            }
        }
    }
}

/// Convert GatewayError to verdict_core::Error
impl From<GatewayError> for verdict_core::Error {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::SchemaViolation(detail) => verdict_core::Error::ProtocolViolation(detail),
            other => verdict_core::Error::ToolUnavailable(other.to_string()),
        }
    }
}
