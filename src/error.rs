//! Error types for the tool-invocation protocol
//!
//! Each protocol component has its own error enum so callers can tell
//! failure kinds apart programmatically; `SimpleMcpError` aggregates them
//! for the binary.

use std::time::Duration;

use thiserror::Error;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum SimpleMcpError {
    /// Tool registry errors
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Argument validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Client session errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Tool call errors
    #[error("Call error: {0}")]
    Call(#[from] CallError),

    /// Transport errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Tool registry errors
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("tool already registered: {name}")]
    DuplicateTool { name: String },

    #[error("unknown tool: {name}")]
    ToolNotFound { name: String },
}

/// Argument validation errors produced by the dispatcher
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("missing required parameter: {name}")]
    MissingParameter { name: String },

    #[error("unknown parameter: {name}")]
    UnknownParameter { name: String },

    #[error("parameter '{name}' expects {expected}, got {actual}")]
    TypeMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("arguments must be a JSON object")]
    NotAnObject,
}

/// Client session errors
///
/// `NotEstablished` means the event stream ended before a session
/// announcement arrived; `Closed` means an established stream has since
/// gone away.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("session not established")]
    NotEstablished,

    #[error("session closed")]
    Closed,
}

/// Tool call errors surfaced to client callers
///
/// Callers can distinguish a local timeout from session loss from a
/// tool-level error reported by the server.
#[derive(Error, Debug)]
pub enum CallError {
    #[error("call to '{tool}' timed out after {timeout:?}")]
    Timeout { tool: String, timeout: Duration },

    #[error(transparent)]
    Session(#[from] SessionError),

    /// The server answered with an error response (unknown tool,
    /// validation failure, or a handler failure).
    #[error("tool error ({code}): {message}")]
    Tool { code: i32, message: String },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("unexpected response shape: {detail}")]
    UnexpectedResponse { detail: String },
}

/// Event stream and request submission errors
#[derive(Error, Debug)]
pub enum TransportError {
    /// A frame violated the expected shape. Fatal during session
    /// negotiation; logged and skipped afterwards.
    #[error("malformed frame: {detail}")]
    MalformedFrame { detail: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status: {status}")]
    UnexpectedStatus { status: u16 },

    #[error("invalid endpoint URI: {uri}")]
    InvalidEndpoint { uri: String },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value}")]
    InvalidEnvVar { var: String, value: String },

    #[error("invalid listen address: {addr}")]
    InvalidAddress { addr: String },
}

/// Result type alias for protocol operations
pub type Result<T> = std::result::Result<T, SimpleMcpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RegistryError::DuplicateTool {
            name: "add".to_string(),
        };
        assert!(err.to_string().contains("add"));

        let err = ValidationError::MissingParameter {
            name: "b".to_string(),
        };
        assert!(err.to_string().contains('b'));
    }

    #[test]
    fn test_error_conversion() {
        let reg_err = RegistryError::ToolNotFound {
            name: "missing_tool".to_string(),
        };
        let err: SimpleMcpError = reg_err.into();
        assert!(matches!(err, SimpleMcpError::Registry(_)));
    }

    #[test]
    fn test_call_error_kinds_distinguishable() {
        let timeout = CallError::Timeout {
            tool: "slow".to_string(),
            timeout: Duration::from_secs(1),
        };
        let closed = CallError::Session(SessionError::Closed);
        assert!(matches!(timeout, CallError::Timeout { .. }));
        assert!(matches!(closed, CallError::Session(SessionError::Closed)));
    }
}
