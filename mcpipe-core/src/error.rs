//! Error types for mcpipe.
//!
//! This module defines all error types used throughout the library. The main
//! [`Error`] enum follows the lifetime of a call: transport faults, decode-time
//! violations, correlation-time violations, errors reported by the peer, and
//! local cancellation.
//!
//! # Propagation
//!
//! - Transport faults are terminal: the session closes and every pending call
//!   fails with [`Error::ConnectionClosed`].
//! - Decode and correlation violations caused by the peer are delivered to the
//!   caller awaiting the affected identifier, if any, and otherwise logged and
//!   dropped.
//! - Local cancellation ([`Error::Cancelled`], [`Error::Timeout`]) releases a
//!   single caller and never affects the transport.
//!
//! # Examples
//!
//! ```rust
//! use mcpipe_core::error::{Error, RemoteError, Result};
//!
//! fn example_function() -> Result<String> {
//!     Err(Error::Remote(RemoteError::new(-32601, "Method not found")))
//! }
//! ```

use crate::types::{JsonRpcError, RequestId};
use thiserror::Error;

/// Result type alias for mcpipe operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for mcpipe operations.
///
/// # Examples
///
/// ```rust
/// use mcpipe_core::error::{Error, TransportError};
/// use mcpipe_core::types::RequestId;
///
/// let transport_err = Error::Transport(TransportError::SendFailed("broken pipe".to_string()));
/// let unknown = Error::UnknownIdentifier(RequestId::Number(7));
/// assert!(transport_err.is_terminal());
/// assert!(!unknown.is_terminal());
/// ```
#[derive(Debug, Error)]
pub enum Error {
    /// I/O fault in the transport layer.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The peer stream ended, or the peer process exited.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Incoming bytes are not a well-formed message.
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// A message parsed but does not match the expected field constraints.
    #[error("Schema violation: {0}")]
    SchemaViolation(String),

    /// A response or cancellation named an identifier with no pending call.
    #[error("Unknown request identifier: {0}")]
    UnknownIdentifier(RequestId),

    /// An identifier was registered while another call with it was pending.
    #[error("Duplicate request identifier: {0}")]
    DuplicateIdentifier(RequestId),

    /// The peer reported an application-level failure.
    #[error("Remote error: {0}")]
    Remote(RemoteError),

    /// The call was cancelled locally.
    #[error("Request cancelled")]
    Cancelled,

    /// The call did not complete within its deadline.
    #[error("Timeout")]
    Timeout,

    /// The client is closing or closed and no longer accepts requests.
    #[error("Client is shutting down")]
    ShuttingDown,

    /// Failed to convert a payload to or from its typed form.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Input/output error from the underlying system.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error (invalid settings, unreadable config file, etc.).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Catch-all for other error types.
    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

/// Transport-specific errors.
///
/// ```rust
/// use mcpipe_core::error::TransportError;
///
/// let error = TransportError::ConnectionFailed("Unable to spawn server".to_string());
/// ```
#[derive(Debug, Error)]
pub enum TransportError {
    /// Failed to establish the connection (spawn failure, missing pipes).
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Failed to write a frame.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Failed to read a frame.
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    /// The outgoing frame would break newline framing.
    #[error("Invalid message format")]
    InvalidMessageFormat,

    /// The transport is not ready for operations.
    #[error("Transport not ready")]
    NotReady,

    /// The transport has been closed and cannot be used.
    #[error("Transport closed")]
    Closed,
}

/// An application-level failure reported by the peer.
///
/// JSON-RPC error responses carry a numeric `code`; tool results flagged with
/// `isError` carry none.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteError {
    /// JSON-RPC error code, when the failure came from an error response.
    pub code: Option<i32>,
    /// Human-readable error message.
    pub message: String,
    /// Additional error information supplied by the peer.
    pub data: Option<serde_json::Value>,
}

impl RemoteError {
    /// Create a remote error with a JSON-RPC code.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
            data: None,
        }
    }

    /// Create a remote error for a tool result flagged with `isError`.
    pub fn tool(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            data: None,
        }
    }
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code {
            Some(code) => write!(f, "[{code}] {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl From<JsonRpcError> for RemoteError {
    fn from(error: JsonRpcError) -> Self {
        Self {
            code: Some(error.code),
            message: error.message,
            data: error.data,
        }
    }
}

impl Error {
    /// Create a new malformed message error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedMessage(msg.into())
    }

    /// Create a new schema violation error.
    ///
    /// ```rust
    /// use mcpipe_core::error::Error;
    ///
    /// let error = Error::schema("response is missing \"id\"");
    /// assert!(matches!(error, Error::SchemaViolation(_)));
    /// ```
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::SchemaViolation(msg.into())
    }

    /// Create a new configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a new transport error.
    pub fn transport(err: TransportError) -> Self {
        Self::Transport(err)
    }

    /// Check if the error is recoverable.
    ///
    /// Recoverable errors are those where issuing the same call again on a
    /// live client might succeed. Retrying is left to the caller.
    ///
    /// ```rust
    /// use mcpipe_core::error::Error;
    ///
    /// assert!(Error::Timeout.is_recoverable());
    /// assert!(!Error::ConnectionClosed.is_recoverable());
    /// ```
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Timeout | Self::Cancelled => true,
            Self::Transport(TransportError::NotReady) => true,
            Self::Remote(_) => true,
            _ => !self.is_terminal(),
        }
    }

    /// Check if the error means the connection is gone.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::ConnectionClosed
                | Self::ShuttingDown
                | Self::Io(_)
                | Self::Transport(
                    TransportError::SendFailed(_)
                        | TransportError::ReceiveFailed(_)
                        | TransportError::Closed
                        | TransportError::ConnectionFailed(_)
                )
        )
    }

    /// The JSON-RPC error code when the peer supplied one.
    pub fn remote_code(&self) -> Option<i32> {
        match self {
            Self::Remote(remote) => remote.code,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_from_jsonrpc() {
        let error = RemoteError::from(JsonRpcError {
            code: -32602,
            message: "Invalid params".to_string(),
            data: Some(serde_json::json!({"field": "path"})),
        });
        assert_eq!(error.code, Some(-32602));
        assert_eq!(error.to_string(), "[-32602] Invalid params");
        assert!(error.data.is_some());
    }

    #[test]
    fn test_tool_error_display_has_no_code() {
        let error = Error::Remote(RemoteError::tool("file not found"));
        assert_eq!(error.to_string(), "Remote error: file not found");
        assert_eq!(error.remote_code(), None);
    }

    #[test]
    fn test_terminal_classification() {
        assert!(Error::ConnectionClosed.is_terminal());
        assert!(Error::ShuttingDown.is_terminal());
        assert!(Error::Transport(TransportError::SendFailed("pipe".into())).is_terminal());
        assert!(!Error::Cancelled.is_terminal());
        assert!(!Error::UnknownIdentifier(RequestId::Number(1)).is_terminal());
        assert!(!Error::schema("x").is_terminal());
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(Error::Timeout.is_recoverable());
        assert!(Error::Remote(RemoteError::new(-32603, "boom")).is_recoverable());
        assert!(!Error::ShuttingDown.is_recoverable());
        assert!(!Error::Transport(TransportError::Closed).is_recoverable());
    }
}
