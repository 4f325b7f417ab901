//! Session-level protocol messages
//!
//! The initialize handshake, cancellation, and server log notifications.

use super::*;

/// Method and notification names used by the client
pub mod methods {
    /// Handshake request
    pub const INITIALIZE: &str = "initialize";
    /// Sent by the client once the handshake response arrived
    pub const INITIALIZED: &str = "notifications/initialized";
    /// Liveness check, valid in both directions
    pub const PING: &str = "ping";
    /// Cancellation notice for an in-flight request
    pub const CANCELLED: &str = "notifications/cancelled";
    /// Server log message
    pub const LOG_MESSAGE: &str = "notifications/message";
}

/// Initialize request - first message sent by client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeRequest {
    /// The protocol version announced by the client
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    /// The capabilities supported by the client
    pub capabilities: ClientCapabilities,
    /// Information about the client implementation
    #[serde(rename = "clientInfo")]
    pub client_info: Implementation,
}

/// Initialize response from the peer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeResponse {
    /// The protocol version the peer answered with
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    /// The capabilities supported by the peer
    #[serde(default)]
    pub capabilities: ServerCapabilities,
    /// Information about the peer implementation
    #[serde(rename = "serverInfo")]
    pub server_info: Implementation,
    /// Optional usage instructions from the peer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

/// Cancelled notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelledNotification {
    /// ID of the request being cancelled
    #[serde(rename = "requestId")]
    pub request_id: RequestId,
    /// Optional reason for cancellation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Log message levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Detailed debug information
    Debug,
    /// Interesting events
    Info,
    /// Normal but significant events
    Notice,
    /// Warning conditions
    Warning,
    /// Error conditions
    Error,
    /// Critical conditions
    Critical,
    /// Action must be taken immediately
    Alert,
    /// System is unusable
    Emergency,
}

/// Log notification sent from the peer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingNotification {
    /// The severity level of the log message
    pub level: LogLevel,
    /// The log message content or structured data
    pub data: serde_json::Value,
    /// Optional logger name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logger: Option<String>,
}
