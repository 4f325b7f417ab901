//! Protocol handling
//!
//! This module turns frames into messages ([`codec`]), matches responses to
//! the requests that caused them ([`correlator`]), and drives one connection
//! end to end ([`session`]).

use crate::types::*;

pub mod codec;
pub mod correlator;
pub mod session;

pub use codec::*;
pub use correlator::*;
pub use session::*;

/// JSON-RPC version carried by every message
pub const JSONRPC_VERSION: &str = "2.0";

/// Protocol version announced in `initialize`.
///
/// The peer's answer is recorded but not negotiated.
pub const PROTOCOL_VERSION: &str = "2025-06-18";

/// JSON-RPC error codes
pub mod error_codes {
    /// Invalid JSON was received
    pub const PARSE_ERROR: i32 = -32700;
    /// The JSON sent is not a valid Request object
    pub const INVALID_REQUEST: i32 = -32600;
    /// The method does not exist / is not available
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid method parameter(s)
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal JSON-RPC error
    pub const INTERNAL_ERROR: i32 = -32603;
}

/// Unified JSON-RPC message type
#[derive(Debug, Clone, PartialEq)]
pub enum JsonRpcMessage {
    /// A request carrying an identifier that expects a response
    Request(JsonRpcRequest),
    /// A response with a result or an error
    Response(JsonRpcResponse),
    /// A fire-and-forget notification
    Notification(JsonRpcNotification),
}

impl JsonRpcMessage {
    /// Get the message ID if it exists
    pub fn id(&self) -> Option<&RequestId> {
        match self {
            JsonRpcMessage::Request(req) => Some(&req.id),
            JsonRpcMessage::Response(resp) => resp.id.as_ref(),
            JsonRpcMessage::Notification(_) => None,
        }
    }

    /// Get the method name if it exists
    pub fn method(&self) -> Option<&str> {
        match self {
            JsonRpcMessage::Request(req) => Some(&req.method),
            JsonRpcMessage::Response(_) => None,
            JsonRpcMessage::Notification(notif) => Some(&notif.method),
        }
    }
}

impl From<JsonRpcRequest> for JsonRpcMessage {
    fn from(request: JsonRpcRequest) -> Self {
        JsonRpcMessage::Request(request)
    }
}

impl From<JsonRpcResponse> for JsonRpcMessage {
    fn from(response: JsonRpcResponse) -> Self {
        JsonRpcMessage::Response(response)
    }
}

impl From<JsonRpcNotification> for JsonRpcMessage {
    fn from(notification: JsonRpcNotification) -> Self {
        JsonRpcMessage::Notification(notification)
    }
}
