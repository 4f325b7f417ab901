//! Core wire types
//!
//! JSON-RPC 2.0 envelopes plus the subset of Model Context Protocol payloads
//! a client needs for listing and invoking capabilities.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub mod capabilities;
pub mod descriptor;
pub mod messages;
pub mod prompts;
pub mod resources;
pub mod tools;

pub use capabilities::*;
pub use descriptor::*;
pub use messages::*;
pub use prompts::*;
pub use resources::*;
pub use tools::*;

/// Parameter payload: a mapping from string key to arbitrary JSON value.
///
/// Shape is not checked locally; schema validation is the peer's job.
pub type Params = serde_json::Map<String, serde_json::Value>;

/// JSON-RPC 2.0 request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC protocol version (always "2.0")
    pub jsonrpc: String,
    /// Unique identifier for the request
    pub id: RequestId,
    /// Name of the method to be invoked
    pub method: String,
    /// Named parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Params>,
}

/// JSON-RPC 2.0 response
///
/// Exactly one of `result` and `error` is present on the wire. `id` is only
/// `None` on error responses to requests the peer could not read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC protocol version (always "2.0")
    pub jsonrpc: String,
    /// Identifier matching the request this is a response to
    pub id: Option<RequestId>,
    /// Result of the method call (only present if the call succeeded)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Error information (only present if the call failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    /// JSON-RPC protocol version (always "2.0")
    pub jsonrpc: String,
    /// Name of the notification
    pub method: String,
    /// Named parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Params>,
}

/// JSON-RPC 2.0 error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code (standard JSON-RPC codes or MCP-specific codes)
    pub code: i32,
    /// Brief error message
    pub message: String,
    /// Additional error information (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl JsonRpcRequest {
    /// Creates a request with the given identifier
    pub fn new(id: impl Into<RequestId>, method: impl Into<String>, params: Option<Params>) -> Self {
        Self {
            jsonrpc: crate::protocol::JSONRPC_VERSION.to_string(),
            id: id.into(),
            method: method.into(),
            params,
        }
    }
}

impl JsonRpcResponse {
    /// Creates a success response
    pub fn success(id: impl Into<RequestId>, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: crate::protocol::JSONRPC_VERSION.to_string(),
            id: Some(id.into()),
            result: Some(result),
            error: None,
        }
    }

    /// Creates an error response
    pub fn failure(id: Option<RequestId>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: crate::protocol::JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

impl JsonRpcNotification {
    /// Creates a notification
    pub fn new(method: impl Into<String>, params: Option<Params>) -> Self {
        Self {
            jsonrpc: crate::protocol::JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }
}

impl JsonRpcError {
    /// Creates an error object without extra data
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

/// Request ID can be a string or an integer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum RequestId {
    /// String identifier
    String(String),
    /// Numeric identifier
    Number(i64),
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        RequestId::String(s)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId::String(s.to_string())
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        RequestId::Number(n)
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestId::String(s) => write!(f, "{s}"),
            RequestId::Number(n) => write!(f, "{n}"),
        }
    }
}

/// Pagination parameters shared by every list request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaginationParams {
    /// Opaque cursor returned by the previous page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// Text content with optional annotations.
///
/// ```rust
/// use mcpipe_core::types::TextContent;
///
/// let text = TextContent::new("Hello, world!");
/// assert_eq!(text.text, "Hello, world!");
/// assert!(text.annotations.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    /// The text itself
    pub text: String,
    /// Optional annotations (audience, priority, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<serde_json::Value>,
}

impl TextContent {
    /// Creates a new text content instance
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            annotations: None,
        }
    }
}

/// Base64-encoded binary content (images and audio)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryContent {
    /// Base64 encoded data
    pub data: String,
    /// MIME type of the data
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    /// Optional annotations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<serde_json::Value>,
}

/// A resource embedded in a tool result or prompt message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedResource {
    /// The embedded contents
    pub resource: ResourceContents,
    /// Optional annotations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<serde_json::Value>,
}

/// Typed content item, distinguished on the wire by its `type` field.
///
/// ```rust
/// use mcpipe_core::types::Content;
///
/// let content = Content::from("Hi, MCP client");
/// assert_eq!(content.as_text(), Some("Hi, MCP client"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Content {
    /// Plain text segment
    #[serde(rename = "text")]
    Text(TextContent),
    /// Image data
    #[serde(rename = "image")]
    Image(BinaryContent),
    /// Audio data
    #[serde(rename = "audio")]
    Audio(BinaryContent),
    /// Embedded resource contents
    #[serde(rename = "resource")]
    Resource(EmbeddedResource),
}

impl Content {
    /// The text of a text item, if this is one
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text(text) => Some(&text.text),
            _ => None,
        }
    }
}

impl From<TextContent> for Content {
    fn from(text: TextContent) -> Self {
        Content::Text(text)
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Content::Text(TextContent::new(text))
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Content::Text(TextContent::new(text))
    }
}

/// Implementation info
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Implementation {
    /// Name of the implementation
    pub name: String,
    /// Version of the implementation
    pub version: String,
}

impl Default for Implementation {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Meta information included in responses
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ResponseMetadata {
    /// Additional metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _meta: Option<serde_json::Value>,
}

/// Arguments for prompt retrieval are string-valued on the wire
pub type PromptArguments = HashMap<String, String>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_id_forms() {
        let numeric: RequestId = serde_json::from_value(json!(42)).unwrap();
        let text: RequestId = serde_json::from_value(json!("abc")).unwrap();
        assert_eq!(numeric, RequestId::Number(42));
        assert_eq!(text, RequestId::from("abc"));
        assert!(serde_json::from_value::<RequestId>(json!(1.5)).is_err());
        assert!(serde_json::from_value::<RequestId>(json!(null)).is_err());
    }

    #[test]
    fn test_content_tagging() {
        let content: Content =
            serde_json::from_value(json!({"type": "text", "text": "Hi, MCP client"})).unwrap();
        assert_eq!(content.as_text(), Some("Hi, MCP client"));

        let image: Content = serde_json::from_value(json!({
            "type": "image",
            "data": "aGVsbG8=",
            "mimeType": "image/png"
        }))
        .unwrap();
        assert!(image.as_text().is_none());
        assert_eq!(
            serde_json::to_value(&image).unwrap()["mimeType"],
            json!("image/png")
        );
    }

    #[test]
    fn test_response_id_null_serializes() {
        let response = JsonRpcResponse::failure(None, JsonRpcError::new(-32700, "Parse error"));
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["id"], json!(null));
        assert!(value.get("result").is_none());
    }
}
