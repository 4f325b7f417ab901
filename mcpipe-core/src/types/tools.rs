//! Tool-related types and messages.
//!
//! Tools are functions exposed by the peer, such as reading files or running
//! commands.
//!
//! # Example
//!
//! ```rust
//! use mcpipe_core::types::Tool;
//! use serde_json::json;
//!
//! let tool = Tool::new("read_file", json!({
//!     "type": "object",
//!     "properties": { "path": { "type": "string" } },
//!     "required": ["path"]
//! }))
//! .with_description("Read the contents of a file");
//! assert_eq!(tool.name, "read_file");
//! ```

use super::*;
use smallvec::SmallVec;

/// Tool represents a function that can be called through `tools/call`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    /// The unique name of the tool.
    pub name: String,
    /// Optional human-readable description of what the tool does.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema describing the tool's arguments.
    #[serde(rename = "inputSchema", default)]
    pub input_schema: serde_json::Value,
}

impl Tool {
    /// Creates a new tool with the given name and input schema
    pub fn new(name: impl Into<String>, input_schema: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            description: None,
            input_schema,
        }
    }

    /// Adds a description to the tool
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Parameters of `tools/call`.
///
/// ```rust
/// use mcpipe_core::types::ToolsCallRequest;
/// use serde_json::json;
///
/// let request = ToolsCallRequest {
///     name: "read_file".to_string(),
///     arguments: Some(json!({"path": "test.md"}).as_object().cloned().unwrap()),
/// };
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsCallRequest {
    /// The name of the tool to call.
    pub name: String,
    /// Arguments, structured according to the tool's input schema.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Params>,
}

/// Result of `tools/call`.
///
/// The `content` field uses `SmallVec` since most tool results carry one or
/// two items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsCallResponse {
    /// Content produced by the tool.
    #[serde(default)]
    pub content: SmallVec<[Content; 2]>,
    /// Optional structured result.
    #[serde(rename = "structuredContent")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<serde_json::Value>,
    /// Whether the tool reported a failure.
    #[serde(rename = "isError")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
    /// Response metadata.
    #[serde(flatten)]
    pub meta: ResponseMetadata,
}

impl ToolsCallResponse {
    /// Creates a successful result
    pub fn success(content: Vec<Content>) -> Self {
        Self {
            content: content.into(),
            structured_content: None,
            is_error: Some(false),
            meta: ResponseMetadata::default(),
        }
    }

    /// Creates a failed result
    pub fn error(content: Vec<Content>) -> Self {
        Self {
            is_error: Some(true),
            ..Self::success(content)
        }
    }

    /// Whether the tool flagged this result as a failure
    pub fn is_error(&self) -> bool {
        self.is_error.unwrap_or(false)
    }

    /// Text items joined by newlines
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(Content::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_call_response_from_wire() {
        let response: ToolsCallResponse = serde_json::from_value(json!({
            "content": [{"type": "text", "text": "Hi, MCP client"}],
            "isError": false
        }))
        .unwrap();
        assert!(!response.is_error());
        assert_eq!(response.text(), "Hi, MCP client");
    }

    #[test]
    fn test_call_response_defaults() {
        let response: ToolsCallResponse = serde_json::from_value(json!({})).unwrap();
        assert!(response.content.is_empty());
        assert!(!response.is_error());
    }

    #[test]
    fn test_error_result_text_joins_segments() {
        let response = ToolsCallResponse::error(vec!["first".into(), "second".into()]);
        assert!(response.is_error());
        assert_eq!(response.text(), "first\nsecond");
    }

    #[test]
    fn test_tool_without_schema() {
        let tool: Tool = serde_json::from_value(json!({"name": "read_file"})).unwrap();
        assert_eq!(tool.name, "read_file");
        assert!(tool.input_schema.is_null());
    }
}
