//! Resource-related types and messages.
//!
//! Resources are data the peer exposes by URI. URIs are kept as plain strings:
//! peers use custom schemes freely and a listing must not fail because one of
//! them is unusual.

use super::*;

/// A resource advertised by `resources/list`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Resource {
    /// URI identifying this resource.
    pub uri: String,
    /// Human-readable name for this resource.
    pub name: String,
    /// Optional description of what this resource contains.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// MIME type of the resource content.
    #[serde(rename = "mimeType")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// The contents of one resource, as text or base64 blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceContents {
    /// URI of the resource that was read.
    pub uri: String,
    /// MIME type of the content.
    #[serde(rename = "mimeType")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Text contents, for text resources.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Base64 contents, for binary resources.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blob: Option<String>,
}

/// Parameters of `resources/read`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourcesReadRequest {
    /// The URI of the resource to read.
    pub uri: String,
}

/// Result of `resources/read`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourcesReadResponse {
    /// The contents of the resource.
    pub contents: Vec<ResourceContents>,
    /// Response metadata.
    #[serde(flatten)]
    pub meta: ResponseMetadata,
}

impl Resource {
    /// Creates a resource with the given URI and name
    pub fn new(uri: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: name.into(),
            description: None,
            mime_type: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_read_response_text_and_blob() {
        let response: ResourcesReadResponse = serde_json::from_value(json!({
            "contents": [
                {"uri": "file:///test.md", "mimeType": "text/markdown", "text": "# Hi"},
                {"uri": "file:///logo.png", "blob": "iVBORw0KGgo="}
            ]
        }))
        .unwrap();
        assert_eq!(response.contents.len(), 2);
        assert_eq!(response.contents[0].text.as_deref(), Some("# Hi"));
        assert!(response.contents[1].text.is_none());
        assert!(response.contents[1].blob.is_some());
    }

    #[test]
    fn test_custom_scheme_uri_is_accepted() {
        let resource: Resource =
            serde_json::from_value(json!({"uri": "greeting://alice", "name": "greeting"}))
                .unwrap();
        assert_eq!(resource, Resource::new("greeting://alice", "greeting"));
    }
}
