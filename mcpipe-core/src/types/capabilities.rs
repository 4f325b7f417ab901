//! Capability advertisement types exchanged during `initialize`

use super::*;

/// Client capabilities advertised during initialization
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClientCapabilities {
    /// Experimental capabilities as arbitrary key-value pairs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental: Option<HashMap<String, serde_json::Value>>,
    /// Client roots capability for filesystem-like access
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roots: Option<RootsCapability>,
}

/// Server capabilities advertised during initialization
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServerCapabilities {
    /// Experimental capabilities as arbitrary key-value pairs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental: Option<HashMap<String, serde_json::Value>>,
    /// Present when the server emits log notifications
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<serde_json::Value>,
    /// Server prompts capability
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompts: Option<ListChangedCapability>,
    /// Server resources capability
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourcesCapability>,
    /// Server tools capability
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ListChangedCapability>,
}

/// Roots capability (client-side)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootsCapability {
    /// Whether the client supports receiving roots list changed notifications
    #[serde(rename = "listChanged")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// Capability that only advertises list-changed notifications
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ListChangedCapability {
    /// Whether the server sends list changed notifications
    #[serde(rename = "listChanged")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// Resources capability (server-side)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ResourcesCapability {
    /// Whether the server supports per-resource subscriptions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscribe: Option<bool>,
    /// Whether the server sends list changed notifications
    #[serde(rename = "listChanged")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

impl ClientCapabilities {
    /// Enable roots
    pub fn with_roots(mut self, list_changed: bool) -> Self {
        self.roots = Some(RootsCapability {
            list_changed: Some(list_changed),
        });
        self
    }

    /// Add an experimental capability
    pub fn with_experimental(mut self, key: String, value: serde_json::Value) -> Self {
        self.experimental
            .get_or_insert_with(HashMap::new)
            .insert(key, value);
        self
    }
}

impl ServerCapabilities {
    /// Whether the server advertised the given capability kind.
    ///
    /// Listing is not gated on this: peers often omit the advertisement while
    /// still answering the list request.
    pub fn supports(&self, kind: CapabilityKind) -> bool {
        match kind {
            CapabilityKind::Prompts => self.prompts.is_some(),
            CapabilityKind::Resources => self.resources.is_some(),
            CapabilityKind::Tools => self.tools.is_some(),
        }
    }
}
