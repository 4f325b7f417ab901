//! Capability kinds and the descriptors returned by listing.

use super::*;
use crate::{Error, Result};
use serde_json::Value;

/// The three capability families a peer can expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityKind {
    /// Prompt templates
    Prompts,
    /// Readable resources
    Resources,
    /// Callable tools
    Tools,
}

impl CapabilityKind {
    /// All kinds, in listing order
    pub const ALL: [CapabilityKind; 3] = [Self::Prompts, Self::Resources, Self::Tools];

    /// Method that lists this kind
    pub fn list_method(self) -> &'static str {
        match self {
            Self::Prompts => "prompts/list",
            Self::Resources => "resources/list",
            Self::Tools => "tools/list",
        }
    }

    /// Method that invokes one capability of this kind
    pub fn invoke_method(self) -> &'static str {
        match self {
            Self::Prompts => "prompts/get",
            Self::Resources => "resources/read",
            Self::Tools => "tools/call",
        }
    }

    /// Field of the list result holding the descriptors
    pub fn items_field(self) -> &'static str {
        match self {
            Self::Prompts => "prompts",
            Self::Resources => "resources",
            Self::Tools => "tools",
        }
    }

    fn schema_field(self) -> Option<&'static str> {
        match self {
            Self::Prompts => Some("arguments"),
            Self::Resources => None,
            Self::Tools => Some("inputSchema"),
        }
    }
}

impl std::fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.items_field())
    }
}

impl std::str::FromStr for CapabilityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "prompts" => Ok(Self::Prompts),
            "resources" => Ok(Self::Resources),
            "tools" => Ok(Self::Tools),
            other => Err(Error::configuration(format!(
                "unknown capability kind '{other}'"
            ))),
        }
    }
}

/// A named capability as advertised by the peer.
///
/// `schema` holds the tool `inputSchema` or the prompt `arguments`; every other
/// field the peer sent (resource `uri`, `mimeType`, annotations, ...) is kept
/// in `metadata`.
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityDescriptor {
    /// Family this capability belongs to
    pub kind: CapabilityKind,
    /// Name of the capability
    pub name: String,
    /// Optional human-readable description
    pub description: Option<String>,
    /// Argument schema, when the kind has one
    pub schema: Option<Value>,
    /// Remaining descriptor fields
    pub metadata: Params,
}

impl CapabilityDescriptor {
    /// Builds a descriptor from one entry of a list result.
    ///
    /// Fails with [`Error::SchemaViolation`] when the entry is not an object
    /// with a string `name`.
    pub fn from_value(kind: CapabilityKind, value: Value) -> Result<Self> {
        let Value::Object(mut fields) = value else {
            return Err(Error::schema(format!("{kind} entry is not an object")));
        };

        let name = match fields.remove("name") {
            Some(Value::String(name)) => name,
            _ => return Err(Error::schema(format!("{kind} entry has no string \"name\""))),
        };
        let description = match fields.remove("description") {
            Some(Value::String(description)) => Some(description),
            _ => None,
        };
        let schema = kind
            .schema_field()
            .and_then(|field| fields.remove(field))
            .filter(|schema| !schema.is_null());

        Ok(Self {
            kind,
            name,
            description,
            schema,
            metadata: fields,
        })
    }

    /// The identifier to pass to `invoke`: the URI for resources, the name
    /// otherwise.
    pub fn target(&self) -> &str {
        match (self.kind, self.metadata.get("uri")) {
            (CapabilityKind::Resources, Some(Value::String(uri))) => uri,
            _ => &self.name,
        }
    }
}
