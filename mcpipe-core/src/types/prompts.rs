//! Prompt-related types and messages

use super::*;

/// Prompt represents a template for generating messages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prompt {
    /// The name of the prompt
    pub name: String,
    /// Optional description of what the prompt does
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Optional list of arguments this prompt accepts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Vec<PromptArgument>>,
}

/// Argument definition for prompts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptArgument {
    /// The name of the argument
    pub name: String,
    /// Optional description of what this argument is for
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether this argument is required (defaults to false if not specified)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
}

/// Message in a prompt response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptMessage {
    /// The role of the message sender
    pub role: MessageRole,
    /// The content of the message
    pub content: Content,
}

/// Message roles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Message from a user
    User,
    /// Message from an assistant/AI
    Assistant,
}

/// Parameters of `prompts/get`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptsGetRequest {
    /// The name of the prompt to retrieve
    pub name: String,
    /// Optional arguments to pass to the prompt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<PromptArguments>,
}

/// Result of `prompts/get`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptsGetResponse {
    /// Optional description of the prompt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The messages that make up the prompt
    pub messages: Vec<PromptMessage>,
    /// Response metadata
    #[serde(flatten)]
    pub meta: ResponseMetadata,
}

impl Prompt {
    /// Creates a new prompt with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            arguments: None,
        }
    }
}

/// Converts free-form arguments to the string map `prompts/get` expects.
///
/// Strings pass through unchanged; every other value is sent as its JSON text.
pub fn prompt_arguments(arguments: &Params) -> PromptArguments {
    arguments
        .iter()
        .map(|(key, value)| {
            let text = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), text)
        })
        .collect()
}
