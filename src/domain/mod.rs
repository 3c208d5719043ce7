//! Capability domain types and the client session port.
//!
//! A *client* is a connected capability provider (an MCP server reached over
//! some transport). It exposes named tools, prompts and resources. Everything
//! the dispatch layer needs from a client goes through [`ClientSession`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The three kinds of capability a client can provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityKind {
    Tool,
    Prompt,
    Resource,
}

impl CapabilityKind {
    /// All kinds, in discovery order.
    pub const ALL: [CapabilityKind; 3] = [
        CapabilityKind::Tool,
        CapabilityKind::Prompt,
        CapabilityKind::Resource,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityKind::Tool => "tool",
            CapabilityKind::Prompt => "prompt",
            CapabilityKind::Resource => "resource",
        }
    }

    /// Key of the definition array in a list response (`{"tools": [...]}`).
    pub fn list_key(&self) -> &'static str {
        match self {
            CapabilityKind::Tool => "tools",
            CapabilityKind::Prompt => "prompts",
            CapabilityKind::Resource => "resources",
        }
    }

    /// Capitalised label used in error messages ("Tool 'x' not found").
    pub fn label(&self) -> &'static str {
        match self {
            CapabilityKind::Tool => "Tool",
            CapabilityKind::Prompt => "Prompt",
            CapabilityKind::Resource => "Resource",
        }
    }
}

impl std::fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CapabilityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tool" | "tools" => Ok(CapabilityKind::Tool),
            "prompt" | "prompts" => Ok(CapabilityKind::Prompt),
            "resource" | "resources" => Ok(CapabilityKind::Resource),
            other => Err(format!("unknown capability kind: {other}")),
        }
    }
}

/// Capability kinds a client declared at initialization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet {
    #[serde(default)]
    pub tools: bool,
    #[serde(default)]
    pub prompts: bool,
    #[serde(default)]
    pub resources: bool,
}

impl CapabilitySet {
    /// A client that declares every kind.
    pub fn all() -> Self {
        Self {
            tools: true,
            prompts: true,
            resources: true,
        }
    }

    pub fn tools_only() -> Self {
        Self {
            tools: true,
            ..Self::default()
        }
    }

    pub fn contains(&self, kind: CapabilityKind) -> bool {
        match kind {
            CapabilityKind::Tool => self.tools,
            CapabilityKind::Prompt => self.prompts,
            CapabilityKind::Resource => self.resources,
        }
    }

    /// Declared kinds, in discovery order.
    pub fn kinds(&self) -> Vec<CapabilityKind> {
        CapabilityKind::ALL
            .into_iter()
            .filter(|kind| self.contains(*kind))
            .collect()
    }
}

/// A capability as discovered on one client.
///
/// For resources, `name` is the resource URI; that is the key the routing
/// index and `read_resource` use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// JSON Schema of the arguments (tools) or the argument list (prompts).
    #[serde(default)]
    pub parameters: Value,
    /// Id of the client that owns this definition.
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl CapabilityDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
        client_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            client_id: client_id.into(),
            mime_type: None,
        }
    }
}

/// One part of an invocation payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        text: String,
    },
    /// Embedded resource contents.
    Resource {
        uri: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
    Image {
        data: String,
        mime_type: String,
    },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    /// Text carried by this part, if any.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentPart::Text { text } => Some(text),
            ContentPart::Resource { text, .. } => text.as_deref(),
            ContentPart::Image { .. } => None,
        }
    }
}

/// Result of invoking a tool or reading a resource on a client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvocationResult {
    #[serde(default)]
    pub content: Vec<ContentPart>,
    /// Application-level failure reported by the client.
    #[serde(default)]
    pub is_error: bool,
}

impl InvocationResult {
    pub fn success(content: Vec<ContentPart>) -> Self {
        Self {
            content,
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ContentPart::text(message)],
            is_error: true,
        }
    }

    /// First text payload, used as the message of an application error.
    pub fn first_text(&self) -> Option<&str> {
        self.content.iter().find_map(ContentPart::as_text)
    }

    /// All textual payloads joined by newlines. Parts without text are
    /// rendered as a short placeholder so the reader knows they existed.
    pub fn to_text(&self) -> String {
        self.content
            .iter()
            .map(|part| match part {
                ContentPart::Text { text } => text.clone(),
                ContentPart::Resource { uri, text, .. } => {
                    text.clone().unwrap_or_else(|| format!("[resource: {uri}]"))
                }
                ContentPart::Image { mime_type, .. } => format!("[image: {mime_type}]"),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: String,
    pub text: String,
}

/// A rendered prompt returned by a client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub messages: Vec<PromptMessage>,
}

/// Port to one connected client.
///
/// Implementations own the transport. `list` returns the raw list payload
/// (`{"tools": [...]}` or a bare array); shape problems are handled by the
/// registry, while an `Err` means the RPC itself failed.
#[async_trait]
pub trait ClientSession: Send + Sync {
    /// Capability kinds declared by the client.
    fn capabilities(&self) -> CapabilitySet;

    async fn list(&self, kind: CapabilityKind) -> anyhow::Result<Value>;

    async fn call_tool(&self, name: &str, arguments: Value) -> anyhow::Result<InvocationResult>;

    async fn get_prompt(&self, name: &str, arguments: Value) -> anyhow::Result<PromptResult>;

    async fn read_resource(&self, uri: &str) -> anyhow::Result<InvocationResult>;

    /// Release the underlying transport.
    async fn close(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
