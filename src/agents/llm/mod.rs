//! LLM client port
//!
//! The conversation engine talks to a model through [`LlmClient`]. Concrete
//! providers live outside this crate; the engine only needs a blocking
//! completion and a streaming mode that yields [`ProviderEvent`]s.

mod stream;

pub use stream::*;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::agents::config::LlmOverrides;
use crate::agents::domain::{ConversationMessage, StopReason};
use crate::agents::error::LlmResult;
use crate::domain::CapabilityDefinition;

/// Trait for LLM clients
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Get the provider name
    fn name(&self) -> &str;

    /// Complete a request (non-streaming)
    async fn complete(&self, request: LlmRequest) -> LlmResult<LlmResponse>;

    /// Complete a request with streaming
    fn stream(&self, request: LlmRequest) -> ProviderStream;
}

/// Tool offered to the LLM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// Object JSON Schema of the tool input
    pub input_schema: Value,
}

impl From<CapabilityDefinition> for ToolDefinition {
    fn from(definition: CapabilityDefinition) -> Self {
        Self {
            name: definition.name,
            description: definition.description,
            input_schema: definition.parameters,
        }
    }
}

/// Request for one LLM round-trip
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmRequest {
    /// Messages in the conversation
    pub messages: Vec<ConversationMessage>,
    /// Tools available for calling
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
    /// Effective system prompt
    #[serde(default)]
    pub system_prompt: String,
    /// Schema the final answer must satisfy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
    /// Model to use (overrides client default)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Temperature for sampling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl LlmRequest {
    pub fn with_overrides(mut self, overrides: &LlmOverrides) -> Self {
        self.model = overrides.model.clone();
        self.temperature = overrides.temperature;
        self.max_tokens = overrides.max_tokens;
        self
    }
}

/// Response from LLM completion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    /// Generated assistant message
    pub message: ConversationMessage,
    /// Reason the completion stopped
    pub stop_reason: StopReason,
    /// Token usage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

/// Token usage information
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}
