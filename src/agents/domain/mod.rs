//! Domain types for the conversation engine
//!
//! Core abstractions that define the agent system's domain model.

mod agent;
mod event;
mod message;
mod response;
mod tool_call;

pub use agent::*;
pub use event::*;
pub use message::*;
pub use response::*;
pub use tool_call::*;

use async_trait::async_trait;
use serde_json::Value;

use super::core::CancelToken;

/// Port trait for agent operations
#[async_trait]
pub trait AgentPort: Send + Sync {
    /// Run an agent to completion
    async fn execute(
        &self,
        name: &str,
        input: Value,
        session_id: Option<String>,
    ) -> anyhow::Result<ConversationResult>;

    /// Run one streamed turn of an agent
    async fn execute_stream(
        &self,
        name: &str,
        input: Value,
        session_id: Option<String>,
        cancel: CancelToken,
    ) -> anyhow::Result<EventStream>;

    /// List all available agents
    async fn list_agents(&self) -> anyhow::Result<Vec<AgentInfo>>;

    /// Get agent details by name
    async fn get_agent(&self, name: &str) -> anyhow::Result<Option<AgentInfo>>;
}
