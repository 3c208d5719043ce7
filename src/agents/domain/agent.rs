//! Agent listing types

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::agents::config::AgentProfile;

/// Agent information returned from list/get operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInfo {
    /// Unique agent name
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// Clients the agent may use (all when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_clients: Option<Vec<String>>,
    /// Capability names hidden from the agent
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_components: Vec<String>,
    /// Optional JSON Schema defining output structure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
    pub max_iterations: u32,
}

impl From<&AgentProfile> for AgentInfo {
    fn from(profile: &AgentProfile) -> Self {
        Self {
            name: profile.name.clone(),
            description: profile.description.clone(),
            allowed_clients: profile.allowed_clients.clone(),
            exclude_components: profile.exclude_components.clone(),
            output_schema: profile.output_schema.clone(),
            max_iterations: profile.max_iterations,
        }
    }
}

/// Summary of a stored conversation history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Unique session identifier
    pub session_id: String,
    /// Agent name this session belongs to
    pub agent_name: String,
    /// Number of messages in the session
    pub message_count: usize,
    /// Last update timestamp (Unix epoch milliseconds)
    pub updated_at: u64,
}
