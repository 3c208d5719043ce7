//! Configuration types for agents

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Per-execution agent profile
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentProfile {
    /// Unique agent name
    pub name: String,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
    /// System prompt; may contain Tera variables rendered against the input
    #[serde(default)]
    pub system_prompt: String,
    /// Tera template turning structured input into the seed user message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_template: Option<String>,
    /// Clients this agent may use (all connected clients when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_clients: Option<Vec<String>>,
    /// Capability names hidden from and rejected for this agent
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_components: Vec<String>,
    /// Explicit tool names offered to the LLM (the whole filtered catalogue when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<String>>,
    /// LLM overrides
    #[serde(default)]
    pub llm: LlmOverrides,
    /// Maximum LLM turns per conversation
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Whether stored history is loaded and saved
    #[serde(default = "default_include_history")]
    pub include_history: bool,
    /// Trimming applied to loaded history (the memory default when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<HistoryStrategy>,
    /// Optional JSON Schema the final answer must satisfy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
}

impl AgentProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            system_prompt: String::new(),
            prompt_template: None,
            allowed_clients: None,
            exclude_components: Vec::new(),
            tools: None,
            llm: LlmOverrides::default(),
            max_iterations: default_max_iterations(),
            include_history: default_include_history(),
            history: None,
            output_schema: None,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_allowed_clients(mut self, clients: Vec<String>) -> Self {
        self.allowed_clients = Some(clients);
        self
    }

    pub fn with_exclusions(mut self, names: Vec<String>) -> Self {
        self.exclude_components = names;
        self
    }

    pub fn with_output_schema(mut self, schema: Value) -> Self {
        self.output_schema = Some(schema);
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        self.exclude_components.iter().any(|excluded| excluded == name)
    }
}

pub fn default_max_iterations() -> u32 {
    10
}

fn default_include_history() -> bool {
    true
}

/// LLM parameters an agent may override
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct LlmOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// History persistence configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MemoryConfig {
    /// Storage backend type
    #[serde(default)]
    pub backend: MemoryBackend,
    /// Directory for the file backend
    #[serde(default = "default_memory_path")]
    pub path: String,
    /// Maximum number of messages kept per session by the in-memory backend
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,
    /// Default trimming for agents that do not set their own
    #[serde(default)]
    pub strategy: HistoryStrategy,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            backend: MemoryBackend::InMemory,
            path: default_memory_path(),
            max_messages: default_max_messages(),
            strategy: HistoryStrategy::Full,
        }
    }
}

fn default_memory_path() -> String {
    "data/history".to_string()
}

fn default_max_messages() -> usize {
    500
}

/// History storage backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MemoryBackend {
    /// Store in memory only (lost on restart)
    #[default]
    InMemory,
    /// One JSON file per agent/session
    File,
}

/// History trimming strategies
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HistoryStrategy {
    /// Keep all messages
    #[default]
    Full,
    /// Most recent messages only
    SlidingWindow {
        /// Number of messages to keep
        size: usize,
    },
    /// First N messages + last M messages
    FirstLast {
        /// Number of initial messages to keep
        first: usize,
        /// Number of recent messages to keep
        last: usize,
    },
}
