//! Conversation history persistence
//!
//! Provides storage backends for conversation history:
//! - In-memory (default, lost on restart)
//! - File-based (one JSON file per agent/session)
//!
//! Callers treat both directions as best-effort: a failed load degrades to
//! an empty history and a failed save is only logged.

mod file;
mod in_memory;
mod strategy;

pub use file::FileHistoryStore;
pub use in_memory::InMemoryHistoryStore;
pub use strategy::*;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::agents::config::{MemoryBackend, MemoryConfig};
use crate::agents::domain::{ConversationMessage, SessionSummary};
use crate::agents::error::{AgentError, AgentResult};

/// Trait for history storage backends
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Load the ordered messages of a session; empty when none are stored
    async fn load_history(&self, agent_name: &str, session_id: &str) -> AgentResult<Vec<ConversationMessage>>;

    /// Replace the stored messages of a session
    async fn save_history(
        &self,
        agent_name: &str,
        session_id: &str,
        messages: &[ConversationMessage],
    ) -> AgentResult<()>;

    /// Delete a session
    async fn delete_history(&self, agent_name: &str, session_id: &str) -> AgentResult<()>;

    /// List stored sessions, most recently updated first
    async fn list_sessions(
        &self,
        agent_name: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> AgentResult<Vec<SessionSummary>>;
}

/// A stored session
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredHistory {
    agent_name: String,
    session_id: String,
    messages: Vec<ConversationMessage>,
    /// Last update timestamp (Unix epoch milliseconds)
    updated_at: u64,
}

impl StoredHistory {
    fn new(agent_name: &str, session_id: &str, messages: Vec<ConversationMessage>) -> Self {
        Self {
            agent_name: agent_name.to_string(),
            session_id: session_id.to_string(),
            messages,
            updated_at: chrono::Utc::now().timestamp_millis().max(0) as u64,
        }
    }

    fn to_summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.session_id.clone(),
            agent_name: self.agent_name.clone(),
            message_count: self.messages.len(),
            updated_at: self.updated_at,
        }
    }
}

/// Reject names that cannot be used as a storage key component
fn validate_key(kind: &str, value: &str) -> AgentResult<()> {
    let valid = !value.is_empty()
        && value != "."
        && value != ".."
        && !value.contains(['/', '\\', '\0']);
    if valid {
        Ok(())
    } else {
        Err(AgentError::Memory(format!("invalid {} '{}'", kind, value)))
    }
}

/// Create a history store from configuration
pub fn create_store(config: &MemoryConfig) -> AgentResult<Arc<dyn HistoryStore>> {
    match config.backend {
        MemoryBackend::InMemory => Ok(Arc::new(InMemoryHistoryStore::new(config.max_messages))),
        MemoryBackend::File => Ok(Arc::new(FileHistoryStore::new(&config.path)?)),
    }
}
