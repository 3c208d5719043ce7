//! In-memory history store

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{validate_key, HistoryStore, StoredHistory};
use crate::agents::domain::{ConversationMessage, SessionSummary};
use crate::agents::error::AgentResult;

/// In-memory history store keyed by (agent, session)
pub struct InMemoryHistoryStore {
    sessions: Arc<RwLock<HashMap<(String, String), StoredHistory>>>,
    max_messages_per_session: usize,
}

impl InMemoryHistoryStore {
    /// Create a new in-memory store
    pub fn new(max_messages_per_session: usize) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            max_messages_per_session,
        }
    }
}

impl Default for InMemoryHistoryStore {
    fn default() -> Self {
        Self::new(500)
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn load_history(&self, agent_name: &str, session_id: &str) -> AgentResult<Vec<ConversationMessage>> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .get(&(agent_name.to_string(), session_id.to_string()))
            .map(|stored| stored.messages.clone())
            .unwrap_or_default())
    }

    async fn save_history(
        &self,
        agent_name: &str,
        session_id: &str,
        messages: &[ConversationMessage],
    ) -> AgentResult<()> {
        validate_key("agent name", agent_name)?;
        validate_key("session id", session_id)?;

        // Keep the most recent messages, never starting on a tool result
        let mut start = messages.len().saturating_sub(self.max_messages_per_session);
        while start < messages.len() && messages[start].is_tool_result() {
            start += 1;
        }

        let stored = StoredHistory::new(agent_name, session_id, messages[start..].to_vec());
        let mut sessions = self.sessions.write().await;
        sessions.insert((agent_name.to_string(), session_id.to_string()), stored);
        Ok(())
    }

    async fn delete_history(&self, agent_name: &str, session_id: &str) -> AgentResult<()> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(&(agent_name.to_string(), session_id.to_string()));
        Ok(())
    }

    async fn list_sessions(
        &self,
        agent_name: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> AgentResult<Vec<SessionSummary>> {
        let sessions = self.sessions.read().await;

        let mut summaries: Vec<SessionSummary> = sessions
            .values()
            .filter(|s| agent_name.map_or(true, |name| s.agent_name == name))
            .map(|s| s.to_summary())
            .collect();

        // Sort by updated_at descending
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        Ok(summaries.into_iter().skip(offset).take(limit).collect())
    }
}
