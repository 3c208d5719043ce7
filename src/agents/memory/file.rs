//! File-based history store

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;

use super::{validate_key, HistoryStore, StoredHistory};
use crate::agents::domain::{ConversationMessage, SessionSummary};
use crate::agents::error::{AgentError, AgentResult};

/// File-based history store: `<base>/<agent>/<session>.json`
pub struct FileHistoryStore {
    base_path: PathBuf,
}

impl FileHistoryStore {
    /// Create a new file store
    pub fn new(base_path: impl Into<PathBuf>) -> AgentResult<Self> {
        let base_path = base_path.into();

        // Create directory if it doesn't exist (sync for constructor)
        std::fs::create_dir_all(&base_path).map_err(|e| {
            AgentError::Memory(format!("Failed to create directory: {}", e))
        })?;

        Ok(Self { base_path })
    }

    fn session_path(&self, agent_name: &str, session_id: &str) -> AgentResult<PathBuf> {
        validate_key("agent name", agent_name)?;
        validate_key("session id", session_id)?;
        Ok(self
            .base_path
            .join(agent_name)
            .join(format!("{}.json", session_id)))
    }

    async fn read_agent_dir(&self, dir: PathBuf, summaries: &mut Vec<SessionSummary>) -> AgentResult<()> {
        let mut entries = fs::read_dir(&dir).await.map_err(|e| {
            AgentError::Memory(format!("Failed to read directory: {}", e))
        })?;

        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            AgentError::Memory(format!("Failed to read directory entry: {}", e))
        })? {
            let path = entry.path();
            if path.extension().map_or(false, |ext| ext == "json") {
                if let Ok(content) = fs::read_to_string(&path).await {
                    match serde_json::from_str::<StoredHistory>(&content) {
                        Ok(stored) => summaries.push(stored.to_summary()),
                        Err(e) => tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable history file"),
                    }
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for FileHistoryStore {
    async fn load_history(&self, agent_name: &str, session_id: &str) -> AgentResult<Vec<ConversationMessage>> {
        let path = self.session_path(agent_name, session_id)?;

        if !path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&path).await.map_err(|e| {
            AgentError::Memory(format!("Failed to read history file: {}", e))
        })?;

        let stored: StoredHistory = serde_json::from_str(&content)?;
        Ok(stored.messages)
    }

    async fn save_history(
        &self,
        agent_name: &str,
        session_id: &str,
        messages: &[ConversationMessage],
    ) -> AgentResult<()> {
        let path = self.session_path(agent_name, session_id)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                AgentError::Memory(format!("Failed to create directory: {}", e))
            })?;
        }

        let stored = StoredHistory::new(agent_name, session_id, messages.to_vec());
        let content = serde_json::to_string_pretty(&stored)?;

        fs::write(&path, content).await.map_err(|e| {
            AgentError::Memory(format!("Failed to write history file: {}", e))
        })?;

        Ok(())
    }

    async fn delete_history(&self, agent_name: &str, session_id: &str) -> AgentResult<()> {
        let path = self.session_path(agent_name, session_id)?;

        if path.exists() {
            fs::remove_file(&path).await.map_err(|e| {
                AgentError::Memory(format!("Failed to delete history file: {}", e))
            })?;
        }

        Ok(())
    }

    async fn list_sessions(
        &self,
        agent_name: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> AgentResult<Vec<SessionSummary>> {
        let mut summaries = Vec::new();

        match agent_name {
            Some(agent_name) => {
                validate_key("agent name", agent_name)?;
                let dir = self.base_path.join(agent_name);
                if dir.is_dir() {
                    self.read_agent_dir(dir, &mut summaries).await?;
                }
            }
            None => {
                let mut entries = fs::read_dir(&self.base_path).await.map_err(|e| {
                    AgentError::Memory(format!("Failed to read directory: {}", e))
                })?;
                while let Some(entry) = entries.next_entry().await.map_err(|e| {
                    AgentError::Memory(format!("Failed to read directory entry: {}", e))
                })? {
                    let path = entry.path();
                    if path.is_dir() {
                        self.read_agent_dir(path, &mut summaries).await?;
                    }
                }
            }
        }

        // Sort by updated_at descending
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        Ok(summaries.into_iter().skip(offset).take(limit).collect())
    }
}
