//! Workflow plugin boundary
//!
//! A workflow sequences agent runs on its own terms. The engine only knows
//! the `execute_workflow(initial_input, executor)` contract and hands the
//! plugin an executor it can use to run agents.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::agents::domain::ConversationResult;

/// Runs named agents on behalf of a workflow
#[async_trait]
pub trait WorkflowExecutor: Send + Sync {
    async fn run_agent(&self, agent_name: &str, input: Value) -> anyhow::Result<ConversationResult>;
}

/// An opaque workflow plugin
#[async_trait]
pub trait Workflow: Send + Sync {
    async fn execute_workflow(
        &self,
        initial_input: Value,
        executor: Arc<dyn WorkflowExecutor>,
    ) -> anyhow::Result<Value>;
}

/// Workflows available by name
#[derive(Default, Clone)]
pub struct WorkflowRegistry {
    workflows: HashMap<String, Arc<dyn Workflow>>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a workflow, replacing any previous one with the same name
    pub fn register(&mut self, name: impl Into<String>, workflow: Arc<dyn Workflow>) {
        let name = name.into();
        if self.workflows.insert(name.clone(), workflow).is_some() {
            tracing::warn!(workflow = %name, "Replacing registered workflow");
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Workflow>> {
        self.workflows.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.workflows.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.workflows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workflows.is_empty()
    }
}

impl std::fmt::Debug for WorkflowRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowRegistry")
            .field("workflows", &self.names())
            .finish()
    }
}
