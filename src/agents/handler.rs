//! Agent handler implementing AgentPort

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::agents::config::{AgentProfile, HistoryStrategy};
use crate::agents::core::{
    render_system_prompt, render_user_prompt, CancelToken, ConversationLoop,
    ConversationTurnEngine, StreamingTranscoder,
};
use crate::agents::domain::{AgentInfo, AgentPort, ConversationMessage, ConversationResult, EventStream};
use crate::agents::error::{AgentError, AgentResult};
use crate::agents::llm::LlmClient;
use crate::agents::memory::{apply_strategy, HistoryStore};
use crate::agents::workflow::{Workflow, WorkflowExecutor, WorkflowRegistry};
use crate::dispatch::DispatchFacade;

/// Upstream entry point: resolves agent profiles, loads and saves history
/// and runs conversations against the shared dispatch facade.
pub struct AgentHandler {
    dispatch: Arc<DispatchFacade>,
    llm: Arc<dyn LlmClient>,
    store: Arc<dyn HistoryStore>,
    default_strategy: HistoryStrategy,
    agents: Arc<RwLock<HashMap<String, AgentProfile>>>,
    workflows: Arc<RwLock<WorkflowRegistry>>,
}

/// Everything a run needs once the profile and history are resolved
struct PreparedRun {
    profile: AgentProfile,
    session_id: String,
    engine: Arc<ConversationTurnEngine>,
    messages: Vec<ConversationMessage>,
}

impl AgentHandler {
    /// Create a new agent handler
    pub fn new(dispatch: Arc<DispatchFacade>, llm: Arc<dyn LlmClient>, store: Arc<dyn HistoryStore>) -> Self {
        Self {
            dispatch,
            llm,
            store,
            default_strategy: HistoryStrategy::Full,
            agents: Arc::new(RwLock::new(HashMap::new())),
            workflows: Arc::new(RwLock::new(WorkflowRegistry::new())),
        }
    }

    /// Trimming used for agents without their own history strategy
    pub fn with_default_strategy(mut self, strategy: HistoryStrategy) -> Self {
        self.default_strategy = strategy;
        self
    }

    pub fn dispatch(&self) -> &Arc<DispatchFacade> {
        &self.dispatch
    }

    /// Register an agent profile, replacing one with the same name
    pub async fn register_agent(&self, profile: AgentProfile) {
        let mut agents = self.agents.write().await;
        if agents.contains_key(&profile.name) {
            warn!(agent = %profile.name, "Replacing registered agent");
        }
        agents.insert(profile.name.clone(), profile);
    }

    /// Register several agent profiles
    pub async fn register_agents(&self, profiles: impl IntoIterator<Item = AgentProfile>) {
        for profile in profiles {
            self.register_agent(profile).await;
        }
    }

    pub async fn remove_agent(&self, name: &str) -> Option<AgentProfile> {
        self.agents.write().await.remove(name)
    }

    /// Register a workflow plugin
    pub async fn register_workflow(&self, name: impl Into<String>, workflow: Arc<dyn Workflow>) {
        self.workflows.write().await.register(name, workflow);
    }

    pub async fn workflow_names(&self) -> Vec<String> {
        self.workflows.read().await.names()
    }

    async fn profile(&self, name: &str) -> AgentResult<AgentProfile> {
        self.agents
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| AgentError::NotFound(name.to_string()))
    }

    /// Load stored history. Failures degrade to an empty history.
    async fn load_history(&self, profile: &AgentProfile, session_id: &str) -> Vec<ConversationMessage> {
        if !profile.include_history {
            return Vec::new();
        }
        match self.store.load_history(&profile.name, session_id).await {
            Ok(history) => {
                let strategy = profile.history.as_ref().unwrap_or(&self.default_strategy);
                apply_strategy(&history, strategy)
            }
            Err(e) => {
                warn!(agent = %profile.name, session_id = %session_id, error = %e, "Failed to load history, starting empty");
                Vec::new()
            }
        }
    }

    /// Persist a finished run. Failures are only logged.
    async fn save_history(&self, profile: &AgentProfile, session_id: &str, result: &ConversationResult) {
        if !profile.include_history {
            return;
        }
        if result.error.is_some() {
            warn!(agent = %profile.name, session_id = %session_id, "Not saving history of an aborted run");
            return;
        }
        if let Err(e) = self
            .store
            .save_history(&profile.name, session_id, &result.conversation)
            .await
        {
            warn!(agent = %profile.name, session_id = %session_id, error = %e, "Failed to save history");
        }
    }

    async fn prepare(&self, name: &str, input: &Value, session_id: Option<String>) -> AgentResult<PreparedRun> {
        let profile = self.profile(name).await?;
        let session_id = session_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let mut messages = self.load_history(&profile, &session_id).await;
        messages.push(ConversationMessage::user(render_user_prompt(
            profile.prompt_template.as_deref(),
            input,
        )));

        let system_prompt = render_system_prompt(&profile.system_prompt, input);
        let engine = ConversationTurnEngine::new(
            Arc::clone(&self.llm),
            Arc::clone(&self.dispatch),
            profile.clone(),
        )
        .with_system_prompt(system_prompt);

        Ok(PreparedRun {
            profile,
            session_id,
            engine: Arc::new(engine),
            messages,
        })
    }

    /// Run an agent to completion
    pub async fn execute(
        &self,
        name: &str,
        input: Value,
        session_id: Option<String>,
    ) -> AgentResult<ConversationResult> {
        let run = self.prepare(name, &input, session_id).await?;
        info!(
            agent = %run.profile.name,
            session_id = %run.session_id,
            history = run.messages.len() - 1,
            "Starting conversation"
        );

        let mut result = ConversationLoop::new(run.engine).run(run.messages).await;
        self.save_history(&run.profile, &run.session_id, &result).await;

        result.session_id = Some(run.session_id);
        Ok(result)
    }

    /// Run one streamed turn of an agent. History is read but not written.
    pub async fn execute_stream(
        &self,
        name: &str,
        input: Value,
        session_id: Option<String>,
        cancel: CancelToken,
    ) -> AgentResult<EventStream> {
        let run = self.prepare(name, &input, session_id).await?;
        info!(agent = %run.profile.name, session_id = %run.session_id, "Starting streamed turn");
        Ok(StreamingTranscoder::new(run.engine).run_streaming(run.messages, cancel))
    }

    /// Run a registered workflow with this handler as its executor
    pub async fn run_workflow(self: &Arc<Self>, name: &str, input: Value) -> AgentResult<Value> {
        let workflow = self
            .workflows
            .read()
            .await
            .get(name)
            .ok_or_else(|| AgentError::WorkflowNotFound(name.to_string()))?;

        info!(workflow = %name, "Running workflow");
        let executor: Arc<dyn WorkflowExecutor> = Arc::clone(self) as Arc<dyn WorkflowExecutor>;
        workflow
            .execute_workflow(input, executor)
            .await
            .map_err(|e| AgentError::Execution(format!("workflow '{}' failed: {}", name, e)))
    }
}

#[async_trait]
impl AgentPort for AgentHandler {
    async fn execute(
        &self,
        name: &str,
        input: Value,
        session_id: Option<String>,
    ) -> anyhow::Result<ConversationResult> {
        Ok(AgentHandler::execute(self, name, input, session_id).await?)
    }

    async fn execute_stream(
        &self,
        name: &str,
        input: Value,
        session_id: Option<String>,
        cancel: CancelToken,
    ) -> anyhow::Result<EventStream> {
        Ok(AgentHandler::execute_stream(self, name, input, session_id, cancel).await?)
    }

    async fn list_agents(&self) -> anyhow::Result<Vec<AgentInfo>> {
        let agents = self.agents.read().await;
        let mut infos: Vec<AgentInfo> = agents.values().map(AgentInfo::from).collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(infos)
    }

    async fn get_agent(&self, name: &str) -> anyhow::Result<Option<AgentInfo>> {
        let agents = self.agents.read().await;
        Ok(agents.get(name).map(AgentInfo::from))
    }
}

#[async_trait]
impl WorkflowExecutor for AgentHandler {
    async fn run_agent(&self, agent_name: &str, input: Value) -> anyhow::Result<ConversationResult> {
        Ok(self.execute(agent_name, input, None).await?)
    }
}
