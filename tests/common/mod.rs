#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use switchyard::agents::domain::{ContentBlock, ConversationMessage, Role, StopReason};
use switchyard::agents::error::{LlmError, LlmResult};
use switchyard::agents::llm::{LlmClient, LlmRequest, LlmResponse, ProviderEvent, ProviderStream};
use switchyard::dispatch::{ClientConfig, DispatchFacade};
use switchyard::domain::{
    CapabilityKind, CapabilitySet, ClientSession, ContentPart, InvocationResult, PromptMessage,
    PromptResult,
};

/// LLM client replaying canned responses and recording every request
#[derive(Default)]
pub struct ScriptedLlm {
    responses: Mutex<VecDeque<LlmResult<LlmResponse>>>,
    streams: Mutex<VecDeque<Vec<Result<ProviderEvent, LlmError>>>>,
    pub requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(self, response: LlmResponse) -> Self {
        self.responses.lock().unwrap().push_back(Ok(response));
        self
    }

    pub fn with_error(self, error: LlmError) -> Self {
        self.responses.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn with_stream(self, events: Vec<ProviderEvent>) -> Self {
        self.streams
            .lock()
            .unwrap()
            .push_back(events.into_iter().map(Ok).collect());
        self
    }

    pub fn with_raw_stream(self, events: Vec<Result<ProviderEvent, LlmError>>) -> Self {
        self.streams.lock().unwrap().push_back(events);
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: LlmRequest) -> LlmResult<LlmResponse> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::InvalidRequest("script exhausted".to_string())))
    }

    fn stream(&self, request: LlmRequest) -> ProviderStream {
        self.requests.lock().unwrap().push(request);
        let events = self.streams.lock().unwrap().pop_front().unwrap_or_default();
        ProviderStream::from_events(events)
    }
}

pub fn text_response(text: &str) -> LlmResponse {
    LlmResponse {
        message: ConversationMessage::assistant(text),
        stop_reason: StopReason::EndTurn,
        usage: None,
    }
}

pub fn tool_use_response(calls: &[(&str, &str, Value)]) -> LlmResponse {
    let content = calls
        .iter()
        .map(|(id, name, input)| ContentBlock::tool_use(*id, *name, input.clone()))
        .collect();
    LlmResponse {
        message: ConversationMessage::new(Role::Assistant, content),
        stop_reason: StopReason::ToolUse,
        usage: None,
    }
}

/// In-memory client session. Every tool answers `"<client>:<tool>"`
/// unless a failure was configured for it.
pub struct FakeSession {
    client_id: String,
    tools: Vec<String>,
    prompts: Vec<String>,
    resources: Vec<String>,
    failing: HashMap<String, String>,
    pub calls: Mutex<Vec<(String, Value)>>,
    pub closed: Mutex<bool>,
}

impl FakeSession {
    pub fn new(client_id: &str) -> Self {
        Self {
            client_id: client_id.to_string(),
            tools: Vec::new(),
            prompts: Vec::new(),
            resources: Vec::new(),
            failing: HashMap::new(),
            calls: Mutex::new(Vec::new()),
            closed: Mutex::new(false),
        }
    }

    pub fn with_tools(mut self, names: &[&str]) -> Self {
        self.tools = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn with_prompts(mut self, names: &[&str]) -> Self {
        self.prompts = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn with_resources(mut self, uris: &[&str]) -> Self {
        self.resources = uris.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn failing(mut self, tool: &str, message: &str) -> Self {
        self.failing.insert(tool.to_string(), message.to_string());
        self
    }

    pub fn call_names(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(n, _)| n.clone()).collect()
    }
}

#[async_trait]
impl ClientSession for FakeSession {
    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet {
            tools: !self.tools.is_empty(),
            prompts: !self.prompts.is_empty(),
            resources: !self.resources.is_empty(),
        }
    }

    async fn list(&self, kind: CapabilityKind) -> anyhow::Result<Value> {
        Ok(match kind {
            CapabilityKind::Tool => json!({
                "tools": self.tools.iter().map(|name| json!({
                    "name": name,
                    "description": format!("{} on {}", name, self.client_id),
                    "inputSchema": {"type": "object", "properties": {"q": {"type": "string"}}}
                })).collect::<Vec<_>>()
            }),
            CapabilityKind::Prompt => json!({
                "prompts": self.prompts.iter().map(|name| json!({
                    "name": name,
                    "arguments": [{"name": "topic", "required": true}]
                })).collect::<Vec<_>>()
            }),
            CapabilityKind::Resource => json!({
                "resources": self.resources.iter().map(|uri| json!({
                    "uri": uri,
                    "name": uri,
                    "mimeType": "text/plain"
                })).collect::<Vec<_>>()
            }),
        })
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> anyhow::Result<InvocationResult> {
        self.calls.lock().unwrap().push((name.to_string(), arguments));
        if let Some(message) = self.failing.get(name) {
            return Ok(InvocationResult::error(message.clone()));
        }
        Ok(InvocationResult::success(vec![ContentPart::text(format!(
            "{}:{}",
            self.client_id, name
        ))]))
    }

    async fn get_prompt(&self, name: &str, arguments: Value) -> anyhow::Result<PromptResult> {
        let topic = arguments.get("topic").and_then(Value::as_str).unwrap_or("nothing");
        Ok(PromptResult {
            description: Some(name.to_string()),
            messages: vec![PromptMessage {
                role: "user".to_string(),
                text: format!("Talk about {}", topic),
            }],
        })
    }

    async fn read_resource(&self, uri: &str) -> anyhow::Result<InvocationResult> {
        Ok(InvocationResult::success(vec![ContentPart::Resource {
            uri: uri.to_string(),
            mime_type: Some("text/plain".to_string()),
            text: Some(format!("contents of {}", uri)),
        }]))
    }

    async fn close(&self) -> anyhow::Result<()> {
        *self.closed.lock().unwrap() = true;
        Ok(())
    }
}

/// Connect a fake session under `config`, returning the session for inspection
pub async fn connect(dispatch: &DispatchFacade, config: ClientConfig, session: FakeSession) -> Arc<FakeSession> {
    let session = Arc::new(session);
    dispatch
        .connect_client(config, session.clone())
        .await
        .expect("connect");
    session
}

pub async fn connect_tools(dispatch: &DispatchFacade, client_id: &str, tools: &[&str]) -> Arc<FakeSession> {
    connect(
        dispatch,
        ClientConfig::new(client_id, ""),
        FakeSession::new(client_id).with_tools(tools),
    )
    .await
}
