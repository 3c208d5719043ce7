//! Single LLM round-trip

use std::sync::Arc;

use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, warn};

use crate::agents::config::AgentProfile;
use crate::agents::domain::{
    ContentBlock, ConversationMessage, StopReason, ToolInvocationRecord, TurnOutcome, TurnResult,
    TurnState,
};
use crate::agents::error::AgentResult;
use crate::agents::llm::{LlmClient, LlmRequest, ToolDefinition};
use crate::dispatch::{DispatchError, DispatchFacade};
use crate::domain::CapabilityKind;
use crate::schema;

/// What a tool call produced, as fed back to the LLM
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutcome {
    pub content: String,
    pub is_error: bool,
}

/// Runs one LLM round-trip for an agent.
///
/// `AWAITING_LLM` leads either to `TOOL_USE_REQUESTED -> TOOLS_EXECUTED`, or
/// to `RESPONSE_RECEIVED -> SCHEMA_CHECK -> VALID | INVALID`. A failing tool
/// never aborts the turn; its error goes back to the LLM as an error-tagged
/// tool result. A failing LLM call does abort it.
pub struct ConversationTurnEngine {
    llm: Arc<dyn LlmClient>,
    dispatch: Arc<DispatchFacade>,
    profile: AgentProfile,
    system_prompt: String,
}

impl ConversationTurnEngine {
    pub fn new(llm: Arc<dyn LlmClient>, dispatch: Arc<DispatchFacade>, profile: AgentProfile) -> Self {
        if let Some(Err(problems)) = profile.output_schema.as_ref().map(schema::check_schema) {
            warn!(
                agent = %profile.name,
                problems = ?problems,
                "Output schema cannot be enforced, no response will be accepted"
            );
        }
        let system_prompt = profile.system_prompt.clone();
        Self {
            llm,
            dispatch,
            profile,
            system_prompt,
        }
    }

    /// Use an already rendered system prompt instead of the profile's raw one
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    pub fn llm(&self) -> &Arc<dyn LlmClient> {
        &self.llm
    }

    /// Tools this agent may call, in catalogue form
    pub async fn tool_catalogue(&self) -> Vec<ToolDefinition> {
        self.dispatch
            .format_tools_for_consumer(Some(&self.profile))
            .await
            .into_iter()
            .map(ToolDefinition::from)
            .collect()
    }

    pub async fn build_request(&self, messages: &[ConversationMessage]) -> LlmRequest {
        LlmRequest {
            messages: messages.to_vec(),
            tools: self.tool_catalogue().await,
            system_prompt: self.system_prompt.clone(),
            output_schema: self.profile.output_schema.clone(),
            ..LlmRequest::default()
        }
        .with_overrides(&self.profile.llm)
    }

    pub async fn process_turn(&self, messages: &[ConversationMessage]) -> AgentResult<TurnResult> {
        debug!(agent = %self.profile.name, state = ?TurnState::AwaitingLlm, "Calling LLM");
        let request = self.build_request(messages).await;
        let response = self.llm.complete(request).await?;
        let message = response.message;

        if response.stop_reason == StopReason::ToolUse {
            let tool_invocations = tool_uses(&message);
            debug!(
                agent = %self.profile.name,
                state = ?TurnState::ToolUseRequested,
                tool_count = tool_invocations.len(),
                "LLM requested tools"
            );

            let outcomes = self.execute_tool_uses(&tool_invocations).await;
            let results = tool_invocations
                .iter()
                .zip(outcomes)
                .map(|(record, outcome)| {
                    ConversationMessage::tool_result(&record.id, outcome.content, outcome.is_error)
                })
                .collect();

            debug!(agent = %self.profile.name, state = ?TurnState::ToolsExecuted, "Tools executed");
            return Ok(TurnResult {
                outcome: TurnOutcome::ToolResults(results),
                is_final: false,
                state: TurnState::ToolsExecuted,
                assistant_message: message,
                stop_reason: response.stop_reason,
                tool_invocations,
                structured_output: None,
            });
        }

        debug!(agent = %self.profile.name, state = ?TurnState::ResponseReceived, "LLM responded");
        let (outcome, state, structured_output) = self.evaluate_response(&message);
        Ok(TurnResult {
            is_final: matches!(outcome, TurnOutcome::FinalResponse(_)),
            outcome,
            state,
            assistant_message: message,
            stop_reason: response.stop_reason,
            tool_invocations: Vec::new(),
            structured_output,
        })
    }

    /// Classify a non-tool response against the agent's output schema
    pub fn evaluate_response(
        &self,
        message: &ConversationMessage,
    ) -> (TurnOutcome, TurnState, Option<Value>) {
        let Some(output_schema) = &self.profile.output_schema else {
            return (
                TurnOutcome::FinalResponse(message.clone()),
                TurnState::Valid,
                None,
            );
        };

        debug!(agent = %self.profile.name, state = ?TurnState::SchemaCheck, "Validating response");
        let text = message.first_text().unwrap_or_default();
        match schema::parse_and_validate(text, output_schema) {
            Ok(value) => (
                TurnOutcome::FinalResponse(message.clone()),
                TurnState::Valid,
                Some(value),
            ),
            Err(errors) => {
                let reason = errors.join("; ");
                debug!(agent = %self.profile.name, state = ?TurnState::Invalid, reason = %reason, "Response failed schema");
                (TurnOutcome::RetryNeeded { reason }, TurnState::Invalid, None)
            }
        }
    }

    /// Execute tool uses concurrently; outcomes are in request order
    pub async fn execute_tool_uses(&self, records: &[ToolInvocationRecord]) -> Vec<ToolOutcome> {
        join_all(records.iter().map(|record| self.execute_tool_use(record))).await
    }

    /// Execute one tool use with the agent's allow-list and exclusions
    pub async fn execute_tool_use(&self, record: &ToolInvocationRecord) -> ToolOutcome {
        let result = if self.profile.is_excluded(&record.name) {
            Err(DispatchError::Excluded {
                kind: CapabilityKind::Tool,
                name: record.name.clone(),
            })
        } else {
            self.dispatch
                .execute_tool(
                    &record.name,
                    record.input.clone(),
                    None,
                    self.profile.allowed_clients.as_deref(),
                )
                .await
        };

        match result {
            Ok(result) => ToolOutcome {
                content: result.to_text(),
                is_error: false,
            },
            Err(e) => {
                warn!(
                    agent = %self.profile.name,
                    tool = %record.name,
                    tool_use_id = %record.id,
                    error = %e,
                    "Tool call failed"
                );
                ToolOutcome {
                    content: e.to_string(),
                    is_error: true,
                }
            }
        }
    }
}

/// Complete tool-use blocks of an assistant message
fn tool_uses(message: &ConversationMessage) -> Vec<ToolInvocationRecord> {
    message
        .content
        .iter()
        .filter_map(|block| match block {
            ContentBlock::ToolUse { id, name, input } if !id.is_empty() && !name.is_empty() => {
                Some(ToolInvocationRecord::new(id, name, input.clone()))
            }
            ContentBlock::ToolUse { id, name, .. } => {
                warn!(tool_use_id = %id, tool = %name, "Skipping incomplete tool use block");
                None
            }
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::domain::Role;
    use serde_json::json;

    #[test]
    fn test_tool_uses_skips_incomplete_blocks() {
        let message = ConversationMessage::new(
            Role::Assistant,
            vec![
                ContentBlock::text("calling"),
                ContentBlock::tool_use("tu_1", "search", json!({"q": "x"})),
                ContentBlock::tool_use("", "search", json!({})),
                ContentBlock::tool_use("tu_3", "", json!({})),
            ],
        );
        let records = tool_uses(&message);
        assert_eq!(records, vec![ToolInvocationRecord::new("tu_1", "search", json!({"q": "x"}))]);
    }
}
