//! Multi-turn conversation loop

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::ConversationTurnEngine;
use crate::agents::domain::{
    ConversationMessage, ConversationResult, Role, ToolInvocationRecord, TurnOutcome,
};
use crate::agents::error::{AgentError, AgentResult};
use crate::schema;

/// Drives a [`ConversationTurnEngine`] until a final response, a fatal
/// error or the iteration ceiling.
///
/// `messages` is the payload of the next LLM call and `history` the audit
/// log of the run. Every message produced by a turn is appended to both
/// before the next turn starts.
pub struct ConversationLoop {
    engine: Arc<ConversationTurnEngine>,
    max_iterations: u32,
}

struct RunState {
    messages: Vec<ConversationMessage>,
    history: Vec<ConversationMessage>,
    /// Index in `history` of the first message produced by this run
    run_start: usize,
    final_response: Option<ConversationMessage>,
    structured_output: Option<Value>,
    tool_uses: Vec<ToolInvocationRecord>,
    error: Option<String>,
    iterations: u32,
}

impl RunState {
    fn append(&mut self, message: ConversationMessage) {
        self.messages.push(message.clone());
        self.history.push(message);
    }
}

impl ConversationLoop {
    pub fn new(engine: Arc<ConversationTurnEngine>) -> Self {
        let max_iterations = engine.profile().max_iterations;
        Self {
            engine,
            max_iterations,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Run the conversation. Never fails: errors are reported in the result.
    pub async fn run(&self, initial_messages: Vec<ConversationMessage>) -> ConversationResult {
        let start_time = Instant::now();
        let agent = self.engine.profile().name.clone();
        let mut run = RunState {
            run_start: initial_messages.len(),
            messages: initial_messages.clone(),
            history: initial_messages,
            final_response: None,
            structured_output: None,
            tool_uses: Vec::new(),
            error: None,
            iterations: 0,
        };

        while run.iterations < self.max_iterations {
            run.iterations += 1;
            debug!(agent = %agent, iteration = run.iterations, "Starting turn");

            let turn = match self.engine.process_turn(&run.messages).await {
                Ok(turn) => turn,
                Err(e) => {
                    error!(agent = %agent, iteration = run.iterations, error = %e, "Turn failed, aborting conversation");
                    run.error = Some(e.to_string());
                    break;
                }
            };

            match turn.outcome {
                TurnOutcome::ToolResults(results) => {
                    // Only the most recent tool turn is reported
                    run.tool_uses = turn.tool_invocations;
                    run.append(turn.assistant_message);
                    if results.is_empty() {
                        warn!(agent = %agent, iteration = run.iterations, "Tool use requested without a complete tool call");
                        run.append(ConversationMessage::user(
                            "Your previous response asked to use a tool but contained no complete tool call.",
                        ));
                    }
                    for result in results {
                        run.append(result);
                    }
                }
                TurnOutcome::FinalResponse(message) => {
                    run.append(message.clone());
                    run.final_response = Some(message);
                    run.structured_output = turn.structured_output;
                    break;
                }
                TurnOutcome::RetryNeeded { reason } => {
                    debug!(agent = %agent, reason = %reason, "Re-prompting for schema-valid output");
                    run.append(turn.assistant_message);
                    run.append(self.correction_message(&reason));
                }
            }
        }

        if run.final_response.is_none() && run.error.is_none() {
            warn!(
                agent = %agent,
                max_iterations = self.max_iterations,
                "Iteration ceiling reached without a final response"
            );
            self.apply_ceiling_fallback(&mut run);
        }

        let execution_time_ms = start_time.elapsed().as_millis() as u64;
        let run_error = run.error.clone();
        let iterations = run.iterations;
        match assemble(run, execution_time_ms) {
            Ok(result) => {
                info!(
                    agent = %agent,
                    iterations = result.iterations,
                    success = result.is_success(),
                    "Conversation finished"
                );
                result
            }
            Err(e) => {
                error!(agent = %agent, error = %e, "Failed to assemble conversation result");
                let message = match run_error {
                    Some(run_error) => format!("result assembly failed: {}; run error: {}", e, run_error),
                    None => format!("result assembly failed: {}", e),
                };
                ConversationResult {
                    error: Some(message),
                    iterations,
                    execution_time_ms,
                    ..ConversationResult::default()
                }
            }
        }
    }

    fn correction_message(&self, reason: &str) -> ConversationMessage {
        let schema_text = self
            .engine
            .profile()
            .output_schema
            .as_ref()
            .and_then(|schema| serde_json::to_string_pretty(schema).ok())
            .unwrap_or_default();

        ConversationMessage::user(format!(
            "Your previous response did not match the required output schema ({}).\n\n\
             Respond with only a JSON value that conforms to this schema:\n{}",
            reason, schema_text
        ))
    }

    /// Use the last assistant message of the run as the final response if
    /// it has text that passes the output schema (when one is set).
    fn apply_ceiling_fallback(&self, run: &mut RunState) {
        let Some(last) = run.history[run.run_start..]
            .iter()
            .rev()
            .find(|message| message.role == Role::Assistant)
        else {
            return;
        };
        let Some(text) = last.first_text() else {
            return;
        };

        match &self.engine.profile().output_schema {
            None => run.final_response = Some(last.clone()),
            Some(output_schema) => {
                if let Ok(value) = schema::parse_and_validate(text, output_schema) {
                    run.final_response = Some(last.clone());
                    run.structured_output = Some(value);
                }
            }
        }
    }
}

fn assemble(run: RunState, execution_time_ms: u64) -> AgentResult<ConversationResult> {
    check_alternation(&run.history[run.run_start.saturating_sub(1)..])?;

    Ok(ConversationResult {
        conversation: run.history,
        final_response: run.final_response,
        structured_output: run.structured_output,
        tool_uses_in_final_turn: run.tool_uses,
        error: run.error,
        iterations: run.iterations,
        execution_time_ms,
        session_id: None,
    })
}

/// Two assistant messages in a row mean a turn was recorded twice.
fn check_alternation(messages: &[ConversationMessage]) -> AgentResult<()> {
    for pair in messages.windows(2) {
        if pair[0].role == Role::Assistant && pair[1].role == Role::Assistant {
            return Err(AgentError::Internal(
                "consecutive assistant messages in conversation".to_string(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_alternation() {
        let good = vec![
            ConversationMessage::user("hi"),
            ConversationMessage::assistant("hello"),
            ConversationMessage::user("again"),
        ];
        assert!(check_alternation(&good).is_ok());

        let bad = vec![
            ConversationMessage::assistant("one"),
            ConversationMessage::assistant("two"),
        ];
        assert!(check_alternation(&bad).is_err());
    }
}
