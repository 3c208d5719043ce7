//! Turn and conversation result types

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ConversationMessage, ToolInvocationRecord};

/// Why the LLM stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    /// The response requests tool calls
    ToolUse,
    MaxTokens,
    StopSequence,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::EndTurn => write!(f, "end_turn"),
            StopReason::ToolUse => write!(f, "tool_use"),
            StopReason::MaxTokens => write!(f, "max_tokens"),
            StopReason::StopSequence => write!(f, "stop_sequence"),
        }
    }
}

/// State of a single turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TurnState {
    AwaitingLlm,
    ToolUseRequested,
    ToolsExecuted,
    ResponseReceived,
    SchemaCheck,
    /// Terminal: the response is final
    Valid,
    Invalid,
}

/// Control signal from one turn to the loop driving it
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// The assistant answered; the conversation is done
    FinalResponse(ConversationMessage),
    /// One user-role tool-result message per requested tool use
    ToolResults(Vec<ConversationMessage>),
    /// The answer failed output-schema validation and must be re-prompted
    RetryNeeded { reason: String },
}

/// Everything a turn produced
#[derive(Debug, Clone)]
pub struct TurnResult {
    pub outcome: TurnOutcome,
    pub is_final: bool,
    /// State the turn ended in
    pub state: TurnState,
    /// The LLM message this turn received
    pub assistant_message: ConversationMessage,
    pub stop_reason: StopReason,
    /// Tool calls attempted this turn, in request order
    pub tool_invocations: Vec<ToolInvocationRecord>,
    /// Decoded answer when an output schema validated it
    pub structured_output: Option<Value>,
}

/// Result of a full conversation run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationResult {
    /// Full message history of the run, seed message included
    pub conversation: Vec<ConversationMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_response: Option<ConversationMessage>,
    /// Decoded final answer when the agent has an output schema
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_output: Option<Value>,
    /// Tool calls made while answering the latest user message
    #[serde(default)]
    pub tool_uses_in_final_turn: Vec<ToolInvocationRecord>,
    /// Terminal error, if the run aborted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// LLM turns performed
    pub iterations: u32,
    pub execution_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl ConversationResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.final_response.is_some()
    }

    /// Text of the final response, empty when there is none
    pub fn final_text(&self) -> String {
        self.final_response
            .as_ref()
            .map(ConversationMessage::text)
            .unwrap_or_default()
    }
}
