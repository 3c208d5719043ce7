//! Error types for the conversation engine
//!
//! Tool failures never show up here: the turn engine hands them back to the
//! LLM as error-tagged tool results. What remains is either fatal to a run
//! (an [`LlmError`]) or a problem with the caller's request.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    /// No agent profile registered under this name
    #[error("Agent not found: {0}")]
    NotFound(String),

    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),

    /// The LLM call failed; aborts the run
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// History store failure
    #[error("History store error: {0}")]
    Memory(String),

    /// A workflow plugin failed
    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Broken conversation invariant
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failures reported by an [`LlmClient`](crate::agents::llm::LlmClient)
/// implementation
#[derive(Debug, Error)]
pub enum LlmError {
    /// Provider answered with an error status
    #[error("Provider returned {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("Rate limited: retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Network error: {0}")]
    Network(String),

    /// Provider response could not be decoded
    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Request timed out")]
    Timeout,
}

pub type AgentResult<T> = Result<T, AgentError>;

pub type LlmResult<T> = Result<T, LlmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_error_converts_with_context() {
        let err: AgentError = LlmError::Network("connection reset".to_string()).into();
        assert!(matches!(err, AgentError::Llm(LlmError::Network(_))));
        assert_eq!(err.to_string(), "LLM error: Network error: connection reset");
    }

    #[test]
    fn test_json_error_converts() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: AgentError = json_err.into();
        assert!(err.to_string().starts_with("Serialization error"));
    }
}
