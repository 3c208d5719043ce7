//! Conversation engine
//!
//! - [`ConversationTurnEngine`]: one LLM round-trip, executing requested tools
//!   through the dispatch facade or checking the answer against the output
//!   schema
//! - [`ConversationLoop`]: drives the engine turn by turn up to the
//!   iteration ceiling
//! - [`StreamingTranscoder`]: streaming counterpart, re-indexing provider
//!   events into the canonical [`StreamEvent`](crate::agents::domain::StreamEvent)
//!   sequence

mod conversation_loop;
mod streaming;
mod turn;

pub use conversation_loop::ConversationLoop;
pub use streaming::{StreamingTranscoder, TranscodeAction, TranscodeState};
pub use turn::{ConversationTurnEngine, ToolOutcome};

use std::sync::Arc;

use serde_json::Value;
use tera::{Context, Tera};
use tokio::sync::watch;

/// Build a Tera context from the top-level fields of a JSON object
fn input_context(input: &Value) -> Context {
    let mut context = Context::new();

    if let Some(obj) = input.as_object() {
        for (key, value) in obj {
            match value {
                Value::String(s) => {
                    context.insert(key, s);
                }
                Value::Number(n) => {
                    if let Some(i) = n.as_i64() {
                        context.insert(key, &i);
                    } else if let Some(f) = n.as_f64() {
                        context.insert(key, &f);
                    }
                }
                Value::Bool(b) => {
                    context.insert(key, b);
                }
                Value::Array(_) | Value::Object(_) => {
                    // Complex values are exposed as their JSON text
                    context.insert(key, &value.to_string());
                }
                Value::Null => {
                    context.insert(key, &"");
                }
            }
        }
    }

    context
}

/// Render the system prompt as a Tera template with the input values
///
/// This allows system prompts to use template variables like:
/// ```text
/// You are a {{role}} assistant helping with {{task_type}}.
/// ```
///
/// Falls back to the raw system prompt if rendering fails.
pub fn render_system_prompt(system_prompt: &str, input: &Value) -> String {
    if !system_prompt.contains("{{") && !system_prompt.contains("{%") {
        return system_prompt.to_string();
    }

    match Tera::one_off(system_prompt, &input_context(input), false) {
        Ok(rendered) => rendered,
        Err(e) => {
            tracing::warn!("Failed to render system prompt template: {}", e);
            system_prompt.to_string()
        }
    }
}

/// Render the seed user message from the input
///
/// With a template, input fields are template variables. Without one (or
/// when rendering fails), a plain string input is used as-is, then the
/// `prompt` field, then a `key: value` listing of the input fields.
pub fn render_user_prompt(prompt_template: Option<&str>, input: &Value) -> String {
    if let Some(template) = prompt_template.filter(|t| !t.is_empty()) {
        match Tera::one_off(template, &input_context(input), false) {
            Ok(rendered) => return rendered,
            Err(e) => tracing::warn!("Failed to render prompt template: {}", e),
        }
    }
    fallback_prompt(input)
}

fn fallback_prompt(input: &Value) -> String {
    if let Some(text) = input.as_str() {
        return text.to_string();
    }

    if let Some(prompt) = input.get("prompt").and_then(|v| v.as_str()) {
        if !prompt.is_empty() {
            return prompt.to_string();
        }
    }

    if let Some(obj) = input.as_object() {
        let fields: Vec<String> = obj
            .iter()
            .filter(|(k, _)| *k != "session_id")
            .map(|(k, v)| {
                let value_str = match v {
                    Value::String(s) => s.clone(),
                    Value::Null => String::new(),
                    _ => v.to_string(),
                };
                format!("{}: {}", k, value_str)
            })
            .collect();

        if !fields.is_empty() {
            return fields.join("\n");
        }
    }

    String::new()
}

/// Cooperative cancellation signal shared between a caller and a stream.
#[derive(Clone)]
pub struct CancelToken {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }

    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once the token is cancelled
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        while !*receiver.borrow_and_update() {
            if receiver.changed().await.is_err() {
                // Unreachable while this token holds the sender
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
