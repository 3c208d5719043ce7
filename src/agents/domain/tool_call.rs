//! Tool invocation records

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool call attempted during a turn, recorded whatever its outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocationRecord {
    /// Tool-use id assigned by the LLM
    pub id: String,
    /// Name of the tool being called
    pub name: String,
    /// Arguments passed to the tool
    pub input: Value,
}

impl ToolInvocationRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            input,
        }
    }

    /// Generate a tool-use id for providers that do not supply one
    pub fn generate_id() -> String {
        let uuid = uuid::Uuid::new_v4().simple().to_string();
        format!("toolu_{}", &uuid[..24])
    }
}
