//! Conversation engine
//!
//! Drives an LLM turn by turn over the capabilities exposed by the
//! dispatch facade.
//!
//! ## Architecture
//!
//! - `domain/` - Core types (messages, turn outcomes, stream events)
//! - `llm/` - LLM client port and provider event stream
//! - `core/` - Turn engine, conversation loop and streaming transcoder
//! - `memory/` - History persistence backends and trimming
//! - `workflow` - Workflow plugin boundary
//! - `handler` - Upstream entry point

pub mod config;
pub mod core;
pub mod domain;
pub mod error;
pub mod handler;
pub mod llm;
pub mod memory;
pub mod workflow;

// Re-export commonly used types
pub use config::*;
pub use domain::*;
pub use error::*;
pub use handler::AgentHandler;
pub use workflow::{Workflow, WorkflowExecutor, WorkflowRegistry};
