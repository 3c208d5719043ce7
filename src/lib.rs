//! # Switchyard - capability dispatch and conversation engine
//!
//! Switchyard routes tool, prompt and resource calls across many MCP
//! clients and drives LLM conversations that use them.
//!
//! ## Features
//!
//! - **Dispatch**: name-based routing with client hints, allow filters and
//!   ambiguity detection
//! - **Boundaries**: per-client root URIs and exclusion lists
//! - **Conversations**: turn engine, bounded multi-turn loop with
//!   schema-validated output, streaming event transcoding
//! - **Persistence**: in-memory and file-backed conversation history
//! - **Metrics**: Prometheus counters and histograms per client
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use switchyard::adapters::RmcpConnector;
//! use switchyard::config::Settings;
//! use switchyard::dispatch::DispatchFacade;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::new()?;
//!     let dispatch = DispatchFacade::new()?;
//!     dispatch.connect_all(&settings.clients, &RmcpConnector).await;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! Switchyard follows Hexagonal Architecture:
//! - **Domain**: capability types and the client session port
//! - **Dispatch**: registries, routing and the dispatch facade
//! - **Agents**: the conversation engine and its ports
//! - **Adapters**: rmcp client sessions
//! - **Config**: configuration loading and validation

pub mod adapters;
pub mod agents;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod domain;
pub mod schema;
