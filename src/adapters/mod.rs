//! Adapters connecting the dispatch facade to real clients

pub mod rmcp_session;

pub use rmcp_session::{RmcpConnector, RmcpSession};
