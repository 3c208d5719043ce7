//! Client configuration and the pool of connected clients.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{CapabilitySet, ClientSession};

/// Static configuration of one client
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Unique client id
    pub id: String,
    /// Endpoint of the client (streamable HTTP URL for the rmcp adapter)
    #[serde(default)]
    pub url: String,
    /// Root URIs bounding resource access
    #[serde(default)]
    pub roots: Vec<String>,
    /// Capability names this client may not register
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Per-call timeout
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    /// Relative weight reported in client listings
    #[serde(default = "default_routing_weight")]
    pub routing_weight: u32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_timeout() -> u64 {
    30
}

fn default_routing_weight() -> u32 {
    1
}

fn default_enabled() -> bool {
    true
}

impl ClientConfig {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            roots: Vec::new(),
            exclude: Vec::new(),
            timeout_seconds: default_timeout(),
            routing_weight: default_routing_weight(),
            enabled: default_enabled(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// A client with a live session
#[derive(Clone)]
pub struct ConnectedClient {
    pub config: ClientConfig,
    pub session: Arc<dyn ClientSession>,
    pub capabilities: CapabilitySet,
    pub connected_at: DateTime<Utc>,
    /// Per-call timeout; a copy of the configured one unless overridden
    pub timeout: Duration,
}

impl ConnectedClient {
    pub fn new(config: ClientConfig, session: Arc<dyn ClientSession>) -> Self {
        let capabilities = session.capabilities();
        let timeout = config.timeout();
        Self {
            config,
            session,
            capabilities,
            connected_at: Utc::now(),
            timeout,
        }
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }
}

impl std::fmt::Debug for ConnectedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectedClient")
            .field("id", &self.config.id)
            .field("capabilities", &self.capabilities)
            .field("connected_at", &self.connected_at)
            .finish()
    }
}

/// Summary of a connected client for listings
#[derive(Debug, Clone, Serialize)]
pub struct ClientSummary {
    pub id: String,
    pub url: String,
    pub capabilities: CapabilitySet,
    pub roots: Vec<String>,
    pub routing_weight: u32,
    pub connected_at: DateTime<Utc>,
    pub tool_count: usize,
    pub prompt_count: usize,
    pub resource_count: usize,
}

/// Connected clients keyed by id.
#[derive(Debug, Default)]
pub struct ClientPool {
    clients: HashMap<String, ConnectedClient>,
}

impl ClientPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a client, returning the one it replaced.
    pub fn insert(&mut self, client: ConnectedClient) -> Option<ConnectedClient> {
        self.clients.insert(client.config.id.clone(), client)
    }

    pub fn remove(&mut self, id: &str) -> Option<ConnectedClient> {
        self.clients.remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&ConnectedClient> {
        self.clients.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.clients.contains_key(id)
    }

    /// Connected ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.clients.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Remove and return every client.
    pub fn drain(&mut self) -> Vec<ConnectedClient> {
        self.clients.drain().map(|(_, client)| client).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConnectedClient> {
        self.clients.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_defaults() {
        let config: ClientConfig = serde_json::from_value(serde_json::json!({
            "id": "planning",
            "url": "http://localhost:8080/mcp"
        }))
        .unwrap();

        assert_eq!(config.timeout_seconds, 30);
        assert_eq!(config.routing_weight, 1);
        assert!(config.enabled);
        assert!(config.roots.is_empty());
        assert_eq!(config.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_client_config_from_yaml() {
        let config: ClientConfig = serde_yaml::from_str(
            r#"
id: fs
url: http://localhost:9000/mcp
roots:
  - file:///srv/data
exclude:
  - internal_debug
timeout_seconds: 5
"#,
        )
        .unwrap();
        assert_eq!(config.roots, vec!["file:///srv/data".to_string()]);
        assert_eq!(config.exclude, vec!["internal_debug".to_string()]);
        assert_eq!(config.timeout_seconds, 5);
    }
}
