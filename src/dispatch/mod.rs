//! Capability dispatch.
//!
//! [`DispatchFacade`] owns every connected client together with the
//! capability registries, routing indexes and root boundaries derived from
//! them. It is the single entry point for invoking a tool, rendering a
//! prompt or reading a resource on behalf of a caller:
//!
//! 1. resolve the owning client (hint, routing index, allow filter)
//! 2. validate access against the client's roots
//! 3. invoke through the client's session, bounded by its timeout
//! 4. turn application-level error results into [`DispatchError::Execution`]
//!
//! All registry state sits behind one coarse `RwLock`. Connect and
//! disconnect take it exclusively; dispatch only reads it long enough to
//! clone the session handle, so no lock is held across a client call.

pub mod client;
pub mod error;
pub mod filtering;
pub mod metrics;
pub mod registry;
pub mod roots;
pub mod routing;

pub use client::{ClientConfig, ClientPool, ClientSummary, ConnectedClient};
pub use error::{DispatchError, DispatchResult, ErrorKind};
pub use metrics::{DispatchMetrics, InvocationOutcome};
pub use registry::CapabilityRegistry;
pub use roots::{RootError, RootRegistry};
pub use routing::RoutingIndex;

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::agents::config::AgentProfile;
use crate::domain::{CapabilityDefinition, CapabilityKind, ClientSession, InvocationResult, PromptResult};

/// Opens sessions for configured clients.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    async fn connect(&self, config: &ClientConfig) -> anyhow::Result<Arc<dyn ClientSession>>;
}

/// What a connect call registered.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConnectionReport {
    pub client_id: String,
    pub tools: usize,
    pub prompts: usize,
    pub resources: usize,
    /// Definitions hidden by the client's exclusion list
    pub skipped: usize,
    /// Whether an existing connection with the same id was replaced
    pub replaced: bool,
}

struct DispatchState {
    clients: ClientPool,
    roots: RootRegistry,
    tools: CapabilityRegistry,
    prompts: CapabilityRegistry,
    resources: CapabilityRegistry,
}

impl DispatchState {
    fn new() -> Self {
        Self {
            clients: ClientPool::new(),
            roots: RootRegistry::new(),
            tools: CapabilityRegistry::new(CapabilityKind::Tool),
            prompts: CapabilityRegistry::new(CapabilityKind::Prompt),
            resources: CapabilityRegistry::new(CapabilityKind::Resource),
        }
    }

    fn registry(&self, kind: CapabilityKind) -> &CapabilityRegistry {
        match kind {
            CapabilityKind::Tool => &self.tools,
            CapabilityKind::Prompt => &self.prompts,
            CapabilityKind::Resource => &self.resources,
        }
    }

    fn registry_mut(&mut self, kind: CapabilityKind) -> &mut CapabilityRegistry {
        match kind {
            CapabilityKind::Tool => &mut self.tools,
            CapabilityKind::Prompt => &mut self.prompts,
            CapabilityKind::Resource => &mut self.resources,
        }
    }

    /// Remove a client and everything derived from it.
    fn remove_client(&mut self, client_id: &str) -> Option<ConnectedClient> {
        let removed = self.clients.remove(client_id)?;
        let definitions: usize = CapabilityKind::ALL
            .into_iter()
            .map(|kind| self.registry_mut(kind).unregister_client(client_id))
            .sum();
        self.roots.unregister(client_id);
        debug!(client = %client_id, definitions, "Removed client definitions");
        Some(removed)
    }
}

/// Resolved invocation target, detached from the registry lock.
struct Target {
    client_id: String,
    session: Arc<dyn ClientSession>,
    timeout: Duration,
}

pub struct DispatchFacade {
    state: RwLock<DispatchState>,
    metrics: DispatchMetrics,
}

impl DispatchFacade {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            state: RwLock::new(DispatchState::new()),
            metrics: DispatchMetrics::new()?,
        })
    }

    pub fn metrics(&self) -> &DispatchMetrics {
        &self.metrics
    }

    /// Connect a client: register its roots, discover its capabilities and
    /// register them.
    ///
    /// Discovery runs before the registries are locked. An existing client
    /// with the same id is replaced and its old session closed.
    pub async fn connect_client(
        &self,
        config: ClientConfig,
        session: Arc<dyn ClientSession>,
    ) -> DispatchResult<ConnectionReport> {
        let client_id = config.id.clone();
        if client_id.trim().is_empty() {
            return Err(DispatchError::Validation("client id must not be empty".to_string()));
        }
        // Parsed before anything is locked so a bad root never disturbs an
        // existing connection with the same id
        let client_roots = roots::parse_roots(&client_id, &config.roots)?;

        let client = ConnectedClient::new(config, session);
        let mut discovered = Vec::new();
        for kind in client.capabilities.kinds() {
            let definitions = self.discover(&client, kind).await?;
            debug!(
                client = %client_id,
                kind = %kind,
                count = definitions.len(),
                "Discovered capabilities"
            );
            discovered.push((kind, definitions));
        }

        let mut report = ConnectionReport {
            client_id: client_id.clone(),
            ..ConnectionReport::default()
        };

        let previous = {
            let mut state = self.state.write().await;
            let previous = state.remove_client(&client_id);
            state.roots.set_roots(&client_id, client_roots);

            for (kind, definitions) in discovered {
                let registry = state.registry_mut(kind);
                for definition in definitions {
                    let name = definition.name.clone();
                    if registry.register(&name, definition, &client_id, &client.config) {
                        match kind {
                            CapabilityKind::Tool => report.tools += 1,
                            CapabilityKind::Prompt => report.prompts += 1,
                            CapabilityKind::Resource => report.resources += 1,
                        }
                    } else {
                        report.skipped += 1;
                    }
                }
            }
            state.clients.insert(client);
            previous
        };

        if let Some(previous) = previous {
            report.replaced = true;
            warn!(client = %client_id, "Replaced existing client connection");
            close_session(&previous).await;
        }

        info!(
            client = %client_id,
            tools = report.tools,
            prompts = report.prompts,
            resources = report.resources,
            skipped = report.skipped,
            "Client connected"
        );
        Ok(report)
    }

    /// Connect every enabled client through `connector`.
    ///
    /// Clients that fail to connect are logged and skipped.
    pub async fn connect_all(
        &self,
        configs: &[ClientConfig],
        connector: &dyn SessionConnector,
    ) -> Vec<ConnectionReport> {
        let mut reports = Vec::new();
        for config in configs.iter().filter(|c| c.enabled) {
            let session = match connector.connect(config).await {
                Ok(session) => session,
                Err(e) => {
                    warn!(client = %config.id, error = %e, "Failed to open client session, skipping");
                    continue;
                }
            };
            match self.connect_client(config.clone(), session).await {
                Ok(report) => reports.push(report),
                Err(e) => warn!(client = %config.id, error = %e, "Failed to connect client, skipping"),
            }
        }
        reports
    }

    /// Disconnect a client, removing its definitions, routing entries and
    /// roots in one exclusive section, then close its session.
    pub async fn disconnect_client(&self, client_id: &str) -> DispatchResult<()> {
        let removed = {
            let mut state = self.state.write().await;
            state.remove_client(client_id)
        };
        let removed = removed.ok_or_else(|| DispatchError::ClientNotFound(client_id.to_string()))?;
        close_session(&removed).await;
        info!(client = %client_id, "Client disconnected");
        Ok(())
    }

    /// Disconnect every client.
    pub async fn shutdown(&self) {
        let clients = {
            let mut state = self.state.write().await;
            let clients = state.clients.drain();
            *state = DispatchState::new();
            clients
        };
        let count = clients.len();
        for client in &clients {
            close_session(client).await;
        }
        info!(clients = count, "Dispatch shut down");
    }

    pub async fn execute_tool(
        &self,
        name: &str,
        arguments: Value,
        client_hint: Option<&str>,
        allow_filter: Option<&[String]>,
    ) -> DispatchResult<InvocationResult> {
        let kind = CapabilityKind::Tool;
        let target = self.resolve(kind, name, client_hint, allow_filter).await?;
        let started = Instant::now();
        let result = self
            .invoke(kind, name, &target, target.session.call_tool(name, arguments))
            .await?;
        self.finish(kind, name, &target.client_id, started, result)
    }

    pub async fn get_prompt(
        &self,
        name: &str,
        arguments: Value,
        client_hint: Option<&str>,
        allow_filter: Option<&[String]>,
    ) -> DispatchResult<PromptResult> {
        let kind = CapabilityKind::Prompt;
        let target = self.resolve(kind, name, client_hint, allow_filter).await?;
        let started = Instant::now();
        let result = self
            .invoke(kind, name, &target, target.session.get_prompt(name, arguments))
            .await?;
        self.metrics
            .observe(kind, &target.client_id, InvocationOutcome::Success, started.elapsed());
        Ok(result)
    }

    /// Read a resource by URI. The URI must also fall within the owning
    /// client's roots.
    pub async fn read_resource(
        &self,
        uri: &str,
        client_hint: Option<&str>,
        allow_filter: Option<&[String]>,
    ) -> DispatchResult<InvocationResult> {
        let kind = CapabilityKind::Resource;
        let target = self.resolve(kind, uri, client_hint, allow_filter).await?;
        {
            let state = self.state.read().await;
            state.roots.validate_resource_access(uri, &target.client_id)?;
        }
        let started = Instant::now();
        let result = self
            .invoke(kind, uri, &target, target.session.read_resource(uri))
            .await?;
        self.finish(kind, uri, &target.client_id, started, result)
    }

    /// Definitions of `kind` visible to an agent.
    pub async fn format_for_consumer(
        &self,
        kind: CapabilityKind,
        profile: Option<&AgentProfile>,
        explicit_names: Option<&[String]>,
    ) -> Vec<CapabilityDefinition> {
        let state = self.state.read().await;
        let connected = state.clients.ids();
        state
            .registry(kind)
            .format_for_consumer(profile, explicit_names, &connected)
    }

    /// Tool catalogue for an agent, honouring its explicit tool list.
    pub async fn format_tools_for_consumer(&self, profile: Option<&AgentProfile>) -> Vec<CapabilityDefinition> {
        let explicit = profile.and_then(|p| p.tools.as_deref());
        self.format_for_consumer(CapabilityKind::Tool, profile, explicit)
            .await
    }

    /// Clients that registered `name` as a capability of `kind`.
    pub async fn owners(&self, kind: CapabilityKind, name: &str) -> Vec<String> {
        let state = self.state.read().await;
        state.registry(kind).routing().candidates(name)
    }

    pub async fn definition(
        &self,
        kind: CapabilityKind,
        name: &str,
        client_id: &str,
    ) -> Option<CapabilityDefinition> {
        let state = self.state.read().await;
        state.registry(kind).get(name, client_id).cloned()
    }

    pub async fn client_ids(&self) -> Vec<String> {
        self.state.read().await.clients.ids()
    }

    pub async fn is_connected(&self, client_id: &str) -> bool {
        self.state.read().await.clients.contains(client_id)
    }

    pub async fn list_clients(&self) -> Vec<ClientSummary> {
        let state = self.state.read().await;
        let mut summaries: Vec<ClientSummary> = state
            .clients
            .iter()
            .map(|client| ClientSummary {
                id: client.config.id.clone(),
                url: client.config.url.clone(),
                capabilities: client.capabilities,
                roots: client.config.roots.clone(),
                routing_weight: client.config.routing_weight,
                connected_at: client.connected_at,
                tool_count: state.tools.count_for_client(client.id()),
                prompt_count: state.prompts.count_for_client(client.id()),
                resource_count: state.resources.count_for_client(client.id()),
            })
            .collect();
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        summaries
    }

    async fn discover(
        &self,
        client: &ConnectedClient,
        kind: CapabilityKind,
    ) -> DispatchResult<Vec<CapabilityDefinition>> {
        let listing = CapabilityRegistry::discover(kind, client.id(), client.session.as_ref());
        match tokio::time::timeout(client.timeout, listing).await {
            Ok(Ok(definitions)) => Ok(definitions),
            Ok(Err(source)) => Err(DispatchError::Transport {
                client: client.id().to_string(),
                source,
            }),
            Err(_) => Err(DispatchError::Transport {
                client: client.id().to_string(),
                source: anyhow::anyhow!(
                    "{} discovery timed out after {}ms",
                    kind,
                    client.timeout.as_millis()
                ),
            }),
        }
    }

    async fn resolve(
        &self,
        kind: CapabilityKind,
        name: &str,
        client_hint: Option<&str>,
        allow_filter: Option<&[String]>,
    ) -> DispatchResult<Target> {
        let state = self.state.read().await;
        let client_id = routing::resolve(
            state.registry(kind).routing(),
            kind,
            name,
            client_hint,
            allow_filter,
        )?;

        let client = state
            .clients
            .get(&client_id)
            .ok_or_else(|| DispatchError::ClientNotFound(client_id.clone()))?;

        if !state.roots.validate_access(&client_id) {
            return Err(DispatchError::AccessDenied {
                client: client_id,
                uri: name.to_string(),
            });
        }

        debug!(kind = %kind, name = %name, client = %client_id, "Resolved capability");
        Ok(Target {
            session: Arc::clone(&client.session),
            timeout: client.timeout,
            client_id,
        })
    }

    async fn invoke<T, F>(
        &self,
        kind: CapabilityKind,
        name: &str,
        target: &Target,
        call: F,
    ) -> DispatchResult<T>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        let started = Instant::now();
        match tokio::time::timeout(target.timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(source)) => {
                self.metrics.observe(
                    kind,
                    &target.client_id,
                    InvocationOutcome::TransportError,
                    started.elapsed(),
                );
                warn!(kind = %kind, name = %name, client = %target.client_id, error = %source, "Invocation failed");
                Err(DispatchError::Transport {
                    client: target.client_id.clone(),
                    source,
                })
            }
            Err(_) => {
                self.metrics
                    .observe(kind, &target.client_id, InvocationOutcome::Timeout, started.elapsed());
                warn!(kind = %kind, name = %name, client = %target.client_id, "Invocation timed out");
                Err(DispatchError::Timeout {
                    kind,
                    name: name.to_string(),
                    client: target.client_id.clone(),
                    timeout_ms: target.timeout.as_millis() as u64,
                })
            }
        }
    }

    fn finish(
        &self,
        kind: CapabilityKind,
        name: &str,
        client_id: &str,
        started: Instant,
        result: InvocationResult,
    ) -> DispatchResult<InvocationResult> {
        if result.is_error {
            self.metrics
                .observe(kind, client_id, InvocationOutcome::ErrorResult, started.elapsed());
            let message = result
                .first_text()
                .map(str::to_string)
                .unwrap_or_else(|| format!("{} '{}' failed on client '{}'", kind.label(), name, client_id));
            return Err(DispatchError::Execution(message));
        }
        self.metrics
            .observe(kind, client_id, InvocationOutcome::Success, started.elapsed());
        Ok(result)
    }
}

async fn close_session(client: &ConnectedClient) {
    if let Err(e) = client.session.close().await {
        warn!(client = %client.id(), error = %e, "Failed to close client session");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CapabilitySet, ContentPart};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoSession {
        tools: Vec<&'static str>,
        calls: AtomicUsize,
        closed: AtomicUsize,
    }

    impl EchoSession {
        fn new(tools: Vec<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                tools,
                calls: AtomicUsize::new(0),
                closed: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ClientSession for EchoSession {
        fn capabilities(&self) -> CapabilitySet {
            CapabilitySet::tools_only()
        }

        async fn list(&self, _kind: CapabilityKind) -> anyhow::Result<Value> {
            let tools: Vec<Value> = self.tools.iter().map(|name| json!({"name": name})).collect();
            Ok(json!({ "tools": tools }))
        }

        async fn call_tool(&self, name: &str, arguments: Value) -> anyhow::Result<InvocationResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if name == "fail" {
                return Ok(InvocationResult::error("tool exploded"));
            }
            Ok(InvocationResult::success(vec![ContentPart::text(arguments.to_string())]))
        }

        async fn get_prompt(&self, _name: &str, _arguments: Value) -> anyhow::Result<PromptResult> {
            Ok(PromptResult::default())
        }

        async fn read_resource(&self, uri: &str) -> anyhow::Result<InvocationResult> {
            Ok(InvocationResult::success(vec![ContentPart::text(uri)]))
        }

        async fn close(&self) -> anyhow::Result<()> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_connect_and_execute() {
        let facade = DispatchFacade::new().unwrap();
        let session = EchoSession::new(vec!["echo", "fail"]);
        let report = facade
            .connect_client(ClientConfig::new("c1", "http://c1"), session.clone())
            .await
            .unwrap();
        assert_eq!(report.tools, 2);

        let result = facade
            .execute_tool("echo", json!({"a": 1}), None, None)
            .await
            .unwrap();
        assert_eq!(result.first_text(), Some("{\"a\":1}"));
        assert_eq!(session.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_error_result_becomes_execution_error() {
        let facade = DispatchFacade::new().unwrap();
        facade
            .connect_client(ClientConfig::new("c1", "http://c1"), EchoSession::new(vec!["fail"]))
            .await
            .unwrap();

        let err = facade.execute_tool("fail", json!({}), None, None).await.unwrap_err();
        assert_eq!(err.to_string(), "tool exploded");
        assert_eq!(err.kind(), ErrorKind::Execution);
        assert_eq!(
            facade
                .metrics()
                .invocation_count(CapabilityKind::Tool, "c1", InvocationOutcome::ErrorResult),
            1
        );
    }

    #[tokio::test]
    async fn test_reconnect_replaces_previous_client() {
        let facade = DispatchFacade::new().unwrap();
        let first = EchoSession::new(vec!["old_tool"]);
        facade
            .connect_client(ClientConfig::new("c1", "http://c1"), first.clone())
            .await
            .unwrap();

        let report = facade
            .connect_client(ClientConfig::new("c1", "http://c1"), EchoSession::new(vec!["new_tool"]))
            .await
            .unwrap();

        assert!(report.replaced);
        assert_eq!(first.closed.load(Ordering::SeqCst), 1);
        assert!(facade.owners(CapabilityKind::Tool, "old_tool").await.is_empty());
        assert_eq!(facade.owners(CapabilityKind::Tool, "new_tool").await, vec!["c1".to_string()]);
    }

    #[tokio::test]
    async fn test_disconnect_unknown_client() {
        let facade = DispatchFacade::new().unwrap();
        let err = facade.disconnect_client("ghost").await.unwrap_err();
        assert!(matches!(err, DispatchError::ClientNotFound(_)));
    }

    #[tokio::test]
    async fn test_shutdown_closes_everything() {
        let facade = DispatchFacade::new().unwrap();
        let a = EchoSession::new(vec!["x"]);
        let b = EchoSession::new(vec!["y"]);
        facade.connect_client(ClientConfig::new("a", ""), a.clone()).await.unwrap();
        facade.connect_client(ClientConfig::new("b", ""), b.clone()).await.unwrap();

        facade.shutdown().await;

        assert!(facade.client_ids().await.is_empty());
        assert_eq!(a.closed.load(Ordering::SeqCst), 1);
        assert_eq!(b.closed.load(Ordering::SeqCst), 1);
        assert!(facade.owners(CapabilityKind::Tool, "x").await.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_root_rejected_before_discovery() {
        let facade = DispatchFacade::new().unwrap();
        let mut config = ClientConfig::new("fs", "");
        config.roots = vec!["no scheme here".to_string()];
        let err = facade
            .connect_client(config, EchoSession::new(vec!["x"]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(!facade.is_connected("fs").await);
    }

    #[tokio::test]
    async fn test_failed_reconnect_keeps_previous_client() {
        let facade = DispatchFacade::new().unwrap();
        let first = EchoSession::new(vec!["old_tool"]);
        let mut config = ClientConfig::new("fs", "");
        config.roots = vec!["file:///data".to_string()];
        facade.connect_client(config, first.clone()).await.unwrap();

        let mut bad = ClientConfig::new("fs", "");
        bad.roots = vec!["no scheme here".to_string()];
        let replacement = EchoSession::new(vec!["new_tool"]);
        let err = facade
            .connect_client(bad, replacement.clone())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        // The old connection is untouched and still usable
        assert!(facade.is_connected("fs").await);
        assert_eq!(first.closed.load(Ordering::SeqCst), 0);
        assert_eq!(facade.owners(CapabilityKind::Tool, "old_tool").await, vec!["fs".to_string()]);
        assert!(facade.owners(CapabilityKind::Tool, "new_tool").await.is_empty());
        assert_eq!(replacement.calls.load(Ordering::SeqCst), 0);
    }
}
