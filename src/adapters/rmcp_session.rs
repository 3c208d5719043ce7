//! MCP client sessions over the rmcp SDK
//!
//! Each configured client is reached through a streamable HTTP transport.
//! rmcp results are serialized to JSON and read back with the crate's own
//! capability types, so the rest of the crate never sees rmcp models.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rmcp::{
    model::{
        CallToolRequestParam, ClientCapabilities, ClientInfo, GetPromptRequestParam, Implementation,
        InitializeRequestParam, ReadResourceRequestParam,
    },
    service::{Peer, RunningService},
    transport::StreamableHttpClientTransport,
    RoleClient, ServiceExt,
};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::dispatch::{ClientConfig, SessionConnector};
use crate::domain::{
    CapabilityKind, CapabilitySet, ClientSession, ContentPart, InvocationResult, PromptMessage,
    PromptResult,
};

type ClientService = RunningService<RoleClient, InitializeRequestParam>;

/// A live MCP client session
pub struct RmcpSession {
    client_id: String,
    peer: Peer<RoleClient>,
    capabilities: CapabilitySet,
    service: Mutex<Option<ClientService>>,
}

impl RmcpSession {
    /// Open a session to the client's URL and run the MCP handshake
    pub async fn connect(config: &ClientConfig) -> Result<Self> {
        if config.url.is_empty() {
            anyhow::bail!("client '{}' has no url", config.id);
        }

        let transport = StreamableHttpClientTransport::from_uri(config.url.clone());
        let client_info = ClientInfo {
            protocol_version: Default::default(),
            capabilities: ClientCapabilities::default(),
            client_info: Implementation {
                name: env!("CARGO_PKG_NAME").to_string(),
                title: None,
                version: env!("CARGO_PKG_VERSION").to_string(),
                website_url: None,
                icons: None,
            },
        };

        let service = tokio::time::timeout(config.timeout(), client_info.serve(transport))
            .await
            .with_context(|| format!("timed out connecting to client '{}'", config.id))?
            .with_context(|| format!("failed to initialize client '{}'", config.id))?;

        let capabilities = match service.peer_info() {
            Some(info) => CapabilitySet {
                tools: info.capabilities.tools.is_some(),
                prompts: info.capabilities.prompts.is_some(),
                resources: info.capabilities.resources.is_some(),
            },
            None => {
                warn!(client = %config.id, "Server sent no capabilities, assuming tools only");
                CapabilitySet::tools_only()
            }
        };

        info!(
            client = %config.id,
            url = %config.url,
            tools = capabilities.tools,
            prompts = capabilities.prompts,
            resources = capabilities.resources,
            "Connected to MCP client"
        );

        Ok(Self {
            client_id: config.id.clone(),
            peer: service.peer().clone(),
            capabilities,
            service: Mutex::new(Some(service)),
        })
    }
}

#[async_trait]
impl ClientSession for RmcpSession {
    fn capabilities(&self) -> CapabilitySet {
        self.capabilities
    }

    async fn list(&self, kind: CapabilityKind) -> Result<Value> {
        debug!(client = %self.client_id, kind = %kind, "Listing capabilities");
        let listed = match kind {
            CapabilityKind::Tool => serde_json::to_value(self.peer.list_tools(Default::default()).await?)?,
            CapabilityKind::Prompt => serde_json::to_value(self.peer.list_prompts(Default::default()).await?)?,
            CapabilityKind::Resource => {
                serde_json::to_value(self.peer.list_resources(Default::default()).await?)?
            }
        };
        Ok(listed)
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<InvocationResult> {
        let result = self
            .peer
            .call_tool(CallToolRequestParam {
                name: name.to_string().into(),
                arguments: arguments.as_object().cloned(),
            })
            .await?;
        Ok(parse_call_result(&serde_json::to_value(result)?))
    }

    async fn get_prompt(&self, name: &str, arguments: Value) -> Result<PromptResult> {
        let result = self
            .peer
            .get_prompt(GetPromptRequestParam {
                name: name.to_string(),
                arguments: arguments.as_object().cloned(),
            })
            .await?;
        Ok(parse_prompt_result(&serde_json::to_value(result)?))
    }

    async fn read_resource(&self, uri: &str) -> Result<InvocationResult> {
        let result = self
            .peer
            .read_resource(ReadResourceRequestParam { uri: uri.to_string() })
            .await?;
        Ok(parse_resource_result(&serde_json::to_value(result)?))
    }

    async fn close(&self) -> Result<()> {
        let service = self.service.lock().await.take();
        if let Some(service) = service {
            service
                .cancel()
                .await
                .with_context(|| format!("failed to close client '{}'", self.client_id))?;
            info!(client = %self.client_id, "Closed MCP client");
        }
        Ok(())
    }
}

/// Opens [`RmcpSession`]s for configured clients
#[derive(Debug, Default, Clone, Copy)]
pub struct RmcpConnector;

#[async_trait]
impl SessionConnector for RmcpConnector {
    async fn connect(&self, config: &ClientConfig) -> Result<Arc<dyn ClientSession>> {
        Ok(Arc::new(RmcpSession::connect(config).await?))
    }
}

/// Read one MCP content item
fn parse_content(item: &Value) -> Option<ContentPart> {
    match item.get("type").and_then(Value::as_str)? {
        "text" => Some(ContentPart::text(item.get("text").and_then(Value::as_str).unwrap_or_default())),
        "image" => Some(ContentPart::Image {
            data: str_field(item, "data").unwrap_or_default(),
            mime_type: str_field(item, "mimeType").unwrap_or_default(),
        }),
        "resource" => item.get("resource").map(parse_resource_contents),
        other => {
            debug!(content_type = %other, "Ignoring unsupported content type");
            None
        }
    }
}

fn parse_resource_contents(contents: &Value) -> ContentPart {
    ContentPart::Resource {
        uri: str_field(contents, "uri").unwrap_or_default(),
        mime_type: str_field(contents, "mimeType"),
        text: str_field(contents, "text"),
    }
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn parse_call_result(result: &Value) -> InvocationResult {
    let content = result
        .get("content")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(parse_content).collect())
        .unwrap_or_default();
    InvocationResult {
        content,
        is_error: result.get("isError").and_then(Value::as_bool).unwrap_or(false),
    }
}

fn parse_resource_result(result: &Value) -> InvocationResult {
    let content = result
        .get("contents")
        .and_then(Value::as_array)
        .map(|items| items.iter().map(parse_resource_contents).collect())
        .unwrap_or_default();
    InvocationResult {
        content,
        is_error: false,
    }
}

fn parse_prompt_result(result: &Value) -> PromptResult {
    let messages = result
        .get("messages")
        .and_then(Value::as_array)
        .map(|messages| {
            messages
                .iter()
                .map(|message| PromptMessage {
                    role: str_field(message, "role").unwrap_or_else(|| "user".to_string()),
                    text: message
                        .get("content")
                        .and_then(parse_content)
                        .map(|part| InvocationResult::success(vec![part]).to_text())
                        .unwrap_or_default(),
                })
                .collect()
        })
        .unwrap_or_default();

    PromptResult {
        description: str_field(result, "description"),
        messages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_call_result() {
        let result = parse_call_result(&json!({
            "content": [
                {"type": "text", "text": "saved"},
                {"type": "image", "data": "aGk=", "mimeType": "image/png"},
                {"type": "audio", "data": "xx"}
            ],
            "isError": false
        }));
        assert!(!result.is_error);
        assert_eq!(result.content.len(), 2);
        assert_eq!(result.first_text(), Some("saved"));
    }

    #[test]
    fn test_parse_call_error_result() {
        let result = parse_call_result(&json!({
            "content": [{"type": "text", "text": "disk full"}],
            "isError": true
        }));
        assert!(result.is_error);
        assert_eq!(result.to_text(), "disk full");
    }

    #[test]
    fn test_parse_resource_result() {
        let result = parse_resource_result(&json!({
            "contents": [{"uri": "file:///data/a.txt", "mimeType": "text/plain", "text": "hello"}]
        }));
        assert_eq!(
            result.content,
            vec![ContentPart::Resource {
                uri: "file:///data/a.txt".to_string(),
                mime_type: Some("text/plain".to_string()),
                text: Some("hello".to_string()),
            }]
        );
    }

    #[test]
    fn test_parse_prompt_result() {
        let result = parse_prompt_result(&json!({
            "description": "Greeting",
            "messages": [{"role": "user", "content": {"type": "text", "text": "Hello Ada"}}]
        }));
        assert_eq!(result.description.as_deref(), Some("Greeting"));
        assert_eq!(result.messages[0].role, "user");
        assert_eq!(result.messages[0].text, "Hello Ada");
    }

    #[tokio::test]
    async fn test_connect_requires_url() {
        let config = ClientConfig::new("planning", "");
        assert!(RmcpSession::connect(&config).await.is_err());
    }
}
