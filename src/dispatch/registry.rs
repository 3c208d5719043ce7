//! Capability registry: name to per-client definitions for one capability kind.

use std::collections::{BTreeMap, HashMap};

use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use super::client::ClientConfig;
use super::filtering;
use super::routing::RoutingIndex;
use crate::agents::config::AgentProfile;
use crate::domain::{CapabilityDefinition, CapabilityKind, ClientSession};
use crate::schema::normalize_parameters;

/// Definitions of one capability kind across all connected clients.
///
/// Definitions from different clients may share a name; disambiguation is
/// the caller's business at dispatch time. The routing index is updated in
/// the same call as the definition map so the two never disagree.
#[derive(Debug)]
pub struct CapabilityRegistry {
    kind: CapabilityKind,
    definitions: HashMap<String, BTreeMap<String, CapabilityDefinition>>,
    routing: RoutingIndex,
}

impl CapabilityRegistry {
    pub fn new(kind: CapabilityKind) -> Self {
        Self {
            kind,
            definitions: HashMap::new(),
            routing: RoutingIndex::new(),
        }
    }

    pub fn kind(&self) -> CapabilityKind {
        self.kind
    }

    /// Store a definition owned by `client_id`.
    ///
    /// Returns false, without error, when the client's exclusion list hides
    /// the name.
    pub fn register(
        &mut self,
        name: &str,
        mut definition: CapabilityDefinition,
        client_id: &str,
        client_config: &ClientConfig,
    ) -> bool {
        if !filtering::is_registration_allowed(name, client_config) {
            debug!(
                client = %client_id,
                kind = %self.kind,
                name = %name,
                "Registration skipped by client exclusion list"
            );
            return false;
        }

        definition.client_id = client_id.to_string();
        self.definitions
            .entry(name.to_string())
            .or_default()
            .insert(client_id.to_string(), definition);
        self.routing.add(name, client_id);
        true
    }

    /// Remove every definition owned by `client_id`; returns how many.
    pub fn unregister_client(&mut self, client_id: &str) -> usize {
        let mut removed = 0;
        self.definitions.retain(|_, owners| {
            if owners.remove(client_id).is_some() {
                removed += 1;
            }
            !owners.is_empty()
        });
        self.routing.remove_client(client_id);
        removed
    }

    pub fn get(&self, name: &str, client_id: &str) -> Option<&CapabilityDefinition> {
        self.definitions.get(name).and_then(|owners| owners.get(client_id))
    }

    /// All definitions registered under `name`, ordered by client id.
    pub fn definitions_for(&self, name: &str) -> Vec<&CapabilityDefinition> {
        self.definitions
            .get(name)
            .map(|owners| owners.values().collect())
            .unwrap_or_default()
    }

    pub fn routing(&self) -> &RoutingIndex {
        &self.routing
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.definitions.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn count_for_client(&self, client_id: &str) -> usize {
        self.definitions
            .values()
            .filter(|owners| owners.contains_key(client_id))
            .count()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// List the definitions of `kind` a client provides.
    ///
    /// A failing list call is an error: a dead client must not look like an
    /// empty one. A payload of unexpected shape only degrades to an empty
    /// list with a warning.
    pub async fn discover(
        kind: CapabilityKind,
        client_id: &str,
        session: &dyn ClientSession,
    ) -> anyhow::Result<Vec<CapabilityDefinition>> {
        let raw = session.list(kind).await?;
        Ok(parse_definitions(kind, client_id, &raw))
    }

    /// Definitions an agent is allowed to see, one per name.
    ///
    /// Only clients in `connected_clients` that pass the agent's allow-list
    /// contribute; the agent's exclusions are removed; `explicit_names`
    /// narrows further. When several allowed clients own a name, the first
    /// client by id is shown. Parameter schemas are normalized to object
    /// schemas.
    pub fn format_for_consumer(
        &self,
        profile: Option<&AgentProfile>,
        explicit_names: Option<&[String]>,
        connected_clients: &[String],
    ) -> Vec<CapabilityDefinition> {
        let allowed_clients = filtering::filter_clients_for_request(profile, connected_clients);
        let visible = filtering::filter_component_list(&self.names(), profile);

        visible
            .into_iter()
            .filter(|name| explicit_names.map_or(true, |names| names.contains(name)))
            .filter_map(|name| {
                self.definitions.get(&name).and_then(|owners| {
                    owners
                        .iter()
                        .find(|(client, _)| allowed_clients.iter().any(|c| c == *client))
                        .map(|(_, definition)| definition)
                })
            })
            .map(|definition| {
                let mut definition = definition.clone();
                definition.parameters = normalize_parameters(&definition.parameters);
                definition
            })
            .collect()
    }
}

/// Parse a list payload into definitions.
///
/// Accepts `{"tools": [...]}` style objects keyed by the kind's list key, or
/// a bare array. Entries without a usable name are skipped with a warning.
pub fn parse_definitions(kind: CapabilityKind, client_id: &str, raw: &Value) -> Vec<CapabilityDefinition> {
    let entries = match raw {
        Value::Array(entries) => entries,
        Value::Object(map) => match map.get(kind.list_key()) {
            Some(Value::Array(entries)) => entries,
            _ => {
                warn!(
                    client = %client_id,
                    kind = %kind,
                    "List response has no '{}' array, treating as empty",
                    kind.list_key()
                );
                return Vec::new();
            }
        },
        other => {
            warn!(
                client = %client_id,
                kind = %kind,
                payload_type = %value_type(other),
                "Unexpected list response shape, treating as empty"
            );
            return Vec::new();
        }
    };

    entries
        .iter()
        .filter_map(|entry| {
            let parsed = parse_entry(kind, client_id, entry);
            if parsed.is_none() {
                warn!(client = %client_id, kind = %kind, "Skipping malformed {} entry", kind);
            }
            parsed
        })
        .collect()
}

fn parse_entry(kind: CapabilityKind, client_id: &str, entry: &Value) -> Option<CapabilityDefinition> {
    let map = entry.as_object()?;
    let description = map
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    match kind {
        CapabilityKind::Tool => {
            let name = map.get("name")?.as_str()?;
            let parameters = ["inputSchema", "input_schema", "parameters"]
                .iter()
                .find_map(|key| map.get(*key))
                .cloned()
                .unwrap_or(Value::Null);
            Some(CapabilityDefinition::new(name, description, parameters, client_id))
        }
        CapabilityKind::Prompt => {
            let name = map.get("name")?.as_str()?;
            let arguments = map
                .get("arguments")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            Some(CapabilityDefinition::new(
                name,
                description,
                prompt_arguments_schema(arguments),
                client_id,
            ))
        }
        CapabilityKind::Resource => {
            let uri = map.get("uri")?.as_str()?;
            let mut definition = CapabilityDefinition::new(uri, description, Value::Null, client_id);
            definition.mime_type = map
                .get("mimeType")
                .or_else(|| map.get("mime_type"))
                .and_then(Value::as_str)
                .map(str::to_string);
            if definition.description.is_empty() {
                if let Some(name) = map.get("name").and_then(Value::as_str) {
                    definition.description = name.to_string();
                }
            }
            Some(definition)
        }
    }
}

/// Turn a prompt's argument list into an object schema of string properties.
fn prompt_arguments_schema(arguments: &[Value]) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for argument in arguments {
        let Some(name) = argument.get("name").and_then(Value::as_str) else {
            continue;
        };
        let mut property = json!({"type": "string"});
        if let Some(description) = argument.get("description").and_then(Value::as_str) {
            property["description"] = Value::String(description.to_string());
        }
        properties.insert(name.to_string(), property);
        if argument.get("required").and_then(Value::as_bool).unwrap_or(false) {
            required.push(Value::String(name.to_string()));
        }
    }
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn value_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
