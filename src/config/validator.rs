use std::collections::{HashMap, HashSet};
use thiserror::Error;

use crate::agents::config::{AgentProfile, MemoryBackend, MemoryConfig};
use crate::config::Settings;
use crate::dispatch::roots::parse_roots;
use crate::dispatch::ClientConfig;
use crate::schema;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Cross-reference error: {0}")]
    CrossReference(String),

    #[error("Duplicate entry: {0}")]
    Duplicate(String),
}

pub struct ConfigValidator;

impl ConfigValidator {
    /// Check the whole configuration, collecting every error
    pub fn validate(settings: &Settings) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        errors.extend(Self::validate_memory(&settings.memory));
        errors.extend(Self::validate_clients(&settings.clients));
        errors.extend(Self::validate_agents(&settings.agents));
        errors.extend(Self::validate_cross_references(settings));

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_memory(memory: &MemoryConfig) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if memory.backend == MemoryBackend::File && memory.path.trim().is_empty() {
            errors.push(ValidationError::MissingField("memory.path".to_string()));
        }

        errors
    }

    fn validate_clients(clients: &[ClientConfig]) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let mut seen_ids = HashMap::new();

        for (idx, client) in clients.iter().enumerate() {
            if client.id.is_empty() {
                errors.push(ValidationError::MissingField(format!("clients[{}].id", idx)));
                continue;
            }

            // Check for duplicate ids
            if let Some(prev_idx) = seen_ids.insert(&client.id, idx) {
                errors.push(ValidationError::Duplicate(format!(
                    "Client id '{}' appears at indices {} and {}",
                    client.id, prev_idx, idx
                )));
            }

            if let Err(e) = parse_roots(&client.id, &client.roots) {
                errors.push(ValidationError::InvalidValue {
                    field: format!("clients[{}].roots", idx),
                    reason: e.to_string(),
                });
            }

            if client.timeout_seconds == 0 {
                errors.push(ValidationError::InvalidValue {
                    field: format!("clients[{}].timeout_seconds", idx),
                    reason: "Timeout must be greater than 0".to_string(),
                });
            }
        }

        errors
    }

    fn validate_agents(agents: &[AgentProfile]) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let mut seen_names = HashMap::new();

        for (idx, agent) in agents.iter().enumerate() {
            if agent.name.is_empty() {
                errors.push(ValidationError::MissingField(format!("agents[{}].name", idx)));
                continue;
            }

            // Check for duplicate names
            if let Some(prev_idx) = seen_names.insert(&agent.name, idx) {
                errors.push(ValidationError::Duplicate(format!(
                    "Agent name '{}' appears at indices {} and {}",
                    agent.name, prev_idx, idx
                )));
            }

            if agent.max_iterations == 0 {
                errors.push(ValidationError::InvalidValue {
                    field: format!("agents[{}].max_iterations", idx),
                    reason: "Must be at least 1".to_string(),
                });
            }

            if let Some(output_schema) = &agent.output_schema {
                let field = format!("agents[{}].output_schema", idx);
                if !output_schema.is_object() {
                    errors.push(ValidationError::InvalidValue {
                        field,
                        reason: "Output schema must be a JSON object".to_string(),
                    });
                } else if let Err(problems) = schema::check_schema(output_schema) {
                    errors.extend(problems.into_iter().map(|reason| ValidationError::InvalidValue {
                        field: field.clone(),
                        reason,
                    }));
                }
            }
        }

        errors
    }

    fn validate_cross_references(settings: &Settings) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let client_ids: HashSet<&str> = settings.clients.iter().map(|c| c.id.as_str()).collect();

        for agent in &settings.agents {
            for client in agent.allowed_clients.iter().flatten() {
                if !client_ids.contains(client.as_str()) {
                    errors.push(ValidationError::CrossReference(format!(
                        "Agent '{}' allows unknown client '{}'",
                        agent.name, client
                    )));
                }
            }
        }

        errors
    }
}
