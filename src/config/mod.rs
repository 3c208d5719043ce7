use std::path::{Path, PathBuf};

use config::{Config, File};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

pub mod validator;

use crate::agents::config::{AgentProfile, MemoryConfig};
use crate::dispatch::ClientConfig;

/// Default configuration file
pub const DEFAULT_CONFIG_FILE: &str = "switchyard.toml";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub memory: MemoryConfig,
    /// Capability-providing clients to connect at startup
    #[serde(default)]
    pub clients: Vec<ClientConfig>,
    #[serde(default)]
    pub agents: Vec<AgentProfile>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingSettings {
    /// `EnvFilter` directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_filter")]
    pub filter: String,
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            json: false,
        }
    }
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Settings {
    pub fn new() -> Result<Self, anyhow::Error> {
        Self::from_path(DEFAULT_CONFIG_FILE)
    }

    /// Load settings from a config file plus the `config/clients` and
    /// `config/agents` directories next to it
    pub fn from_path(config_path: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
        let config_path = config_path.as_ref();
        let root = config_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        // Build config from file
        let s = Config::builder()
            .add_source(File::from(config_path.to_path_buf()).required(false))
            .set_default("logging.filter", default_log_filter())?
            .set_default("logging.json", false)?
            .build()?;

        let mut settings: Settings = s.try_deserialize()?;

        settings.load_external_configs(root)?;

        // Validate configuration
        validator::ConfigValidator::validate(&settings).map_err(|errors| {
            let error_messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            anyhow::anyhow!(
                "Configuration validation failed:\n{}",
                error_messages.join("\n")
            )
        })?;

        Ok(settings)
    }

    fn load_external_configs(&mut self, root: &Path) -> Result<(), anyhow::Error> {
        self.load_clients_from_dir(root.join("config").join("clients"))?;
        self.load_agents_from_dir(root.join("config").join("agents"))?;
        Ok(())
    }

    pub fn load_clients_from_dir(&mut self, path: impl AsRef<Path>) -> Result<(), anyhow::Error> {
        let clients: Vec<ClientConfig> = load_entries_from_dir(path.as_ref())?;
        self.clients.extend(clients);
        Ok(())
    }

    pub fn load_agents_from_dir(&mut self, path: impl AsRef<Path>) -> Result<(), anyhow::Error> {
        let agents: Vec<AgentProfile> = load_entries_from_dir(path.as_ref())?;
        self.agents.extend(agents);
        Ok(())
    }

    pub fn client(&self, id: &str) -> Option<&ClientConfig> {
        self.clients.iter().find(|c| c.id == id)
    }

    pub fn agent(&self, name: &str) -> Option<&AgentProfile> {
        self.agents.iter().find(|a| a.name == name)
    }
}

/// Read every json/yaml/yml/toml file in a directory, one entry per file
fn load_entries_from_dir<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, anyhow::Error> {
    let mut entries = Vec::new();
    let pattern = format!("{}/*", path.display());
    for entry in glob::glob(&pattern)? {
        match entry {
            Ok(path) => {
                if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
                    if matches!(ext, "json" | "yaml" | "yml" | "toml") {
                        entries.push(parse_entry(&path, ext)?);
                    }
                }
            }
            Err(e) => tracing::warn!("Failed to read glob entry: {}", e),
        }
    }
    Ok(entries)
}

fn parse_entry<T: DeserializeOwned>(path: &PathBuf, ext: &str) -> Result<T, anyhow::Error> {
    let content = std::fs::read_to_string(path)?;
    let entry = match ext {
        "json" => serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("JSON parse error in {}: {}", path.display(), e))?,
        "toml" => toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("TOML parse error in {}: {}", path.display(), e))?,
        _ => serde_yaml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("YAML parse error in {}: {}", path.display(), e))?,
    };
    Ok(entry)
}

/// Install the global tracing subscriber. `RUST_LOG` wins over the
/// configured filter.
pub fn init_tracing(logging: &LoggingSettings) -> Result<(), anyhow::Error> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.filter))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if logging.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))
}
