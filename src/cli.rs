use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::domain::CapabilityKind;

/// Switchyard - capability dispatch across MCP clients
#[derive(Parser, Debug, Clone)]
#[command(name = "switchyard", version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, env = "SWITCHYARD_CONFIG", default_value = crate::config::DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// List connected clients and what they registered
    Clients,

    /// Print the capability catalogue, optionally as seen by one agent
    Catalogue {
        /// Agent whose allow-list and exclusions apply
        #[arg(long)]
        agent: Option<String>,

        /// Capability kind to list
        #[arg(long, default_value = "tool")]
        kind: CapabilityKind,
    },

    /// Invoke a tool directly through the dispatch facade
    CallTool {
        /// Tool name
        name: String,

        /// Tool arguments as a JSON object
        #[arg(long, default_value = "{}")]
        args: String,

        /// Client that should handle the call
        #[arg(long)]
        client: Option<String>,
    },

    /// Connect every client and print the invocation metrics
    Metrics,
}
