use clap::Parser;
use serde_json::Value;
use switchyard::adapters::RmcpConnector;
use switchyard::cli::{Cli, Command};
use switchyard::config::{init_tracing, Settings};
use switchyard::dispatch::DispatchFacade;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let settings = Settings::from_path(&cli.config)?;

    // Initialize tracing
    init_tracing(&settings.logging)?;

    let dispatch = DispatchFacade::new()?;
    let reports = dispatch.connect_all(&settings.clients, &RmcpConnector).await;
    info!(
        connected = reports.len(),
        configured = settings.clients.len(),
        "Clients connected"
    );

    let outcome = run(&cli.command, &settings, &dispatch).await;
    dispatch.shutdown().await;
    outcome
}

async fn run(command: &Command, settings: &Settings, dispatch: &DispatchFacade) -> anyhow::Result<()> {
    match command {
        Command::Clients => {
            let clients = dispatch.list_clients().await;
            println!("{}", serde_json::to_string_pretty(&clients)?);
        }
        Command::Catalogue { agent, kind } => {
            let profile = match agent {
                Some(name) => Some(
                    settings
                        .agent(name)
                        .ok_or_else(|| anyhow::anyhow!("Agent not found: {}", name))?,
                ),
                None => None,
            };
            let explicit = match kind {
                switchyard::domain::CapabilityKind::Tool => profile.and_then(|p| p.tools.as_deref()),
                _ => None,
            };
            let definitions = dispatch.format_for_consumer(*kind, profile, explicit).await;
            println!("{}", serde_json::to_string_pretty(&definitions)?);
        }
        Command::CallTool { name, args, client } => {
            let arguments: Value = serde_json::from_str(args)
                .map_err(|e| anyhow::anyhow!("--args is not valid JSON: {}", e))?;
            let result = dispatch
                .execute_tool(name, arguments, client.as_deref(), None)
                .await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Metrics => {
            print!("{}", dispatch.metrics().encode()?);
        }
    }
    Ok(())
}
