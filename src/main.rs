//! agentbus binary: start the orchestration service and its HTTP boundary.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use agentbus::messaging::{Role, listener_fn};
use agentbus::{ApiServer, ApiServerConfig, AppService, Config, ListenerError};

#[derive(Parser, Debug)]
#[command(name = "agentbus")]
#[command(about = "In-process publish/subscribe message broker for agent orchestration")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Address to bind the HTTP server to (overrides AGENTBUS_BIND_ADDR)
    #[arg(long, global = true)]
    bind: Option<SocketAddr>,

    /// Primary message channel name (overrides AGENTBUS_CHANNEL)
    #[arg(long, global = true)]
    channel: Option<String>,

    /// Response wait in milliseconds (overrides AGENTBUS_RESPONSE_TIMEOUT_MS)
    #[arg(long, global = true)]
    response_timeout_ms: Option<u64>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default if no subcommand given)
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env().context("loading configuration")?;
    if let Some(bind) = cli.bind {
        config.bind_addr = bind;
    }
    if let Some(channel) = cli.channel {
        config.channel = channel;
    }
    if let Some(ms) = cli.response_timeout_ms {
        config.response_timeout = std::time::Duration::from_millis(ms);
    }

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let service = AppService::new(&config)
        .await
        .context("building application service")?;

    register_stub_collaborators(&service)
        .await
        .context("registering collaborators")?;

    let service = Arc::new(service);
    let mut server = ApiServer::new(
        ApiServerConfig {
            addr: config.bind_addr,
        },
        service,
    );
    server.start().await.context("starting API server")?;

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    tracing::info!("Received ctrl-c, shutting down");
    server.shutdown().await;
    Ok(())
}

/// Register acknowledgement-only collaborators.
///
/// Real agent-factory and agent implementations plug in through the same
/// registration points; these stubs let the server answer end to end until
/// they exist.
async fn register_stub_collaborators(service: &AppService) -> anyhow::Result<()> {
    let factory_emitter = service
        .broker()
        .emitter(
            service.channel(),
            service.factory_sender(),
            Role::AgentFactory,
        )
        .await?;
    service
        .register_factory(listener_fn(move |msg| {
            let emitter = factory_emitter.clone();
            async move {
                tracing::info!(message_id = %msg.id, "Factory stub handling bootstrap request");
                let mut content: HashMap<String, serde_json::Value> = HashMap::new();
                content.insert(
                    "result".to_string(),
                    serde_json::Value::String("agent_bootstrapped".to_string()),
                );
                if let Some(name) = msg.content.get("agent_name") {
                    content.insert("agent_name".to_string(), name.clone());
                }
                emitter
                    .send_message(content, HashMap::new())
                    .await
                    .map_err(|e| ListenerError::Failed {
                        reason: e.to_string(),
                    })?;
                Ok(())
            }
        }))
        .await?;

    service
        .register_agent(listener_fn(|msg| async move {
            tracing::info!(message_id = %msg.id, "Agent stub handling launch request");
            Ok(())
        }))
        .await?;

    Ok(())
}
