use anyhow::Context;
use bandgate::{config::Config, start_server_with_config};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// OAuth2 login gateway with signed cookie sessions
#[derive(Debug, Parser)]
#[command(name = "bandgate", version, about)]
struct Cli {
    /// TOML configuration file (overridden by BANDGATE_* environment variables)
    #[arg(short, long, env = "BANDGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Override the listen port
    #[arg(short, long)]
    port: Option<u16>,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().compact())
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let port = start_server_with_config(config, shutdown_rx).await?;
    info!("Server started on port {}", port);

    // Wait for Ctrl-C
    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested, stopping server...");

    let _ = shutdown_tx.send(());
    // Give in-flight requests a short grace period
    tokio::time::sleep(Duration::from_millis(200)).await;

    info!("Server stopped");
    Ok(())
}
