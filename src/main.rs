mod api;
mod command;
mod config;
mod credentials;
mod logs;
mod network;
mod services;
mod update;

use api::{AppContext, ApiHandle};
use clap::Parser;
use command::SystemRunner;
use config::AgentConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Device control agent: wifi, containers, firmware updates and SSH keys over HTTP
#[derive(Parser, Debug)]
#[command(name = "device-agent", version)]
struct Cli {
    /// TOML configuration file; built-in defaults when omitted
    #[arg(short, long, env = "DEVICE_AGENT_CONFIG")]
    config: Option<PathBuf>,

    /// Override the listen address from the configuration
    #[arg(short, long, env = "DEVICE_AGENT_LISTEN")]
    listen: Option<SocketAddr>,

    /// Log filter directives; takes precedence over RUST_LOG
    #[arg(long)]
    log_filter: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match &cli.log_filter {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let mut config = AgentConfig::load(cli.config.as_deref())?;
    if let Some(listen) = cli.listen {
        config.server.listen = listen;
    }
    let listen = config.server.listen;

    info!("Device agent starting");
    if let Some(path) = &cli.config {
        info!("  config: {}", path.display());
    }
    info!("  compose file: {}", config.services.compose_file.display());
    info!("  wifi interface: {}", config.network.interface);

    let ctx = Arc::new(AppContext::new(config, Arc::new(SystemRunner)));
    let server = ApiHandle::spawn(listen, ctx).await?;
    info!("Server is running on {}", server.local_addr());

    shutdown_signal().await;
    info!("Shutting down...");
    server.shutdown().await?;
    info!("Server is stopped");

    Ok(())
}

async fn shutdown_signal() {
    tokio::select! {
        _ = ctrl_c() => {},
        _ = terminate() => {},
    }
}

async fn ctrl_c() {
    if let Err(err) = signal::ctrl_c().await {
        warn!(?err, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
}

async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            term.recv().await;
        }
        Err(err) => {
            warn!(?err, "failed to install SIGTERM handler");
            std::future::pending::<()>().await;
        }
    }
}
