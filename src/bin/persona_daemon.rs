//! # Persona Daemon
//!
//! Thin wrapper binary running the orchestration loop and the health endpoint.
//!
//! ## Usage
//!
//! ```bash
//! # Run continuously with config/persona-daemon.toml
//! persona-daemon
//!
//! # Single pass (poll, plan, at most three actions), then exit
//! persona-daemon --once --config /etc/persona/daemon.toml
//! ```

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::oneshot;
use tracing::{error, info};

use persona_core::config::ConfigManager;
use persona_core::logging;
use persona_core::orchestration::{DaemonServices, PersonaDaemon};
use persona_core::web::{self, WebState};

#[derive(Debug, Parser)]
#[command(name = "persona-daemon")]
#[command(about = "Autonomous multi-persona scheduling daemon")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Run a single poll/plan/execute pass and exit
    #[arg(long)]
    once: bool,

    /// Configuration file (defaults to config/persona-daemon.toml when present)
    #[arg(short, long, env = "PERSONA_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let manager = ConfigManager::load(cli.config).context("failed to load configuration")?;
    let config = manager.config();
    logging::init_structured_logging(&config.logging);

    info!("🚀 Starting Persona Daemon...");
    info!("   Version: {}", env!("CARGO_PKG_VERSION"));
    info!("   Mode: {}", if cli.once { "single pass" } else { "continuous" });

    let services = DaemonServices::from_config(config)
        .await
        .context("failed to wire daemon services")?;
    let daemon = Arc::new(
        PersonaDaemon::bootstrap(services)
            .await
            .context("failed to bootstrap personas")?,
    );

    if cli.once {
        let succeeded = daemon.run_once().await?;
        info!(succeeded = succeeded, "✅ Single pass complete");
        daemon.close().await;
        return Ok(());
    }

    let (health_tx, health_rx) = oneshot::channel::<()>();
    let health_task = if config.health.enabled {
        let state = Arc::new(WebState::new(daemon.clone()));
        let bind_address = config.health.bind_address.clone();
        Some(tokio::spawn(async move {
            let shutdown = async move {
                let _ = health_rx.await;
            };
            if let Err(e) = web::serve(state, &bind_address, shutdown).await {
                error!(error = %e, "🩺 HEALTH: Server stopped with error");
            }
        }))
    } else {
        None
    };

    let loop_daemon = daemon.clone();
    let loop_task = tokio::spawn(async move { loop_daemon.run().await });

    info!("   Press Ctrl+C to shutdown gracefully");
    shutdown_signal().await;

    daemon.shutdown();
    if let Err(e) = loop_task.await {
        error!(error = %e, "Orchestration loop task failed");
    }
    let _ = health_tx.send(());
    if let Some(task) = health_task {
        let _ = task.await;
    }
    daemon.close().await;

    info!("👋 Persona Daemon shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C");
        },
        _ = terminate => {
            info!("Received SIGTERM");
        },
    }
}
