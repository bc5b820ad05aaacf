//! Docker service discovery agent
//!
//! Serves Prometheus `http_sd` targets for labelled containers on this host
//! together with per-container resource gauges.

use anyhow::{Context, Result};
use sd_lib::{DockerInventory, Engine, HealthRegistry, StructuredLogger};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting docker-sd");

    let config = config::AgentConfig::load()?;
    info!(
        host_name = %config.host_name,
        scope = ?config.container_scope,
        "Agent configured"
    );

    let inventory = DockerInventory::connect(config.docker_timeout())
        .context("Failed to create Docker client")?;

    let logger = StructuredLogger::new(&config.host_name);
    let engine = Engine::new(Arc::new(inventory), config.engine_config(), logger.clone());
    let health_registry = HealthRegistry::new();

    // The daemon may come up after us; requests retry on their own
    match engine.ping().await {
        Ok(()) => health_registry.inventory_ok().await,
        Err(e) => {
            warn!(error = %e, "Docker daemon not reachable at startup");
            health_registry.inventory_failed(e.to_string()).await;
        }
    }

    let bind_addr = config.bind_addr();
    logger.log_startup(AGENT_VERSION, &bind_addr);

    let app_state = Arc::new(api::AppState::new(engine, health_registry, logger.clone()));
    api::serve(&bind_addr, app_state, shutdown_signal()).await?;

    logger.log_shutdown("signal received");
    info!("Shutting down");

    Ok(())
}

/// Resolves on SIGINT, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
