//! Unit agent
//!
//! Runs the actions queued in `<data_dir>/actions.json` and the hooks of the
//! workload in `UNITER_CHARM_DIR`, persisting progress in
//! `<data_dir>/state.json` so an interrupted agent picks up where it left off.

mod actions;
mod agent;
mod callbacks;
mod config;
mod process;
mod units;

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use uniter_operation::{CancellationToken, MachineLock};

use crate::agent::Agent;
use crate::config::AgentConfig;
use crate::units::{MemoryHub, UnitsManager};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "uniter_agent=debug,uniter_operation=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AgentConfig::from_env();
    tracing::info!("Using data directory: {:?}", config.data_dir);
    tracing::info!("Using charm directory: {:?}", config.charm_dir);

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
                return;
            }
            tracing::info!("Shutting down");
            shutdown.cancel();
        });
    }

    let units = if config.units_manager {
        // Embedding point for in-process workers that publish unit requests
        let hub = Arc::new(MemoryHub::new());
        let manager = UnitsManager::start(hub);
        Some(tokio::spawn(manager.run(shutdown.clone())))
    } else {
        None
    };

    let agent = Agent::new(&config, MachineLock::new(), shutdown.clone()).await?;
    let result = agent.run().await;

    shutdown.cancel();
    if let Some(units) = units {
        units.await?;
    }
    result
}
