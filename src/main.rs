mod adapters;
mod bootstrap;
mod config;
mod error;
mod execution;
mod ledger;
mod settlement;
mod state;
#[cfg(test)]
mod testing;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Initialize logging and tracing
fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,credit_distributor=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("🚀 Starting credit distributor");

    // Load configuration
    dotenv::dotenv().ok();
    let config = config::Config::from_env().context("Failed to load configuration")?;

    let scheduler = bootstrap::initialize_scheduler(&config)
        .await
        .context("Failed to initialize distributor")?;

    info!("Resuming from block {}", scheduler.state().from_block);

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received");
                shutdown.cancel();
            }
            Err(e) => warn!("Failed to listen for shutdown signal: {}", e),
        }
    });

    let final_state = scheduler
        .start(cancel)
        .await
        .context("Distribution loop panicked")?;
    info!("Stopped with from_block={}", final_state.from_block);

    Ok(())
}
