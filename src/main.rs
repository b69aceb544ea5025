//! MarketPulse daemon
//!
//! Runs the snapshot scheduler until Ctrl-C.

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::info;

use marketpulse::config::AppConfig;
use marketpulse::{logging, MarketService};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    logging::init(&config.logging);

    info!("Starting MarketPulse v{}", env!("CARGO_PKG_VERSION"));
    info!(config = %config.digest(), "Configuration loaded");

    let service = MarketService::from_config(&config)?;
    let scheduler = service.scheduler(&config);

    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    let handle = tokio::spawn(scheduler.run(shutdown_rx));

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    let _ = shutdown_tx.send(()).await;
    handle.await?;

    info!("MarketPulse stopped");
    Ok(())
}
