//! # Fleet Node
//!
//! Runs one node of the fleet notification protocol.
//!
//! ```text
//! fleet-node --config /etc/fleet/node.toml
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use fleet_telemetry::init_telemetry;
use node_runtime::{NodeConfig, NodeRuntime};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "fleet-node", version, about = "Fleet notification node")]
struct Args {
    /// Path to the node's TOML configuration.
    #[arg(short, long, env = "FLEET_CONFIG", default_value = "fleet-node.toml")]
    config: PathBuf,
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Cannot listen for Ctrl-C, shutting down");
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = NodeConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    let _telemetry = init_telemetry(config.telemetry.clone()).context("initializing telemetry")?;

    let bind = config.http.bind;
    let runtime = NodeRuntime::new(config).await.context("building node")?;
    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("binding {bind}"))?;

    info!("Node is running. Press Ctrl+C to stop.");
    runtime.serve(listener, shutdown_signal()).await?;
    Ok(())
}
