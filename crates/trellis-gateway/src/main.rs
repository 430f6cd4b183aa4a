//! Trellis Gateway
//!
//! Single binary that runs:
//! - the batch ingress endpoint fronting the overlay fabric
//! - the controller state / config / incident API
//! - virtual-node fault injection endpoints
//! - the node-health poller and gradual-revert stepper

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use trellis_controller::{Controller, MemorySink};
use trellis_fabric::Topology;
use trellis_gateway::config::GatewayConfig;
use trellis_gateway::state::AppState;
use trellis_gateway::{app, workers};

#[derive(Debug, Parser)]
#[command(name = "trellis-gateway", about = "Predictive resilience failover gateway")]
struct Args {
    /// Path to the gateway TOML configuration.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ─────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = GatewayConfig::load(args.config.as_deref())?;

    // ── Topology (fatal on failure) ─────────────────────────────
    let topology = Topology::from_file(&config.topology_path)
        .map_err(|e| anyhow::anyhow!("startup aborted: {e}"))?;

    // ── Controller ──────────────────────────────────────────────
    let mut controller = Controller::new(
        topology,
        config.controller_config(),
        Box::new(MemorySink::default()),
    );
    let registered = controller
        .register_default_paths(config.default_paths)
        .map_err(|e| anyhow::anyhow!("startup aborted: {e}"))?;
    tracing::info!(paths = registered, "overlay paths registered");

    // ── Shared state & workers ──────────────────────────────────
    let state = AppState::new(controller, config.clone())?;
    workers::spawn(state.clone());

    // ── Listen ──────────────────────────────────────────────────
    let addr: SocketAddr = config.listen_addr.parse()?;
    tracing::info!("trellis-gateway listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}
