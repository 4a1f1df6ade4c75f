//! suntikd - packet-injection controller daemon.
//!
//! Single-node wiring: in-memory store and topology graph, channel-backed
//! peer pool, scripted election granting this instance mastership.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal::unix::{signal, SignalKind};
use tracing_subscriber::EnvFilter;

use suntik::election::ManualElection;
use suntik::graph::MemoryGraph;
use suntik::rpc::ChannelPool;
use suntik::store::MemoryStore;
use suntik::{Config, Controller};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_path);

    let config = Config::load_from(&config_path)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.tracing_filter.clone()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    tracing::info!("Starting suntikd packet-injection controller");
    tracing::info!("Config path: {:?}", config_path);

    let graph = Arc::new(match &config.topology_path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read topology file {}", path.display()))?;
            let graph = MemoryGraph::from_json(&json)
                .with_context(|| format!("Failed to parse topology file {}", path.display()))?;
            tracing::info!("Loaded topology from {}", path.display());
            graph
        }
        None => MemoryGraph::new(),
    });

    let store = Arc::new(MemoryStore::new());
    let pool = Arc::new(ChannelPool::new());
    let election = Arc::new(ManualElection::new(config.election_name.as_str(), true));

    let controller = Controller::new(store, graph, pool, election, &config);
    controller.start();
    tracing::info!(
        "Controller started, election '{}', master: {}",
        config.election_name,
        controller.is_master()
    );

    let mut sigterm = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;

    tokio::select! {
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM, shutting down");
        }
        _ = sigint.recv() => {
            tracing::info!("Received SIGINT, shutting down");
        }
    }

    controller.stop();
    tracing::info!("Controller stopped");
    Ok(())
}
