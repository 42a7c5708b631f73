//! Keystone cluster license node
//!
//! Runs an in-process replicated cluster and exposes its license over HTTP:
//! 1. `PUT /_license` registers a signed license document
//! 2. `DELETE /_license` removes the cluster license
//! 3. `GET /_license` returns the license in effect
//!
//! Usage:
//!   keystone-node --port 9200 --state-file cluster-state.json

use std::{path::PathBuf, sync::Arc, time::Duration};
use anyhow::{Context, Result};
use clap::Parser;
use keystone_consensus::{ClusterConfig, ClusterState, InMemoryCluster};
use keystone_license::{LicenseVerifier, TrustedKeys};
use keystone_node::{build_router, parse_public_key, persist_committed, run_collector};
use keystone_service::{LicenseService, LicenseState, NodeStatsCollector, ServiceConfig};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "keystone-node")]
#[command(about = "Keystone cluster license node")]
struct Args {
    /// HTTP API port
    #[arg(short, long, default_value = "9200")]
    port: u16,

    /// Number of cluster members to run in-process
    #[arg(short, long, default_value = "3")]
    nodes: usize,

    /// How long license writes wait for a commit acknowledgement
    #[arg(long, default_value = "30000")]
    ack_timeout_ms: u64,

    /// Base64url Ed25519 public key trusted for license verification.
    /// Defaults to the embedded placeholder key.
    #[arg(long)]
    public_key: Option<String>,

    /// File the committed cluster state is persisted to and restored from
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Seconds between node stats collections
    #[arg(long, default_value = "10")]
    collect_interval_secs: u64,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    info!("Keystone node starting...");

    let keys = match &args.public_key {
        Some(encoded) => parse_public_key(encoded)?,
        None => {
            warn!("No --public-key given; trusting the placeholder key only");
            TrustedKeys::embedded().context("Failed to load embedded license key")?
        }
    };
    let service_config =
        ServiceConfig::default().with_ack_timeout(Duration::from_millis(args.ack_timeout_ms));

    let cluster_config = ClusterConfig {
        node_count: args.nodes,
        ..ClusterConfig::default()
    };
    let restored = match &args.state_file {
        Some(path) => ClusterState::read_from(path)
            .await
            .with_context(|| format!("Failed to read cluster state from {:?}", path))?,
        None => None,
    };
    let cluster = match restored {
        Some(state) => {
            info!("Restored cluster {} at version {}", state.cluster_id, state.version);
            InMemoryCluster::restore(cluster_config, state)
        }
        None => InMemoryCluster::start(cluster_config),
    };

    if let Some(path) = args.state_file.clone() {
        tokio::spawn(persist_committed(cluster.subscribe_committed(), path));
    }

    let node = cluster.node(0).context("Cluster has no nodes")?;
    let service = Arc::new(
        LicenseService::new(Arc::new(node), LicenseVerifier::new(keys), service_config)
            .context("Invalid license service configuration")?,
    );

    let collector = NodeStatsCollector::new(LicenseState::new(service.clone()));
    tokio::spawn(run_collector(
        collector,
        Duration::from_secs(args.collect_interval_secs.max(1)),
    ));

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", args.port))
        .await
        .with_context(|| format!("Failed to bind HTTP port {}", args.port))?;

    println!("\n========================================");
    println!("  Keystone Node Running");
    println!("========================================");
    println!("  Cluster:   {}", cluster.cluster_id());
    println!("  Members:   {}", cluster.nodes().len());
    println!("  HTTP Port: {}", args.port);
    println!("========================================\n");

    axum::serve(listener, build_router(service))
        .await
        .context("HTTP server failed")?;
    Ok(())
}
