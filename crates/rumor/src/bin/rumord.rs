//! rumord: gossip membership daemon.
//!
//! Runs one node until interrupted. Flags override values from `--config`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rumor::{Node, NodeConfig, NodeIdentity, SleepPolicy};

#[derive(Parser, Debug)]
#[command(name = "rumord")]
#[command(about = "Gossip anti-entropy membership daemon")]
struct Args {
    /// JSON config file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on, as host:port
    #[arg(short, long)]
    bind: Option<NodeIdentity>,

    /// Host to advertise instead of the bind host
    #[arg(long)]
    advertise_host: Option<String>,

    /// Neighbor to gossip with, as host:port (repeatable)
    #[arg(short, long = "neighbor")]
    neighbors: Vec<NodeIdentity>,

    /// Seconds without news before a peer is evicted
    #[arg(long)]
    ttl_secs: Option<u64>,

    /// Fixed delay between gossip cycles, in milliseconds
    #[arg(long, conflicts_with = "events_per_minute")]
    interval_ms: Option<u64>,

    /// Mean gossip rate for Poisson-distributed cycles
    #[arg(long)]
    events_per_minute: Option<f64>,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,
}

impl Args {
    fn into_config(self) -> Result<NodeConfig> {
        let mut config = match &self.config {
            Some(path) => NodeConfig::from_json_file(path)?,
            None => NodeConfig::default(),
        };

        if let Some(bind) = self.bind {
            config.bind = bind;
        }
        if self.advertise_host.is_some() {
            config.advertise_host = self.advertise_host;
        }
        config.neighbors.extend(self.neighbors);
        if let Some(secs) = self.ttl_secs {
            config.ttl = Duration::from_secs(secs);
        }
        if let Some(ms) = self.interval_ms {
            config.interval = SleepPolicy::Fixed(Duration::from_millis(ms));
        }
        if let Some(events_per_minute) = self.events_per_minute {
            config.interval = SleepPolicy::Poisson { events_per_minute };
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "rumor=debug,rumor_sync=debug,rumor_store=debug"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = args.into_config().context("loading configuration")?;
    let node = Node::bind(config).await.context("starting node")?;
    info!(local = %node.local_id(), addr = %node.local_addr(), "rumord running");

    let handle = node.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
        }
        handle.shutdown();
    });

    node.run().await?;
    Ok(())
}
