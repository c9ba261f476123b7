//! Bridge daemon.
//!
//! Bootstraps the Cube, keeps the WebSocket connection alive, and logs every
//! state change until interrupted.
//!
//!   cubelink-daemon --config /etc/cubelink.toml
//!   CUBELINK_HOST=192.168.1.20 CUBELINK_API_KEY=... cubelink-daemon

use anyhow::Context;
use clap::Parser;
use cubelink_client::StateFilter;
use cubelink_daemon::{Bridge, ConfigArgs, SharedCache, StateCache, follow};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Parser)]
#[command(name = "cubelink-daemon", version, about = "MIYO Cube bridge daemon")]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    /// Log at debug level.
    #[arg(long, short)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cubelink_daemon::init_logging(cli.verbose)?;

    let config = cli.config.load()?;
    let bridge = Bridge::start(&config)
        .await
        .with_context(|| format!("bootstrapping cube at {}", config.host))?;

    let cache: SharedCache = Arc::new(RwLock::new(StateCache::seeded(bridge.circuits())));
    tracing::info!(states = cache.read().await.len(), "state seeded");
    let follower = tokio::spawn(follow(
        Arc::clone(&cache),
        bridge.bus().subscribe(StateFilter::all()),
    ));

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    bridge.shutdown().await;
    follower.abort();
    Ok(())
}
