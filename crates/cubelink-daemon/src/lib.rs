//! Bridge daemon and CLI for the MIYO Cube.
//!
//! [`Bridge`] bootstraps a Cube over HTTP, keeps a WebSocket connection to it,
//! and publishes normalized state updates on an event bus. [`StateCache`]
//! follows that bus and holds the latest value of every device state.

mod bridge;
mod config;
mod state;

pub use bridge::Bridge;
pub use config::{ConfigArgs, ConfigError, DEFAULT_HTTP_PORT, DaemonConfig, FileConfig};
pub use state::{SharedCache, StateCache, follow};

use tracing_subscriber::EnvFilter;

/// Install the log subscriber: `RUST_LOG` plus a default `cubelink` level.
pub fn init_logging(verbose: bool) -> anyhow::Result<()> {
    let level = if verbose { "cubelink=debug" } else { "cubelink=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.parse()?))
        .init();
    Ok(())
}
