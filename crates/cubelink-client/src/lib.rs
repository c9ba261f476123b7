//! Client side of the MIYO Cube bridge.
//!
//! - [`Connection`]: the long-lived WebSocket session, with fixed-interval
//!   reconnects, idle pings, and fire-and-forget command sends.
//! - [`EventBus`]: publish/subscribe for normalized state updates.
//! - [`CubeHttp`]: the one-shot HTTP calls used at startup.

mod bus;
mod config;
mod connection;
mod error;
mod http;

pub use bus::{EventBus, StateFilter, Subscription, UpdateEvent};
pub use config::ConnectionConfig;
pub use connection::{Connection, FrameHandler};
pub use error::{BootstrapError, ConnectionError};
pub use http::CubeHttp;
