//! Client error types.

use cubelink_core::TopologyError;
use std::time::Duration;
use tokio_tungstenite::tungstenite;

/// Why a connection ended. These never reach callers of
/// [`Connection`](crate::Connection); the reconnect loop logs them and retries.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("handshake did not complete within {0:?}")]
    HandshakeTimeout(Duration),
    #[error("websocket error: {0}")]
    Transport(#[from] tungstenite::Error),
    #[error("connection closed by peer")]
    Closed,
    #[error("write did not complete within {0:?}")]
    WriteTimeout(Duration),
    #[error("a write failed, link torn down")]
    WriteFailed,
    #[error("no live connection")]
    NotConnected,
}

/// Failure of a one-shot HTTP call. Fatal to startup.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("request to {endpoint} failed: {source}")]
    Http {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} returned HTTP {status}")]
    Status {
        endpoint: &'static str,
        status: reqwest::StatusCode,
    },
    #[error("{endpoint} returned a body that is not JSON: {source}")]
    Decode {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error(transparent)]
    Topology(#[from] TopologyError),
    #[error("link response has no apiKey")]
    NoApiKey,
}
