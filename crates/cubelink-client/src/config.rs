//! Connection configuration.

use cubelink_core::WS_PORT;
use std::time::Duration;

/// Settings for one Cube WebSocket connection.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// WebSocket URL, normally `ws://<host>:3810`.
    pub url: String,
    /// Shared secret stamped on every outbound command.
    pub api_key: String,
    /// Fixed delay between a failure and the next connect attempt
    /// (default: 15 seconds).
    pub reconnect_interval: Duration,
    /// How long a read may wait before the connection is probed with a
    /// ping (default: 60 seconds). Also bounds the handshake.
    pub idle_timeout: Duration,
}

impl ConnectionConfig {
    pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(15);
    pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

    /// Configuration for an explicit URL.
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            reconnect_interval: Self::DEFAULT_RECONNECT_INTERVAL,
            idle_timeout: Self::DEFAULT_IDLE_TIMEOUT,
        }
    }

    /// Configuration for a Cube at `host` on the standard port.
    pub fn for_host(host: &str, api_key: impl Into<String>) -> Self {
        Self::new(format!("ws://{host}:{WS_PORT}"), api_key)
    }

    /// Set the reconnect interval.
    pub fn reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    /// Set the idle-read timeout.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_uses_fixed_port() {
        let config = ConnectionConfig::for_host("192.168.1.20", "key");
        assert_eq!(config.url, "ws://192.168.1.20:3810");
        assert_eq!(config.reconnect_interval, Duration::from_secs(15));
        assert_eq!(config.idle_timeout, Duration::from_secs(60));
    }

    #[test]
    fn builder_overrides() {
        let config = ConnectionConfig::new("ws://localhost:1", "k")
            .reconnect_interval(Duration::from_millis(50))
            .idle_timeout(Duration::from_millis(200));
        assert_eq!(config.reconnect_interval, Duration::from_millis(50));
        assert_eq!(config.idle_timeout, Duration::from_millis(200));
    }
}
