//! Daemon configuration.
//!
//! Settings come from an optional TOML file, then command-line flags and
//! environment variables on top. Only `host` and `api_key` are required.
//!
//! ```toml
//! host = "192.168.1.20"
//! api_key = "..."
//! reconnect_interval_secs = 15
//! ```

use clap::Args;
use cubelink_client::{BootstrapError, ConnectionConfig, CubeHttp};
use cubelink_core::WS_PORT;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Port the Cube serves its HTTP API on.
pub const DEFAULT_HTTP_PORT: u16 = 80;

/// Fully resolved settings for one Cube.
#[derive(Debug, Clone, PartialEq)]
pub struct DaemonConfig {
    pub host: String,
    pub api_key: String,
    pub ws_port: u16,
    pub http_port: u16,
    pub reconnect_interval: Duration,
    pub idle_timeout: Duration,
    pub http_timeout: Duration,
}

impl DaemonConfig {
    /// WebSocket settings for this Cube.
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig::new(format!("ws://{}:{}", self.host, self.ws_port), &self.api_key)
            .reconnect_interval(self.reconnect_interval)
            .idle_timeout(self.idle_timeout)
    }

    /// HTTP client for this Cube's bootstrap calls.
    pub fn http_client(&self) -> Result<CubeHttp, BootstrapError> {
        CubeHttp::new(
            format!("http://{}:{}", self.host, self.http_port),
            &self.api_key,
            self.http_timeout,
        )
    }
}

/// Settings as written in the config file. Every field is optional here;
/// [`FileConfig::resolve`] fills defaults and checks the required ones.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub host: Option<String>,
    pub api_key: Option<String>,
    pub ws_port: Option<u16>,
    pub http_port: Option<u16>,
    pub reconnect_interval_secs: Option<u64>,
    pub idle_timeout_secs: Option<u64>,
    pub http_timeout_secs: Option<u64>,
}

impl FileConfig {
    /// Parse TOML text; `path` is only used in errors.
    pub fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read and parse a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }

    /// Apply defaults, require `host` and `api_key`, and reject zero
    /// durations.
    pub fn resolve(self) -> Result<DaemonConfig, ConfigError> {
        let host = self
            .host
            .filter(|h| !h.is_empty())
            .ok_or(ConfigError::Missing("host"))?;
        let api_key = self
            .api_key
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::Missing("api_key"))?;
        let secs = |name: &'static str, value: Option<u64>, default: Duration| match value {
            Some(0) => Err(ConfigError::Invalid(name)),
            Some(secs) => Ok(Duration::from_secs(secs)),
            None => Ok(default),
        };

        Ok(DaemonConfig {
            host,
            api_key,
            ws_port: self.ws_port.unwrap_or(WS_PORT),
            http_port: self.http_port.unwrap_or(DEFAULT_HTTP_PORT),
            reconnect_interval: secs(
                "reconnect_interval_secs",
                self.reconnect_interval_secs,
                ConnectionConfig::DEFAULT_RECONNECT_INTERVAL,
            )?,
            idle_timeout: secs(
                "idle_timeout_secs",
                self.idle_timeout_secs,
                ConnectionConfig::DEFAULT_IDLE_TIMEOUT,
            )?,
            http_timeout: secs(
                "http_timeout_secs",
                self.http_timeout_secs,
                CubeHttp::DEFAULT_TIMEOUT,
            )?,
        })
    }
}

/// Configuration flags shared by both binaries.
#[derive(Debug, Clone, Default, Args)]
pub struct ConfigArgs {
    /// Path to a TOML config file.
    #[arg(long, short = 'c', env = "CUBELINK_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Cube hostname or IP address.
    #[arg(long, env = "CUBELINK_HOST", global = true)]
    pub host: Option<String>,

    /// Api key issued by `cubelink link`.
    #[arg(long, env = "CUBELINK_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// WebSocket port.
    #[arg(long, global = true)]
    pub ws_port: Option<u16>,

    /// HTTP port.
    #[arg(long, global = true)]
    pub http_port: Option<u16>,

    /// Seconds between reconnect attempts.
    #[arg(long, global = true)]
    pub reconnect_interval: Option<u64>,

    /// Seconds a read may stay idle before the connection is pinged.
    #[arg(long, global = true)]
    pub idle_timeout: Option<u64>,
}

impl ConfigArgs {
    /// File settings with flag and env overrides applied, unresolved.
    pub fn merged(&self) -> Result<FileConfig, ConfigError> {
        let file = match &self.config {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading config");
                FileConfig::from_file(path)?
            }
            None => FileConfig::default(),
        };
        Ok(self.overlay(file))
    }

    /// Merge and resolve into a complete configuration.
    pub fn load(&self) -> Result<DaemonConfig, ConfigError> {
        self.merged()?.resolve()
    }

    fn overlay(&self, file: FileConfig) -> FileConfig {
        FileConfig {
            host: self.host.clone().or(file.host),
            api_key: self.api_key.clone().or(file.api_key),
            ws_port: self.ws_port.or(file.ws_port),
            http_port: self.http_port.or(file.http_port),
            reconnect_interval_secs: self.reconnect_interval.or(file.reconnect_interval_secs),
            idle_timeout_secs: self.idle_timeout.or(file.idle_timeout_secs),
            http_timeout_secs: file.http_timeout_secs,
        }
    }
}

/// Why configuration could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("`{0}` is not set (config file, flag, or environment)")]
    Missing(&'static str),
    #[error("`{0}` must be at least 1 second")]
    Invalid(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<FileConfig, ConfigError> {
        FileConfig::parse(text, Path::new("test.toml"))
    }

    #[test]
    fn defaults_fill_in() {
        let config = parse("host = \"cube.local\"\napi_key = \"k\"")
            .unwrap()
            .resolve()
            .unwrap();
        assert_eq!(config.ws_port, 3810);
        assert_eq!(config.http_port, 80);
        assert_eq!(config.reconnect_interval, Duration::from_secs(15));
        assert_eq!(config.idle_timeout, Duration::from_secs(60));
        assert_eq!(config.http_timeout, Duration::from_secs(10));
        assert_eq!(config.connection_config().url, "ws://cube.local:3810");
    }

    #[test]
    fn file_values_are_used() {
        let config = parse(
            r#"
            host = "10.0.0.5"
            api_key = "k"
            ws_port = 9000
            reconnect_interval_secs = 3
            idle_timeout_secs = 7
            "#,
        )
        .unwrap()
        .resolve()
        .unwrap();
        let conn = config.connection_config();
        assert_eq!(conn.url, "ws://10.0.0.5:9000");
        assert_eq!(conn.api_key, "k");
        assert_eq!(conn.reconnect_interval, Duration::from_secs(3));
        assert_eq!(conn.idle_timeout, Duration::from_secs(7));
    }

    #[test]
    fn flags_override_file() {
        let args = ConfigArgs {
            host: Some("override".into()),
            reconnect_interval: Some(1),
            ..ConfigArgs::default()
        };
        let file = parse("host = \"file\"\napi_key = \"k\"\nreconnect_interval_secs = 30").unwrap();
        let config = args.overlay(file).resolve().unwrap();
        assert_eq!(config.host, "override");
        assert_eq!(config.api_key, "k");
        assert_eq!(config.reconnect_interval, Duration::from_secs(1));
    }

    #[test]
    fn host_and_key_are_required() {
        assert!(matches!(
            parse("api_key = \"k\"").unwrap().resolve(),
            Err(ConfigError::Missing("host"))
        ));
        assert!(matches!(
            parse("host = \"h\"\napi_key = \"\"").unwrap().resolve(),
            Err(ConfigError::Missing("api_key"))
        ));
    }

    #[test]
    fn zero_durations_are_rejected() {
        let base = "host = \"h\"\napi_key = \"k\"\n";
        for (line, field) in [
            ("reconnect_interval_secs = 0", "reconnect_interval_secs"),
            ("idle_timeout_secs = 0", "idle_timeout_secs"),
            ("http_timeout_secs = 0", "http_timeout_secs"),
        ] {
            let err = parse(&format!("{base}{line}")).unwrap().resolve().unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(f) if f == field), "{err}");
        }

        let args = ConfigArgs {
            idle_timeout: Some(0),
            ..ConfigArgs::default()
        };
        let err = args.overlay(parse(base).unwrap()).resolve().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid("idle_timeout_secs")), "{err}");
    }

    #[test]
    fn rejects_unknown_keys_and_bad_types() {
        assert!(matches!(parse("hots = \"h\""), Err(ConfigError::Parse { .. })));
        assert!(matches!(parse("ws_port = \"x\""), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = FileConfig::from_file(Path::new("/nonexistent/cubelink.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
