//! One-shot HTTP calls used to bootstrap the bridge.
//!
//! Each call is a plain GET returning JSON. Any failure is returned to the
//! caller as a [`BootstrapError`]; nothing here retries.

use crate::BootstrapError;
use cubelink_core::{Circuit, SystemStatus};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

const STATUS: &str = "/api/System/status";
const CIRCUITS: &str = "/api/circuit/all";
const LINK: &str = "/api/link";

/// HTTP client for a single Cube.
#[derive(Debug, Clone)]
pub struct CubeHttp {
    base: String,
    api_key: String,
    client: reqwest::Client,
}

impl CubeHttp {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Client for `base`, e.g. `http://192.168.1.20`.
    pub fn new(
        base: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, BootstrapError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| BootstrapError::Http {
                endpoint: "client",
                source,
            })?;
        let base = base.into().trim_end_matches('/').to_string();
        Ok(Self {
            base,
            api_key: api_key.into(),
            client,
        })
    }

    /// Client for a Cube at `host` on port 80.
    pub fn for_host(host: &str, api_key: impl Into<String>) -> Result<Self, BootstrapError> {
        Self::new(format!("http://{host}"), api_key, Self::DEFAULT_TIMEOUT)
    }

    /// `GET /api/System/status`.
    pub async fn system_status(&self) -> Result<SystemStatus, BootstrapError> {
        let body = self.get_json(STATUS, true).await?;
        Ok(SystemStatus::from_response(body)?)
    }

    /// `GET /api/circuit/all`, flattened.
    pub async fn circuits(&self) -> Result<Vec<Circuit>, BootstrapError> {
        let body = self.get_json(CIRCUITS, true).await?;
        Ok(Circuit::list_from_response(body)?)
    }

    /// `GET /api/link`: ask the Cube to issue an api key.
    ///
    /// The Cube only answers after its link button has been pressed.
    pub async fn link(&self) -> Result<String, BootstrapError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct LinkResponse {
            api_key: Option<String>,
        }

        let body = self.get_json(LINK, false).await?;
        let response: LinkResponse =
            serde_json::from_value(body).map_err(|_| BootstrapError::NoApiKey)?;
        response
            .api_key
            .filter(|key| !key.is_empty())
            .ok_or(BootstrapError::NoApiKey)
    }

    async fn get_json(&self, endpoint: &'static str, with_key: bool) -> Result<Value, BootstrapError> {
        let mut request = self.client.get(format!("{}{endpoint}", self.base));
        if with_key {
            request = request.query(&[("apiKey", self.api_key.as_str())]);
        }

        tracing::debug!(endpoint, "querying cube");
        // Errors carry the request URL, which carries the api key.
        let response = request.send().await.map_err(|e| BootstrapError::Http {
            endpoint,
            source: e.without_url(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(BootstrapError::Status { endpoint, status });
        }

        response.json().await.map_err(|e| BootstrapError::Decode {
            endpoint,
            source: e.without_url(),
        })
    }
}
