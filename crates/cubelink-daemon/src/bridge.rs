//! Bridge: wires the bootstrap, the connection, and the event bus together.

use crate::DaemonConfig;
use cubelink_client::{BootstrapError, Connection, ConnectionConfig, EventBus, FrameHandler};
use cubelink_core::{Circuit, RawFrame, SystemStatus, try_normalize};

/// A running bridge to one Cube.
pub struct Bridge {
    status: SystemStatus,
    circuits: Vec<Circuit>,
    bus: EventBus,
    connection: Connection,
}

impl Bridge {
    /// Bootstrap over HTTP, then start the WebSocket connection.
    ///
    /// A bootstrap failure is returned before anything is spawned.
    pub async fn start(config: &DaemonConfig) -> Result<Self, BootstrapError> {
        let http = config.http_client()?;
        let status = http.system_status().await?;
        let circuits = http.circuits().await?;
        tracing::info!(
            host = %config.host,
            uuid = %status.uuid,
            circuits = circuits.len(),
            "cube bootstrapped"
        );
        Ok(Self::with_topology(config.connection_config(), status, circuits))
    }

    /// Start the connection for an already bootstrapped Cube.
    pub fn with_topology(
        connection: ConnectionConfig,
        status: SystemStatus,
        circuits: Vec<Circuit>,
    ) -> Self {
        let bus = EventBus::default();
        let connection = Connection::new(connection, Publisher { bus: bus.clone() });
        connection.start();
        Self {
            status,
            circuits,
            bus,
            connection,
        }
    }

    /// Bus carrying normalized updates.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Send capability and lifecycle state.
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// System status read at startup.
    pub fn status(&self) -> &SystemStatus {
        &self.status
    }

    /// Circuits listed at startup.
    pub fn circuits(&self) -> &[Circuit] {
        &self.circuits
    }

    /// Stop the connection and wait for it to wind down.
    pub async fn shutdown(&self) {
        self.connection.stop().await;
    }
}

/// Normalizes each frame and publishes the result.
struct Publisher {
    bus: EventBus,
}

impl FrameHandler for Publisher {
    fn on_frame(&self, frame: RawFrame) {
        let updates = match try_normalize(&frame) {
            Ok(updates) => updates,
            Err(e) => {
                tracing::debug!(error = %e, "notification ignored");
                return;
            }
        };
        for update in &updates {
            tracing::debug!(
                device_id = %update.device_id,
                state_type = %update.state_type,
                value = %update.value,
                "state update"
            );
        }
        self.bus.publish(updates);
    }
}
