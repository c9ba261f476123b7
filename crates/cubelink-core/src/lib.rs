//! Core types for the MIYO Cube bridge.
//!
//! This crate is pure: it turns the Cube's JSON notifications into typed
//! [`StateUpdate`]s, builds outbound [`Command`]s, and parses the bootstrap
//! topology. Transport lives in `cubelink-client`.

pub mod coerce;
mod command;
mod device_id;
pub mod notification;
mod state;
pub mod topology;

pub use command::{Command, CommandError, DURATION_RANGE, REQUEST_ID};
pub use device_id::{DeviceId, DeviceIdError};
pub use notification::{
    FrameError, NormalizeError, Notification, RawFrame, decode_frame, normalize, try_normalize,
};
pub use state::{StateType, StateUpdate, StateValue};
pub use topology::{Circuit, Sensor, SystemStatus, TopologyError, Valve};

/// Port the Cube serves its WebSocket API on.
pub const WS_PORT: u16 = 3810;

/// Event bus topic normalized updates are published under.
pub const UPDATE_TOPIC: &str = "miyocube_update";

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Not started, or stopped.
    #[default]
    Idle,
    /// Handshaking, or waiting to retry.
    Connecting,
    /// Handshake done; frames are flowing.
    Connected,
    /// Stop requested; closing the socket.
    Draining,
}

impl ConnectionState {
    /// Whether frames are flowing.
    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }
}
