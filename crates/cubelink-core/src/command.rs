//! Outbound commands.
//!
//! Callers build a [`Command`] from a method name and params. The request id
//! and api key are stamped on by the connection at send time, never by the
//! caller.

use crate::{DeviceId, StateType};
use serde::Serialize;
use serde_json::{Map, Value};

/// Request id stamped on every command. The Cube does not correlate replies.
pub const REQUEST_ID: u64 = 1;

/// Irrigation durations the Cube accepts, in minutes.
pub const DURATION_RANGE: std::ops::RangeInclusive<u32> = 1..=60;

/// A method call to send to the Cube.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    method: String,
    params: Map<String, Value>,
}

impl Command {
    /// Create a command for any method.
    pub fn new(method: impl Into<String>, params: Map<String, Value>) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }

    /// `Circuit.irrigation` with mode `start`.
    ///
    /// Without a duration the Cube uses the circuit's configured default.
    pub fn start_irrigation(
        circuit: &DeviceId,
        duration_minutes: Option<u32>,
    ) -> Result<Self, CommandError> {
        let mut params = Map::new();
        params.insert("circuitId".into(), circuit.as_str().into());
        params.insert("mode".into(), "start".into());
        if let Some(minutes) = duration_minutes {
            if !DURATION_RANGE.contains(&minutes) {
                return Err(CommandError::DurationOutOfRange(minutes));
            }
            params.insert("duration".into(), minutes.into());
        }
        Ok(Self::new("Circuit.irrigation", params))
    }

    /// `Circuit.irrigation` with mode `stop`.
    pub fn stop_irrigation(circuit: &DeviceId) -> Self {
        let mut params = Map::new();
        params.insert("circuitId".into(), circuit.as_str().into());
        params.insert("mode".into(), "stop".into());
        Self::new("Circuit.irrigation", params)
    }

    /// `Circuit.edit` setting a boolean circuit setting such as
    /// `automaticMode` or `valveStaggering`.
    pub fn edit_circuit(circuit: &DeviceId, state_type: &StateType, value: bool) -> Self {
        let mut params = Map::new();
        params.insert("circuitId".into(), circuit.as_str().into());
        params.insert("state_type".into(), state_type.as_str().into());
        params.insert(state_type.as_str().to_string(), value.into());
        Self::new("Circuit.edit", params)
    }

    /// Method name, e.g. `Circuit.irrigation`.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Caller-supplied params, sent as is.
    pub fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    /// Serialize the full wire envelope.
    pub fn to_envelope(&self, api_key: &str) -> Result<String, CommandError> {
        let envelope = Envelope {
            method: &self.method,
            params: &self.params,
            id: REQUEST_ID,
            api_key,
        };
        Ok(serde_json::to_string(&envelope)?)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<'a> {
    method: &'a str,
    params: &'a Map<String, Value>,
    id: u64,
    api_key: &'a str,
}

/// Error building or encoding a command.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("irrigation duration must be 1..=60 minutes, got {0}")]
    DurationOutOfRange(u32),
    #[error("failed to encode command: {0}")]
    Encode(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn c1() -> DeviceId {
        DeviceId::canonical("c1")
    }

    #[test]
    fn envelope_carries_id_and_key() {
        let cmd = Command::start_irrigation(&c1(), Some(5)).unwrap();
        let wire: Value = serde_json::from_str(&cmd.to_envelope("secret").unwrap()).unwrap();
        assert_eq!(
            wire,
            json!({
                "method": "Circuit.irrigation",
                "params": {"circuitId": "c1", "mode": "start", "duration": 5},
                "id": 1,
                "apiKey": "secret"
            })
        );
    }

    #[test]
    fn stamping_leaves_command_untouched() {
        let cmd = Command::stop_irrigation(&c1());
        let before = cmd.clone();
        cmd.to_envelope("k").unwrap();
        assert_eq!(cmd, before);
        assert!(!cmd.params().contains_key("apiKey"));
    }

    #[test]
    fn start_without_duration() {
        let cmd = Command::start_irrigation(&c1(), None).unwrap();
        assert!(!cmd.params().contains_key("duration"));
    }

    #[test]
    fn duration_bounds() {
        assert!(Command::start_irrigation(&c1(), Some(1)).is_ok());
        assert!(Command::start_irrigation(&c1(), Some(60)).is_ok());
        assert!(matches!(
            Command::start_irrigation(&c1(), Some(0)),
            Err(CommandError::DurationOutOfRange(0))
        ));
        assert!(Command::start_irrigation(&c1(), Some(61)).is_err());
    }

    #[test]
    fn edit_names_the_setting_twice() {
        let cmd = Command::edit_circuit(&c1(), &StateType::AutomaticMode, true);
        assert_eq!(cmd.method(), "Circuit.edit");
        assert_eq!(
            Value::Object(cmd.params().clone()),
            json!({"circuitId": "c1", "state_type": "automaticMode", "automaticMode": true})
        );
    }
}
