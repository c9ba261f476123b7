//! Circuit topology reported by the Cube's HTTP API.
//!
//! `GET /api/circuit/all` returns circuits keyed by braced id, each with its
//! own state types, optional moisture sensor, and valves keyed by slot. This
//! module flattens that into [`Circuit`] descriptors.

use crate::{DeviceId, StateType, StateUpdate};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Basic facts from `GET /api/System/status`.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemStatus {
    pub uuid: String,
    /// Everything else in `params`, untouched.
    pub extra: Map<String, Value>,
}

impl SystemStatus {
    /// Parse a status response body.
    pub fn from_response(body: Value) -> Result<Self, TopologyError> {
        let Value::Object(mut params) = take_params(body)? else {
            return Err(TopologyError::MissingField("params"));
        };
        let uuid = match params.remove("uuid") {
            Some(Value::String(uuid)) if !uuid.is_empty() => uuid,
            _ => return Err(TopologyError::MissingField("uuid")),
        };
        Ok(Self {
            uuid,
            extra: params,
        })
    }
}

/// One irrigation circuit.
#[derive(Debug, Clone, PartialEq)]
pub struct Circuit {
    pub id: DeviceId,
    pub name: Option<String>,
    pub state_types: BTreeMap<StateType, Value>,
    /// Circuit settings such as `automaticMode` and `valveStaggering`.
    pub params: Map<String, Value>,
    pub sensor: Option<Sensor>,
    pub valves: Vec<Valve>,
}

/// The moisture sensor attached to a circuit.
#[derive(Debug, Clone, PartialEq)]
pub struct Sensor {
    pub id: DeviceId,
    pub ip: Option<String>,
    pub last_update: Value,
    pub state_types: BTreeMap<StateType, Value>,
}

/// A valve on a circuit.
#[derive(Debug, Clone, PartialEq)]
pub struct Valve {
    pub id: DeviceId,
    pub ip: Option<String>,
    pub last_update: Value,
    pub hardware_revision: Value,
    pub channel: Value,
    pub state_types: BTreeMap<StateType, Value>,
}

/// Short display name derived from a device's link-local address: the last
/// seven characters with the interface suffix removed.
pub fn short_name(ip: &str) -> String {
    let ip = ip.replace("%zmd0", "");
    let start = ip
        .char_indices()
        .rev()
        .nth(6)
        .map_or(0, |(i, _)| i);
    ip[start..].to_string()
}

impl Circuit {
    /// Parse a `circuit/all` response body.
    pub fn list_from_response(body: Value) -> Result<Vec<Self>, TopologyError> {
        let params: CircuitsParams =
            serde_json::from_value(take_params(body)?).map_err(TopologyError::Decode)?;
        let circuits = params
            .circuits
            .ok_or(TopologyError::MissingField("circuits"))?;

        circuits
            .into_iter()
            .map(|(key, raw)| Self::from_raw(&key, raw))
            .collect()
    }

    fn from_raw(key: &str, raw: RawCircuit) -> Result<Self, TopologyError> {
        let id = parse_id(key)?;
        let sensor = match raw.sensor_data {
            Some(RawDevice { id: Some(sid), .. }) if sid.is_empty() => None,
            Some(RawDevice {
                id: Some(sid),
                ipv6,
                last_update,
                state_types,
                ..
            }) => Some(Sensor {
                id: parse_id(&sid)?,
                ip: ipv6,
                last_update,
                state_types: flatten(state_types),
            }),
            _ => None,
        };

        let mut valves = Vec::new();
        for slot in raw.valves.into_values() {
            let Some(data) = slot.valve_data else { continue };
            let Some(vid) = data.id.filter(|v| !v.is_empty()) else {
                continue;
            };
            valves.push(Valve {
                id: parse_id(&vid)?,
                ip: data.ipv6,
                last_update: data.last_update,
                hardware_revision: data.hardware_revision,
                channel: slot.channel,
                state_types: flatten(data.state_types),
            });
        }

        Ok(Self {
            id,
            name: raw.name,
            state_types: flatten(raw.state_types),
            params: raw.params,
            sensor,
            valves,
        })
    }

    /// Updates describing the circuit as listed, for seeding consumers
    /// before the first notification arrives. Absent values are skipped.
    pub fn initial_updates(&self) -> Vec<StateUpdate> {
        let mut updates = Vec::new();
        let mut push = |id: &DeviceId, st: StateType, raw: Option<&Value>| {
            if let Some(raw) = raw.filter(|v| !v.is_null()) {
                updates.push(StateUpdate::coerced(id.clone(), st, raw));
            }
        };

        push(&self.id, StateType::AutomaticMode, self.params.get("automaticMode"));
        push(&self.id, StateType::ValveStaggering, self.params.get("valveStaggering"));

        if let Some(sensor) = &self.sensor {
            for st in [
                StateType::Moisture,
                StateType::Temperature,
                StateType::Brightness,
                StateType::SolarVoltage,
            ] {
                let raw = sensor.state_types.get(&st);
                push(&sensor.id, st, raw);
            }
            push(&sensor.id, StateType::LastUpdate, Some(&sensor.last_update));
        }

        for valve in &self.valves {
            let raw = valve.state_types.get(&StateType::SolarVoltage);
            push(&valve.id, StateType::SolarVoltage, raw);
            push(&valve.id, StateType::LastUpdate, Some(&valve.last_update));
        }

        updates
    }
}

fn take_params(body: Value) -> Result<Value, TopologyError> {
    match body {
        Value::Object(mut map) => map
            .remove("params")
            .ok_or(TopologyError::MissingField("params")),
        _ => Err(TopologyError::MissingField("params")),
    }
}

fn parse_id(raw: &str) -> Result<DeviceId, TopologyError> {
    raw.parse()
        .map_err(|_| TopologyError::InvalidId(raw.to_string()))
}

fn flatten(raw: BTreeMap<String, RawStateType>) -> BTreeMap<StateType, Value> {
    raw.into_values()
        .filter_map(|st| Some((StateType::from(st.state_type?), st.value)))
        .collect()
}

#[derive(Deserialize)]
struct CircuitsParams {
    circuits: Option<BTreeMap<String, RawCircuit>>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawCircuit {
    name: Option<String>,
    state_types: BTreeMap<String, RawStateType>,
    params: Map<String, Value>,
    sensor_data: Option<RawDevice>,
    valves: BTreeMap<String, RawValve>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawStateType {
    #[serde(rename = "type")]
    state_type: Option<String>,
    value: Value,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawDevice {
    id: Option<String>,
    ipv6: Option<String>,
    last_update: Value,
    hardware_revision: Value,
    state_types: BTreeMap<String, RawStateType>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawValve {
    channel: Value,
    valve_data: Option<RawDevice>,
}

/// A bootstrap response that cannot describe the Cube.
#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    #[error("response is missing `{0}`")]
    MissingField(&'static str),
    #[error("invalid device id: {0:?}")]
    InvalidId(String),
    #[error("unexpected response shape: {0}")]
    Decode(#[source] serde_json::Error),
}
