//! Notification normalization.
//!
//! Inbound frames are JSON objects. Those carrying a `notification`
//! discriminator describe a state change; each recognized discriminator has
//! its own `params` schema, decoded strictly. A frame whose `params` do not
//! match its schema produces no updates at all rather than a partial set.

use crate::{DeviceId, StateType, StateUpdate};
use serde::Deserialize;
use serde_json::{Map, Value};

/// A decoded inbound frame, before normalization.
pub type RawFrame = Map<String, Value>;

/// Decode one text or binary frame body.
pub fn decode_frame(body: &[u8]) -> Result<RawFrame, FrameError> {
    match serde_json::from_slice::<Value>(body)? {
        Value::Object(map) => Ok(map),
        other => Err(FrameError::NotAnObject(json_kind(&other))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A frame that could not be decoded at all.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("frame is a JSON {0}, expected an object")]
    NotAnObject(&'static str),
}

/// A recognized notification whose params did not match its schema.
#[derive(Debug, thiserror::Error)]
#[error("malformed {notification} params: {source}")]
pub struct NormalizeError {
    pub notification: &'static str,
    #[source]
    pub source: serde_json::Error,
}

/// Notifications the bridge understands, decoded from a frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    DeviceStateChanged(StateChanged),
    DeviceUpdated(DeviceUpdated),
    CircuitStateChanged(StateChanged),
    CircuitEdited(CircuitEdited),
}

impl Notification {
    pub const DEVICE_STATE_CHANGED: &'static str = "Device.stateChanged";
    pub const DEVICE_UPDATED: &'static str = "Device.updated";
    pub const CIRCUIT_STATE_CHANGED: &'static str = "Circuit.stateChanged";
    pub const CIRCUIT_EDITED: &'static str = "Circuit.edited";

    /// Decode the notification carried by `frame`.
    ///
    /// Returns `Ok(None)` for frames without a `notification` string and for
    /// discriminators the bridge does not handle.
    pub fn from_frame(frame: &RawFrame) -> Result<Option<Self>, NormalizeError> {
        let Some(kind) = frame.get("notification").and_then(Value::as_str) else {
            return Ok(None);
        };
        let params = frame.get("params").cloned().unwrap_or(Value::Null);

        let notification = match kind {
            Self::DEVICE_STATE_CHANGED => Self::DeviceStateChanged(
                params_of::<DeviceStateParams>(Self::DEVICE_STATE_CHANGED, params)?.into(),
            ),
            Self::DEVICE_UPDATED => {
                Self::DeviceUpdated(params_of(Self::DEVICE_UPDATED, params)?)
            }
            Self::CIRCUIT_STATE_CHANGED => Self::CircuitStateChanged(
                params_of::<CircuitStateParams>(Self::CIRCUIT_STATE_CHANGED, params)?.into(),
            ),
            Self::CIRCUIT_EDITED => Self::CircuitEdited(params_of(Self::CIRCUIT_EDITED, params)?),
            _ => return Ok(None),
        };
        Ok(Some(notification))
    }

    /// The updates this notification implies, in order.
    pub fn into_updates(self) -> Vec<StateUpdate> {
        match self {
            Self::DeviceStateChanged(change) | Self::CircuitStateChanged(change) => {
                vec![StateUpdate::coerced(change.id, change.state_type, &change.value)]
            }
            Self::DeviceUpdated(updated) => vec![StateUpdate::coerced(
                updated.id,
                StateType::LastUpdate,
                &updated.last_update,
            )],
            Self::CircuitEdited(CircuitEdited { circuit }) => {
                let CircuitSettings {
                    automatic_mode,
                    valve_staggering,
                } = circuit.params;
                vec![
                    StateUpdate::coerced(
                        circuit.id.clone(),
                        StateType::AutomaticMode,
                        &setting_text(&automatic_mode),
                    ),
                    StateUpdate::coerced(
                        circuit.id,
                        StateType::ValveStaggering,
                        &setting_text(&valve_staggering),
                    ),
                ]
            }
        }
    }
}

/// Edited circuit settings are compared as text: only the strings `true`,
/// `1` and `yes` (any case) enable a setting. `1.0`, arrays and objects do not.
fn setting_text(value: &Value) -> Value {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Null => "None".to_string(),
        other => other.to_string(),
    };
    Value::String(text)
}

fn params_of<T: for<'de> Deserialize<'de>>(
    notification: &'static str,
    params: Value,
) -> Result<T, NormalizeError> {
    serde_json::from_value(params).map_err(|source| NormalizeError {
        notification,
        source,
    })
}

/// `value` of `state_type` changed on a device or circuit.
#[derive(Debug, Clone, PartialEq)]
pub struct StateChanged {
    pub id: DeviceId,
    pub state_type: StateType,
    pub value: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeviceStateParams {
    device_id: DeviceId,
    #[serde(rename = "type")]
    state_type: String,
    #[serde(default)]
    value: Value,
}

impl From<DeviceStateParams> for StateChanged {
    fn from(p: DeviceStateParams) -> Self {
        Self {
            id: p.device_id,
            state_type: p.state_type.into(),
            value: p.value,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CircuitStateParams {
    circuit_id: DeviceId,
    #[serde(rename = "type")]
    state_type: String,
    #[serde(default)]
    value: Value,
}

impl From<CircuitStateParams> for StateChanged {
    fn from(p: CircuitStateParams) -> Self {
        Self {
            id: p.circuit_id,
            state_type: p.state_type.into(),
            value: p.value,
        }
    }
}

/// A device checked in; `last_update` is raw epoch seconds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceUpdated {
    pub id: DeviceId,
    #[serde(default)]
    pub last_update: Value,
}

/// A circuit's settings were edited.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CircuitEdited {
    pub circuit: EditedCircuit,
}

/// The circuit named in a `Circuit.edited` notification.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EditedCircuit {
    pub id: DeviceId,
    #[serde(default)]
    pub params: CircuitSettings,
}

/// Settings carried by an edited circuit, as sent.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitSettings {
    #[serde(default)]
    pub automatic_mode: Value,
    #[serde(default)]
    pub valve_staggering: Value,
}

/// Normalize a frame, reporting schema mismatches.
///
/// Frames without a recognized discriminator give `Ok(vec![])`.
pub fn try_normalize(frame: &RawFrame) -> Result<Vec<StateUpdate>, NormalizeError> {
    Ok(Notification::from_frame(frame)?
        .map(Notification::into_updates)
        .unwrap_or_default())
}

/// Normalize a frame; anything unusable yields no updates.
pub fn normalize(frame: &RawFrame) -> Vec<StateUpdate> {
    try_normalize(frame).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StateValue;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn frame(value: Value) -> RawFrame {
        match value {
            Value::Object(map) => map,
            _ => panic!("test frame must be an object"),
        }
    }

    #[test]
    fn circuit_state_changed() {
        let f = frame(json!({
            "notification": "Circuit.stateChanged",
            "params": {"circuitId": "{abc-1}", "type": "moisture", "value": "42"}
        }));
        let updates = normalize(&f);
        assert_eq!(
            serde_json::to_value(&updates).unwrap(),
            json!([{"device_id": "abc-1", "state_type": "moisture", "value": 42}])
        );
    }

    #[test]
    fn circuit_edited_yields_two_records() {
        let f = frame(json!({
            "notification": "Circuit.edited",
            "params": {"circuit": {"id": "{xyz}", "params": {"automaticMode": "True", "valveStaggering": "false"}}}
        }));
        assert_eq!(
            serde_json::to_value(normalize(&f)).unwrap(),
            json!([
                {"device_id": "xyz", "state_type": "automaticMode", "value": true},
                {"device_id": "xyz", "state_type": "valveStaggering", "value": false}
            ])
        );
    }

    #[test]
    fn circuit_edited_settings_compare_as_text() {
        let edited = |automatic: Value, staggering: Value| {
            let f = frame(json!({
                "notification": "Circuit.edited",
                "params": {"circuit": {"id": "{c}", "params": {
                    "automaticMode": automatic,
                    "valveStaggering": staggering
                }}}
            }));
            let updates = normalize(&f);
            (updates[0].value.clone(), updates[1].value.clone())
        };
        let on = StateValue::Bool(true);
        let off = StateValue::Bool(false);

        assert_eq!(edited(json!(true), json!(false)), (on.clone(), off.clone()));
        assert_eq!(edited(json!(1), json!("YES")), (on.clone(), on.clone()));
        assert_eq!(edited(json!(1.0), json!([1])), (off.clone(), off.clone()));
        assert_eq!(edited(json!(2), json!({"a": 1})), (off.clone(), off));
    }

    #[test]
    fn circuit_edited_without_settings() {
        let f = frame(json!({
            "notification": "Circuit.edited",
            "params": {"circuit": {"id": "{xyz}"}}
        }));
        let updates = normalize(&f);
        assert_eq!(updates.len(), 2);
        assert!(updates.iter().all(|u| u.value == StateValue::Bool(false)));
    }

    #[test]
    fn device_updated() {
        let f = frame(json!({
            "notification": "Device.updated",
            "params": {"id": "{d1}", "lastUpdate": "1700000000"}
        }));
        let updates = normalize(&f);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].device_id, "d1");
        assert_eq!(updates[0].state_type, StateType::LastUpdate);
        assert_eq!(
            updates[0].value,
            StateValue::Timestamp(Utc.timestamp_opt(1_700_000_000, 0).unwrap())
        );
    }

    #[test]
    fn device_state_changed() {
        let f = frame(json!({
            "notification": "Device.stateChanged",
            "params": {"deviceId": "{v-9}", "type": "valveStatus", "value": "yes"}
        }));
        assert_eq!(
            normalize(&f),
            vec![StateUpdate {
                device_id: DeviceId::canonical("v-9"),
                state_type: StateType::ValveStatus,
                value: StateValue::Bool(true),
            }]
        );
    }

    #[test]
    fn passthrough_state_type() {
        let f = frame(json!({
            "notification": "Device.stateChanged",
            "params": {"deviceId": "d", "type": "signalStrength", "value": "-71dBm"}
        }));
        let updates = normalize(&f);
        assert_eq!(updates[0].state_type, StateType::Other("signalStrength".into()));
        assert_eq!(updates[0].value, StateValue::Raw(json!("-71dBm")));
    }

    #[test]
    fn unrecognized_or_missing_discriminator() {
        for f in [
            json!({"notification": "System.rebooted", "params": {}}),
            json!({"id": 1, "status": "success"}),
            json!({"notification": 5}),
            json!({}),
        ] {
            assert_eq!(try_normalize(&frame(f)).unwrap(), vec![]);
        }
    }

    #[test]
    fn shape_mismatch_fails_closed() {
        for f in [
            json!({"notification": "Circuit.stateChanged", "params": {"type": "moisture", "value": "1"}}),
            json!({"notification": "Circuit.stateChanged", "params": {"circuitId": 7, "type": "moisture"}}),
            json!({"notification": "Device.updated"}),
            json!({"notification": "Circuit.edited", "params": {"circuit": {"params": {}}}}),
            json!({"notification": "Device.stateChanged", "params": "oops"}),
        ] {
            let f = frame(f);
            assert!(try_normalize(&f).is_err());
            assert!(normalize(&f).is_empty());
        }
    }

    #[test]
    fn normalizing_twice_is_identical() {
        let f = frame(json!({
            "notification": "Circuit.edited",
            "params": {"circuit": {"id": "{c}", "params": {"automaticMode": true, "valveStaggering": 1}}}
        }));
        assert_eq!(normalize(&f), normalize(&f));
    }

    #[test]
    fn decode_rejects_non_objects() {
        assert!(matches!(decode_frame(b"[1,2]"), Err(FrameError::NotAnObject("array"))));
        assert!(matches!(decode_frame(b"{not json"), Err(FrameError::Json(_))));
        assert!(decode_frame(br#"{"notification":"x"}"#).is_ok());
    }
}
