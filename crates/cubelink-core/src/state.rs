//! State vocabulary and the normalized update record.

use crate::DeviceId;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::fmt;

/// Attribute names the Cube reports for circuits, sensors, and valves.
///
/// Names the bridge does not know are kept verbatim in [`StateType::Other`]
/// so new firmware attributes still flow through.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(into = "String")]
pub enum StateType {
    Moisture,
    Temperature,
    Brightness,
    SolarVoltage,
    LastUpdate,
    AutomaticMode,
    ValveStaggering,
    IrrigationWasStarted,
    ValveStatus,
    Valve2Status,
    Duration,
    Other(String),
}

impl StateType {
    /// The appliance's camelCase name.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Moisture => "moisture",
            Self::Temperature => "temperature",
            Self::Brightness => "brightness",
            Self::SolarVoltage => "solarVoltage",
            Self::LastUpdate => "lastUpdate",
            Self::AutomaticMode => "automaticMode",
            Self::ValveStaggering => "valveStaggering",
            Self::IrrigationWasStarted => "irrigationWasStarted",
            Self::ValveStatus => "valveStatus",
            Self::Valve2Status => "valve2Status",
            Self::Duration => "duration",
            Self::Other(name) => name,
        }
    }

    /// snake_case form of the name, e.g. `solar_voltage`, `valve2_status`.
    pub fn snake_name(&self) -> String {
        let name = self.as_str();
        let mut out = String::with_capacity(name.len() + 4);
        for (i, c) in name.chars().enumerate() {
            if c.is_ascii_uppercase() {
                if i > 0 {
                    out.push('_');
                }
                out.push(c.to_ascii_lowercase());
            } else {
                out.push(c);
            }
        }
        out
    }

    /// True for the attributes coerced to booleans.
    pub fn is_boolean(&self) -> bool {
        matches!(
            self,
            Self::IrrigationWasStarted
                | Self::ValveStatus
                | Self::Valve2Status
                | Self::AutomaticMode
                | Self::ValveStaggering
        )
    }
}

impl From<&str> for StateType {
    fn from(name: &str) -> Self {
        match name {
            "moisture" => Self::Moisture,
            "temperature" => Self::Temperature,
            "brightness" => Self::Brightness,
            "solarVoltage" => Self::SolarVoltage,
            "lastUpdate" => Self::LastUpdate,
            "automaticMode" => Self::AutomaticMode,
            "valveStaggering" => Self::ValveStaggering,
            "irrigationWasStarted" => Self::IrrigationWasStarted,
            "valveStatus" => Self::ValveStatus,
            "valve2Status" => Self::Valve2Status,
            "duration" => Self::Duration,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for StateType {
    fn from(name: String) -> Self {
        Self::from(name.as_str())
    }
}

impl From<StateType> for String {
    fn from(state_type: StateType) -> Self {
        match state_type {
            StateType::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for StateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A coerced attribute value.
///
/// `Null` is what a failed coercion produces; it is a value, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum StateValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Timestamp(DateTime<Utc>),
    /// Passthrough for attributes without a coercion rule.
    Raw(serde_json::Value),
}

impl StateValue {
    /// Whether coercion produced no value.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The boolean, if this is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The integer, if this is one.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// The number as a float, if this is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(n) => Some(*n),
            Self::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// The timestamp, if this is one.
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }
}

impl Serialize for StateValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(n) => serializer.serialize_i64(*n),
            Self::Float(n) => serializer.serialize_f64(*n),
            Self::Timestamp(ts) => ts.serialize(serializer),
            Self::Raw(value) => value.serialize(serializer),
        }
    }
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(n) => write!(f, "{n}"),
            Self::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
            Self::Raw(value) => write!(f, "{value}"),
        }
    }
}

/// One normalized change: `value` of `state_type` on `device_id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateUpdate {
    pub device_id: DeviceId,
    pub state_type: StateType,
    pub value: StateValue,
}

impl StateUpdate {
    /// Build an update, coercing `raw` by the rules for `state_type`.
    pub fn coerced(device_id: DeviceId, state_type: StateType, raw: &serde_json::Value) -> Self {
        let value = crate::coerce::coerce(&state_type, raw);
        Self {
            device_id,
            state_type,
            value,
        }
    }
}
