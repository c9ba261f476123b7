//! Value coercion by state type.
//!
//! The Cube sends most values as strings, some as numbers, and a few as
//! booleans, with no schema. Every rule here is total: input that does not
//! fit the target type yields [`StateValue::Null`].

use crate::{StateType, StateValue};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Coerce `raw` to the type `state_type` is reported in.
pub fn coerce(state_type: &StateType, raw: &Value) -> StateValue {
    match state_type {
        StateType::LastUpdate => timestamp(raw).map_or(StateValue::Null, StateValue::Timestamp),
        st if st.is_boolean() => StateValue::Bool(boolean(raw)),
        StateType::SolarVoltage => float(raw).map_or(StateValue::Null, StateValue::Float),
        StateType::Moisture | StateType::Brightness | StateType::Temperature | StateType::Duration => {
            integer(raw).map_or(StateValue::Null, StateValue::Int)
        }
        _ => match raw {
            Value::Null => StateValue::Null,
            other => StateValue::Raw(other.clone()),
        },
    }
}

/// `"true"`, `"1"`, `"yes"` in any case are true, every other string is
/// false. Non-strings use truthiness: null, `false`, zero, and empty
/// containers are false.
pub fn boolean(raw: &Value) -> bool {
    match raw {
        Value::String(s) => {
            let s = s.to_ascii_lowercase();
            matches!(s.as_str(), "true" | "1" | "yes")
        }
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Finite floating point from a number, numeric string, or boolean.
pub fn float(raw: &Value) -> Option<f64> {
    let f = match raw {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        Value::Bool(b) => f64::from(u8::from(*b)),
        _ => return None,
    };
    f.is_finite().then_some(f)
}

/// Integer from an integral number, an integer string, a boolean, or a
/// float (truncated toward zero). Decimal strings like `"4.2"` are rejected.
pub fn integer(raw: &Value) -> Option<i64> {
    match raw {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Some(i);
            }
            let f = n.as_f64()?;
            truncate(f)
        }
        Value::String(s) => s.trim().parse::<i64>().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

fn truncate(f: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if !f.is_finite() {
        return None;
    }
    let t = f.trunc();
    (t >= -LIMIT && t < LIMIT).then_some(t as i64)
}

/// UTC timestamp from epoch seconds, given as a number or numeric string.
/// Fractional seconds are kept to nanosecond precision.
pub fn timestamp(raw: &Value) -> Option<DateTime<Utc>> {
    let secs = float(raw)?;
    let whole = secs.floor();
    let whole_i = truncate(whole)?;
    let nanos = ((secs - whole) * 1e9).round();
    // Rounding can carry a full second.
    let (whole_i, nanos) = if nanos >= 1e9 {
        (whole_i.checked_add(1)?, 0)
    } else {
        (whole_i, nanos as u32)
    };
    DateTime::from_timestamp(whole_i, nanos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn c(state_type: &str, raw: Value) -> StateValue {
        coerce(&StateType::from(state_type), &raw)
    }

    #[test]
    fn integers() {
        assert_eq!(c("moisture", json!("42")), StateValue::Int(42));
        assert_eq!(c("moisture", json!(" 42 ")), StateValue::Int(42));
        assert_eq!(c("brightness", json!(1200)), StateValue::Int(1200));
        assert_eq!(c("temperature", json!(-3)), StateValue::Int(-3));
        assert_eq!(c("duration", json!(7.9)), StateValue::Int(7));
        assert_eq!(c("moisture", json!("abc")), StateValue::Null);
        assert_eq!(c("moisture", json!("4.2")), StateValue::Null);
        assert_eq!(c("moisture", json!(null)), StateValue::Null);
        assert_eq!(c("moisture", json!([1])), StateValue::Null);
        assert_eq!(c("moisture", json!(1e300)), StateValue::Null);
        assert_eq!(c("moisture", json!("99999999999999999999")), StateValue::Null);
    }

    #[test]
    fn floats() {
        assert_eq!(c("solarVoltage", json!("3.3")), StateValue::Float(3.3));
        assert_eq!(c("solarVoltage", json!(2)), StateValue::Float(2.0));
        assert_eq!(c("solarVoltage", json!("volts")), StateValue::Null);
        assert_eq!(c("solarVoltage", json!("NaN")), StateValue::Null);
        assert_eq!(c("solarVoltage", json!({})), StateValue::Null);
    }

    #[test]
    fn booleans_from_strings() {
        for s in ["true", "True", "TRUE", "1", "yes", "Yes"] {
            assert_eq!(c("automaticMode", json!(s)), StateValue::Bool(true), "{s}");
        }
        for s in ["false", "0", "no", "", "on", "None", " true"] {
            assert_eq!(c("valveStatus", json!(s)), StateValue::Bool(false), "{s}");
        }
    }

    #[test]
    fn booleans_from_other_values() {
        assert_eq!(c("valve2Status", json!(true)), StateValue::Bool(true));
        assert_eq!(c("valve2Status", json!(false)), StateValue::Bool(false));
        assert_eq!(c("irrigationWasStarted", json!(1)), StateValue::Bool(true));
        assert_eq!(c("irrigationWasStarted", json!(0)), StateValue::Bool(false));
        assert_eq!(c("valveStaggering", json!(null)), StateValue::Bool(false));
        assert_eq!(c("valveStaggering", json!([])), StateValue::Bool(false));
        assert_eq!(c("valveStaggering", json!({"a": 1})), StateValue::Bool(true));
    }

    #[test]
    fn timestamps() {
        let expected = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        assert_eq!(c("lastUpdate", json!("1700000000")), StateValue::Timestamp(expected));
        assert_eq!(c("lastUpdate", json!(1_700_000_000)), StateValue::Timestamp(expected));
        let half = Utc.timestamp_opt(1_700_000_000, 500_000_000).unwrap();
        assert_eq!(c("lastUpdate", json!(1_700_000_000.5)), StateValue::Timestamp(half));
        assert_eq!(c("lastUpdate", json!("yesterday")), StateValue::Null);
        assert_eq!(c("lastUpdate", json!(null)), StateValue::Null);
        assert_eq!(c("lastUpdate", json!(1e300)), StateValue::Null);
    }

    #[test]
    fn unknown_types_pass_through() {
        assert_eq!(c("circuitName", json!("Lawn")), StateValue::Raw(json!("Lawn")));
        assert_eq!(c("firmware", json!({"v": 2})), StateValue::Raw(json!({"v": 2})));
        assert_eq!(c("firmware", json!(null)), StateValue::Null);
    }

    #[test]
    fn total_over_vocabulary() {
        let inputs = [
            json!(null),
            json!(""),
            json!("abc"),
            json!("-1"),
            json!(-1),
            json!(1.5),
            json!(f64::MAX),
            json!(i64::MIN),
            json!(u64::MAX),
            json!(true),
            json!([1, 2]),
            json!({"k": "v"}),
        ];
        let types = [
            "moisture",
            "temperature",
            "brightness",
            "solarVoltage",
            "lastUpdate",
            "automaticMode",
            "valveStaggering",
            "irrigationWasStarted",
            "valveStatus",
            "valve2Status",
            "duration",
        ];
        for st in types {
            let st = StateType::from(st);
            for raw in &inputs {
                let value = coerce(&st, raw);
                match (&st, &value) {
                    (_, StateValue::Null) => {}
                    (StateType::LastUpdate, StateValue::Timestamp(_)) => {}
                    (StateType::SolarVoltage, StateValue::Float(f)) => assert!(f.is_finite()),
                    (s, StateValue::Bool(_)) if s.is_boolean() => {}
                    (
                        StateType::Moisture
                        | StateType::Temperature
                        | StateType::Brightness
                        | StateType::Duration,
                        StateValue::Int(_),
                    ) => {}
                    other => panic!("unexpected coercion {other:?} for {raw}"),
                }
            }
        }
    }
}
