//! Value conversion between attribute types.

use thiserror::Error;

use crate::object::{Value, ValueType};

/// A value that cannot be represented in the requested type.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("cannot convert {value:?} ({}) to {target}", .value.value_type())]
pub struct CoercionError {
    pub value: Value,
    pub target: ValueType,
}

/// Convert `value` to `target`.
///
/// Numbers widen and narrow (doubles round half away from zero), booleans
/// map to 1/0, and strings parse after trimming. Anything that would lose
/// the value entirely (non-numeric text, non-finite or out-of-range
/// doubles) is an error.
pub fn coerce(value: Value, target: ValueType) -> Result<Value, CoercionError> {
    if value.value_type() == target {
        return Ok(value);
    }

    let converted = match (&value, target) {
        (Value::Int(i), ValueType::Double) => Some(Value::Double(*i as f64)),
        (Value::Int(i), ValueType::Bool) => Some(Value::Bool(*i != 0)),
        (Value::Int(i), ValueType::String) => Some(Value::String(i.to_string())),

        (Value::Double(d), ValueType::Int) => double_to_int(*d).map(Value::Int),
        (Value::Double(d), ValueType::Bool) => Some(Value::Bool(*d != 0.0)),
        (Value::Double(d), ValueType::String) => Some(Value::String(d.to_string())),

        (Value::Bool(b), ValueType::Int) => Some(Value::Int(i64::from(*b))),
        (Value::Bool(b), ValueType::Double) => Some(Value::Double(if *b { 1.0 } else { 0.0 })),
        (Value::Bool(b), ValueType::String) => Some(Value::String(b.to_string())),

        (Value::String(s), ValueType::Int) => string_to_int(s).map(Value::Int),
        (Value::String(s), ValueType::Double) => s.trim().parse::<f64>().ok().map(Value::Double),
        (Value::String(s), ValueType::Bool) => string_to_bool(s).map(Value::Bool),

        _ => None,
    };

    converted.ok_or(CoercionError { value, target })
}

fn double_to_int(d: f64) -> Option<i64> {
    let rounded = d.round();
    // i64::MAX as f64 rounds up to 2^63, which is already out of range.
    if rounded.is_finite() && rounded >= i64::MIN as f64 && rounded < i64::MAX as f64 {
        Some(rounded as i64)
    } else {
        None
    }
}

fn string_to_int(s: &str) -> Option<i64> {
    let s = s.trim();
    s.parse::<i64>()
        .ok()
        .or_else(|| s.parse::<f64>().ok().and_then(double_to_int))
}

fn string_to_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" | "" => Some(false),
        _ => None,
    }
}
