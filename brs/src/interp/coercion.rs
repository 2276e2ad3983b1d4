//! Conversion of values into declared types

use super::value::Value;
use crate::ast::ValueKind;

/// Convert `value` so it satisfies `kind`, or `None` when it cannot.
///
/// Numbers convert freely between the four numeric kinds: floating point
/// into integer truncates toward zero, wide integers wrap to 32 bits.
pub fn try_coerce(value: &Value, kind: ValueKind) -> Option<Value> {
    match kind {
        ValueKind::Dynamic => Some(value.clone()),
        _ if matches!(value, Value::Uninitialized) => None,
        ValueKind::Int32 => match value {
            Value::Int32(n) => Some(Value::Int32(*n)),
            Value::Int64(n) => Some(Value::Int32(*n as i32)),
            Value::Float(x) => Some(Value::Int32(x.trunc() as i32)),
            Value::Double(x) => Some(Value::Int32(x.trunc() as i32)),
            _ => None,
        },
        ValueKind::Int64 => match value {
            Value::Int32(n) => Some(Value::Int64(i64::from(*n))),
            Value::Int64(n) => Some(Value::Int64(*n)),
            Value::Float(x) => Some(Value::Int64(x.trunc() as i64)),
            Value::Double(x) => Some(Value::Int64(x.trunc() as i64)),
            _ => None,
        },
        ValueKind::Float => match value {
            Value::Int32(n) => Some(Value::Float(*n as f32)),
            Value::Int64(n) => Some(Value::Float(*n as f32)),
            Value::Float(x) => Some(Value::Float(*x)),
            Value::Double(x) => Some(Value::Float(*x as f32)),
            _ => None,
        },
        ValueKind::Double => match value {
            Value::Int32(n) => Some(Value::Double(f64::from(*n))),
            Value::Int64(n) => Some(Value::Double(*n as f64)),
            Value::Float(x) => Some(Value::Double(f64::from(*x))),
            Value::Double(x) => Some(Value::Double(*x)),
            _ => None,
        },
        ValueKind::Object => Some(value.clone()),
        ValueKind::Interface => match value {
            Value::Interface(..) | Value::Object(_) => Some(value.clone()),
            _ => None,
        },
        ValueKind::Callable => match value {
            Value::Callable(_) => Some(value.clone()),
            _ => None,
        },
        ValueKind::String | ValueKind::Boolean | ValueKind::Invalid => {
            (value.kind() == kind).then(|| value.clone())
        }
        ValueKind::Uninitialized | ValueKind::Void => None,
    }
}
