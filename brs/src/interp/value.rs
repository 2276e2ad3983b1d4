//! Runtime values for the interpreter

use super::callable::Callable;
use super::component::{Interface, ObjRef};
use crate::ast::{Literal, ValueKind};
use std::fmt;
use std::rc::Rc;

/// Runtime value
#[derive(Clone)]
pub enum Value {
    Uninitialized,
    Invalid,
    Boolean(bool),
    String(Rc<str>),
    Int32(i32),
    Int64(i64),
    Float(f32),
    Double(f64),
    Callable(Rc<Callable>),
    /// Reference-counted component
    Object(ObjRef),
    /// A component viewed through one of its interfaces (`arr.ifArray`)
    Interface(ObjRef, &'static Interface),
}

impl Value {
    pub fn string(text: impl AsRef<str>) -> Value {
        Value::String(Rc::from(text.as_ref()))
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Uninitialized => ValueKind::Uninitialized,
            Value::Invalid => ValueKind::Invalid,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::String(_) => ValueKind::String,
            Value::Int32(_) => ValueKind::Int32,
            Value::Int64(_) => ValueKind::Int64,
            Value::Float(_) => ValueKind::Float,
            Value::Double(_) => ValueKind::Double,
            Value::Callable(_) => ValueKind::Callable,
            Value::Object(_) => ValueKind::Object,
            Value::Interface(..) => ValueKind::Interface,
        }
    }

    /// Name reported by `Type()`; components report their class name
    pub fn type_name(&self) -> String {
        match self {
            Value::Object(obj) => obj.name().to_string(),
            Value::Interface(_, iface) => iface.name.to_string(),
            other => other.kind().name().to_string(),
        }
    }

    /// Truth value for `if`/`while` conditions; `None` when not a condition
    pub fn as_condition(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            Value::Int32(n) => Some(*n != 0),
            Value::Int64(n) => Some(*n != 0),
            Value::Float(x) => Some(*x != 0.0),
            Value::Double(x) => Some(*x != 0.0),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjRef> {
        match self {
            Value::Object(obj) | Value::Interface(obj, _) => Some(obj),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integer value of any integer kind
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int32(n) => Some(i64::from(*n)),
            Value::Int64(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int32(n) => Some(f64::from(*n)),
            Value::Int64(n) => Some(*n as f64),
            Value::Float(x) => Some(f64::from(*x)),
            Value::Double(x) => Some(*x),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.kind().is_numeric()
    }

    /// Text as `print` writes it (numbers without the leading pad)
    pub fn to_print_string(&self) -> String {
        match self {
            Value::Uninitialized => "<uninitialized>".to_string(),
            Value::Invalid => "invalid".to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::String(s) => s.to_string(),
            Value::Int32(n) => n.to_string(),
            Value::Int64(n) => n.to_string(),
            Value::Float(x) => format_float(f64::from(*x)),
            Value::Double(x) => format_double(*x),
            Value::Callable(c) => c.to_string(),
            Value::Object(obj) => obj.to_display(),
            Value::Interface(_, iface) => format!("<Interface: {}>", iface.name),
        }
    }

    /// Text of a value nested inside a container display: strings are quoted
    /// and components are not expanded
    pub fn to_nested_string(&self) -> String {
        match self {
            Value::String(s) => format!("\"{s}\""),
            Value::Object(obj) => format!("<Component: {}>", obj.name()),
            other => other.to_print_string(),
        }
    }
}

impl From<&Literal> for Value {
    fn from(literal: &Literal) -> Self {
        match literal {
            Literal::Int32(n) => Value::Int32(*n),
            Literal::Int64(n) => Value::Int64(*n),
            Literal::Float(x) => Value::Float(*x),
            Literal::Double(x) => Value::Double(*x),
            Literal::Str(s) => Value::string(s),
            Literal::Bool(b) => Value::Boolean(*b),
            Literal::Invalid => Value::Invalid,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int32(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Uninitialized => write!(f, "Uninitialized"),
            Value::Invalid => write!(f, "Invalid"),
            Value::Boolean(b) => write!(f, "Boolean({b})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Int32(n) => write!(f, "Int32({n})"),
            Value::Int64(n) => write!(f, "Int64({n})"),
            Value::Float(x) => write!(f, "Float({x})"),
            Value::Double(x) => write!(f, "Double({x})"),
            Value::Callable(c) => write!(f, "Callable({})", c.name()),
            Value::Object(obj) => write!(f, "Object({})", obj.name()),
            Value::Interface(obj, iface) => write!(f, "Interface({}.{})", obj.name(), iface.name),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_print_string())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Uninitialized, Value::Uninitialized) => true,
            (Value::Invalid, Value::Invalid) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Int32(a), Value::Int32(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::Callable(a), Value::Callable(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Interface(a, i), Value::Interface(b, j)) => Rc::ptr_eq(a, b) && i.name == j.name,
            _ => false,
        }
    }
}

/// Single-precision text: six significant digits, `%g` style
pub fn format_float(x: f64) -> String {
    const PRECISION: i32 = 6;
    if x.is_nan() {
        return "nan".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if x == 0.0 {
        return "0".to_string();
    }
    let scientific = format!("{:.*e}", (PRECISION - 1) as usize, x);
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((&scientific, "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    if exponent < -4 || exponent >= PRECISION {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{}e{sign}{:02}",
            trim_fraction(mantissa),
            exponent.unsigned_abs()
        )
    } else {
        let decimals = (PRECISION - 1 - exponent).max(0) as usize;
        trim_fraction(&format!("{x:.decimals$}")).to_string()
    }
}

/// Double-precision text: shortest representation that round-trips
pub fn format_double(x: f64) -> String {
    if x.is_nan() {
        "nan".to_string()
    } else if x.is_infinite() {
        if x > 0.0 { "inf" } else { "-inf" }.to_string()
    } else {
        format!("{x}")
    }
}

fn trim_fraction(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_type_name() {
        assert_eq!(Value::Int32(1).kind(), ValueKind::Int32);
        assert_eq!(Value::Int64(1).type_name(), "LongInteger");
        assert_eq!(Value::Uninitialized.type_name(), "<uninitialized>");
        assert_eq!(Value::string("x").type_name(), "String");
    }

    #[test]
    fn test_print_strings() {
        assert_eq!(Value::Boolean(true).to_print_string(), "true");
        assert_eq!(Value::Invalid.to_print_string(), "invalid");
        assert_eq!(Value::Int32(-4).to_print_string(), "-4");
        assert_eq!(Value::string("hi").to_print_string(), "hi");
        assert_eq!(Value::string("hi").to_nested_string(), "\"hi\"");
    }

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(2.0), "2");
        assert_eq!(format_float(3.5), "3.5");
        assert_eq!(format_float(1.0 / 3.0), "0.333333");
        assert_eq!(format_float(1_000_000.0), "1e+06");
        assert_eq!(format_float(0.00001), "1e-05");
        assert_eq!(format_float(123456.0), "123456");
        assert_eq!(format_float(-0.5), "-0.5");
    }

    #[test]
    fn test_format_double() {
        assert_eq!(format_double(2.5), "2.5");
        assert_eq!(format_double(0.1), "0.1");
        assert_eq!(format_double(f64::NAN), "nan");
    }

    #[test]
    fn test_condition() {
        assert_eq!(Value::Boolean(false).as_condition(), Some(false));
        assert_eq!(Value::Int32(3).as_condition(), Some(true));
        assert_eq!(Value::string("true").as_condition(), None);
        assert_eq!(Value::Invalid.as_condition(), None);
    }

    #[test]
    fn test_equality() {
        assert_eq!(Value::string("a"), Value::string("a"));
        assert_ne!(Value::Int32(1), Value::Int64(1));
        assert_ne!(Value::Invalid, Value::Uninitialized);
    }

    #[test]
    fn test_from_literal() {
        assert_eq!(Value::from(&Literal::Int32(7)), Value::Int32(7));
        assert_eq!(Value::from(&Literal::Str("s".into())), Value::string("s"));
        assert_eq!(Value::from(&Literal::Invalid), Value::Invalid);
    }
}
