//! Arithmetic, comparison, bitwise and logical operators on runtime values

use super::error::RuntimeError;
use super::value::Value;
use crate::ast::{BinaryOp, UnaryOp};
use std::cmp::Ordering;
use std::rc::Rc;

/// Clamp an `Int64` into the `Int32` range
pub fn saturate(n: i64) -> i32 {
    n.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// Truncate a float toward zero into the `Int32` range. Out-of-range values
/// saturate at the range ends and NaN becomes 0.
pub fn truncate_to_int32(x: f64) -> i32 {
    x.trunc() as i32
}

/// A numeric operand; promotion order is I32 < I64 < F32 < F64
#[derive(Debug, Clone, Copy)]
enum Num {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl Num {
    fn of(value: &Value) -> Option<Num> {
        match value {
            Value::Int32(n) => Some(Num::I32(*n)),
            Value::Int64(n) => Some(Num::I64(*n)),
            Value::Float(x) => Some(Num::F32(*x)),
            Value::Double(x) => Some(Num::F64(*x)),
            _ => None,
        }
    }

    fn rank(self) -> u8 {
        match self {
            Num::I32(_) => 0,
            Num::I64(_) => 1,
            Num::F32(_) => 2,
            Num::F64(_) => 3,
        }
    }

    fn to_rank(self, rank: u8) -> Num {
        let as_f64 = match self {
            Num::I32(n) => f64::from(n),
            Num::I64(n) => n as f64,
            Num::F32(x) => f64::from(x),
            Num::F64(x) => x,
        };
        match (rank, self) {
            (0, n) => n,
            (1, Num::I32(n)) => Num::I64(i64::from(n)),
            (1, n) => n,
            (2, Num::F64(x)) => Num::F64(x),
            (2, Num::F32(x)) => Num::F32(x),
            (2, Num::I64(n)) => Num::F32(n as f32),
            (2, Num::I32(n)) => Num::F32(n as f32),
            _ => Num::F64(as_f64),
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Num::I32(n) => f64::from(n),
            Num::I64(n) => n as f64,
            Num::F32(x) => f64::from(x),
            Num::F64(x) => x,
        }
    }

    fn is_zero(self) -> bool {
        self.as_f64() == 0.0
    }

    fn into_value(self) -> Value {
        match self {
            Num::I32(n) => Value::Int32(n),
            Num::I64(n) => Value::Int64(n),
            Num::F32(x) => Value::Float(x),
            Num::F64(x) => Value::Double(x),
        }
    }
}

/// Both operands at the higher of their two ranks
fn promote(a: Num, b: Num) -> (Num, Num) {
    let rank = a.rank().max(b.rank());
    (a.to_rank(rank), b.to_rank(rank))
}

fn mismatch(op: impl std::fmt::Display, left: &Value, right: &Value) -> RuntimeError {
    RuntimeError::type_mismatch(&format!(
        "Operator \"{op}\" can't be applied to \"{}\" and \"{}\".",
        left.kind(),
        right.kind()
    ))
}

/// Apply a binary operator. `and`/`or` here are the non-short-circuit forms;
/// the evaluator short-circuits boolean operands before calling this.
pub fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    if matches!(left, Value::Uninitialized) || matches!(right, Value::Uninitialized) {
        return Err(RuntimeError::uninitialized());
    }
    match op {
        BinaryOp::Add => {
            if let (Value::String(a), Value::String(b)) = (left, right) {
                let mut joined = String::with_capacity(a.len() + b.len());
                joined.push_str(a);
                joined.push_str(b);
                return Ok(Value::String(Rc::from(joined)));
            }
            arithmetic(op, left, right)
        }
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::IntDiv | BinaryOp::Mod | BinaryOp::Pow => {
            arithmetic(op, left, right)
        }
        BinaryOp::LeftShift | BinaryOp::RightShift => shift(op, left, right),
        BinaryOp::Eq | BinaryOp::NotEq => equality(op, left, right),
        BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => compare(op, left, right),
        BinaryOp::And | BinaryOp::Or => logical(op, left, right),
    }
}

fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    let (Some(a), Some(b)) = (Num::of(left), Num::of(right)) else {
        return Err(mismatch(op, left, right));
    };
    let (a, b) = promote(a, b);
    let result = match op {
        BinaryOp::Add => match (a, b) {
            (Num::I32(x), Num::I32(y)) => Num::I32(x.wrapping_add(y)),
            (Num::I64(x), Num::I64(y)) => Num::I64(x.wrapping_add(y)),
            (Num::F32(x), Num::F32(y)) => Num::F32(x + y),
            _ => Num::F64(a.as_f64() + b.as_f64()),
        },
        BinaryOp::Sub => match (a, b) {
            (Num::I32(x), Num::I32(y)) => Num::I32(x.wrapping_sub(y)),
            (Num::I64(x), Num::I64(y)) => Num::I64(x.wrapping_sub(y)),
            (Num::F32(x), Num::F32(y)) => Num::F32(x - y),
            _ => Num::F64(a.as_f64() - b.as_f64()),
        },
        BinaryOp::Mul => match (a, b) {
            (Num::I32(x), Num::I32(y)) => Num::I32(x.wrapping_mul(y)),
            (Num::I64(x), Num::I64(y)) => Num::I64(x.wrapping_mul(y)),
            (Num::F32(x), Num::F32(y)) => Num::F32(x * y),
            _ => Num::F64(a.as_f64() * b.as_f64()),
        },
        BinaryOp::Div => match (a, b) {
            (Num::I32(_) | Num::I64(_), _) if b.is_zero() => {
                return Err(RuntimeError::divide_by_zero());
            }
            (Num::I32(x), Num::I32(y)) => Num::F32(x as f32 / y as f32),
            (Num::I64(x), Num::I64(y)) => Num::F64(x as f64 / y as f64),
            (Num::F32(x), Num::F32(y)) => Num::F32(x / y),
            _ => Num::F64(a.as_f64() / b.as_f64()),
        },
        BinaryOp::IntDiv => {
            if b.is_zero() {
                return Err(RuntimeError::divide_by_zero());
            }
            match (a, b) {
                (Num::I32(x), Num::I32(y)) => Num::I32(x.wrapping_div(y)),
                (Num::I64(x), Num::I64(y)) => Num::I64(x.wrapping_div(y)),
                _ => Num::I32(truncate_to_int32(a.as_f64() / b.as_f64())),
            }
        }
        BinaryOp::Mod => match (a, b) {
            (Num::I32(_) | Num::I64(_), _) if b.is_zero() => {
                return Err(RuntimeError::divide_by_zero());
            }
            (Num::I32(x), Num::I32(y)) => Num::I32(x.wrapping_rem(y)),
            (Num::I64(x), Num::I64(y)) => Num::I64(x.wrapping_rem(y)),
            (Num::F32(x), Num::F32(y)) => Num::F32(x % y),
            _ => Num::F64(a.as_f64() % b.as_f64()),
        },
        BinaryOp::Pow => {
            let raised = a.as_f64().powf(b.as_f64());
            match a {
                Num::F64(_) | Num::I64(_) => Num::F64(raised),
                _ => Num::F32(raised as f32),
            }
        }
        _ => return Err(mismatch(op, left, right)),
    };
    Ok(result.into_value())
}

fn shift(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    let Some(amount) = right.as_i64() else {
        return Err(mismatch(op, left, right));
    };
    let width = match left {
        Value::Int32(_) => 32,
        Value::Int64(_) => 64,
        _ => return Err(mismatch(op, left, right)),
    };
    if !(0..width).contains(&amount) {
        return Err(RuntimeError::bad_bit_shift());
    }
    let amount = amount as u32;
    Ok(match (left, op) {
        (Value::Int32(n), BinaryOp::LeftShift) => Value::Int32(n.wrapping_shl(amount)),
        (Value::Int32(n), _) => Value::Int32(n >> amount),
        (Value::Int64(n), BinaryOp::LeftShift) => Value::Int64(n.wrapping_shl(amount)),
        (Value::Int64(n), _) => Value::Int64(n >> amount),
        _ => return Err(mismatch(op, left, right)),
    })
}

fn ordering(op: BinaryOp, left: &Value, right: &Value) -> Result<Option<Ordering>, RuntimeError> {
    if let (Value::String(a), Value::String(b)) = (left, right) {
        return Ok(Some(a.cmp(b)));
    }
    let (Some(a), Some(b)) = (Num::of(left), Num::of(right)) else {
        return Err(mismatch(op, left, right));
    };
    let (a, b) = promote(a, b);
    Ok(match (a, b) {
        (Num::I32(x), Num::I32(y)) => Some(x.cmp(&y)),
        (Num::I64(x), Num::I64(y)) => Some(x.cmp(&y)),
        _ => a.as_f64().partial_cmp(&b.as_f64()),
    })
}

fn equality(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    let equal = match (left, right) {
        (Value::Invalid, Value::Invalid) => true,
        (Value::Invalid, _) | (_, Value::Invalid) => false,
        (Value::Boolean(a), Value::Boolean(b)) => a == b,
        (Value::Object(_) | Value::Interface(..), Value::Object(_) | Value::Interface(..))
        | (Value::Callable(_), Value::Callable(_)) => left == right,
        _ => ordering(op, left, right)? == Some(Ordering::Equal),
    };
    Ok(Value::Boolean(if op == BinaryOp::Eq { equal } else { !equal }))
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    let result = match ordering(op, left, right)? {
        None => false,
        Some(ord) => match op {
            BinaryOp::Lt => ord == Ordering::Less,
            BinaryOp::LtEq => ord != Ordering::Greater,
            BinaryOp::Gt => ord == Ordering::Greater,
            _ => ord != Ordering::Less,
        },
    };
    Ok(Value::Boolean(result))
}

fn logical(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    match (left, right) {
        (Value::Boolean(a), Value::Boolean(b)) => Ok(Value::Boolean(if op == BinaryOp::And {
            *a && *b
        } else {
            *a || *b
        })),
        (Value::Int32(a), Value::Int32(b)) => Ok(Value::Int32(if op == BinaryOp::And {
            a & b
        } else {
            a | b
        })),
        _ => match (left.as_i64(), right.as_i64()) {
            (Some(a), Some(b)) => Ok(Value::Int64(if op == BinaryOp::And { a & b } else { a | b })),
            _ => Err(mismatch(op, left, right)),
        },
    }
}

pub fn unary(op: UnaryOp, value: &Value) -> Result<Value, RuntimeError> {
    let fail = || {
        RuntimeError::type_mismatch(&format!(
            "Operator \"{op}\" can't be applied to \"{}\".",
            value.kind()
        ))
    };
    if matches!(value, Value::Uninitialized) {
        return Err(RuntimeError::uninitialized());
    }
    match (op, value) {
        (UnaryOp::Neg, Value::Int32(n)) => Ok(Value::Int32(n.wrapping_neg())),
        (UnaryOp::Neg, Value::Int64(n)) => Ok(Value::Int64(n.wrapping_neg())),
        (UnaryOp::Neg, Value::Float(x)) => Ok(Value::Float(-x)),
        (UnaryOp::Neg, Value::Double(x)) => Ok(Value::Double(-x)),
        (UnaryOp::Plus, v) if v.is_numeric() => Ok(v.clone()),
        (UnaryOp::Not, Value::Boolean(b)) => Ok(Value::Boolean(!b)),
        (UnaryOp::Not, Value::Int32(n)) => Ok(Value::Int32(!n)),
        (UnaryOp::Not, Value::Int64(n)) => Ok(Value::Int64(!n)),
        _ => Err(fail()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bin(op: BinaryOp, a: Value, b: Value) -> Value {
        binary(op, &a, &b).unwrap()
    }

    #[test]
    fn test_integer_arithmetic() {
        assert_eq!(bin(BinaryOp::Add, Value::Int32(1), Value::Int32(2)), Value::Int32(3));
        assert_eq!(bin(BinaryOp::Mul, Value::Int32(4), Value::Int32(5)), Value::Int32(20));
        assert_eq!(bin(BinaryOp::Sub, Value::Int32(i32::MIN), Value::Int32(1)), Value::Int32(i32::MAX));
    }

    #[test]
    fn test_promotion() {
        assert_eq!(bin(BinaryOp::Add, Value::Int32(1), Value::Int64(2)), Value::Int64(3));
        assert_eq!(bin(BinaryOp::Add, Value::Int64(1), Value::Float(0.5)), Value::Float(1.5));
        assert_eq!(bin(BinaryOp::Add, Value::Float(1.0), Value::Double(0.25)), Value::Double(1.25));
    }

    #[test]
    fn test_division_kinds() {
        assert_eq!(bin(BinaryOp::Div, Value::Int32(7), Value::Int32(2)), Value::Float(3.5));
        assert_eq!(bin(BinaryOp::Div, Value::Int64(7), Value::Int32(2)), Value::Double(3.5));
        assert_eq!(bin(BinaryOp::IntDiv, Value::Int32(7), Value::Int32(2)), Value::Int32(3));
        assert_eq!(bin(BinaryOp::IntDiv, Value::Int32(-7), Value::Int32(2)), Value::Int32(-3));
        assert_eq!(bin(BinaryOp::Mod, Value::Int32(7), Value::Int32(3)), Value::Int32(1));
    }

    #[test]
    fn test_float_integer_divide_truncates_and_saturates() {
        assert_eq!(bin(BinaryOp::IntDiv, Value::Float(7.5), Value::Int32(2)), Value::Int32(3));
        assert_eq!(bin(BinaryOp::IntDiv, Value::Double(-7.5), Value::Int32(2)), Value::Int32(-3));
        assert_eq!(bin(BinaryOp::IntDiv, Value::Double(1e20), Value::Int32(1)), Value::Int32(i32::MAX));
        assert_eq!(truncate_to_int32(f64::NAN), 0);
        assert_eq!(saturate(i64::MIN), i32::MIN);
    }

    #[test]
    fn test_divide_by_zero() {
        for op in [BinaryOp::Div, BinaryOp::IntDiv, BinaryOp::Mod] {
            let err = binary(op, &Value::Int32(1), &Value::Int32(0)).unwrap_err();
            assert_eq!(err.errno(), 20);
        }
    }

    #[test]
    fn test_string_concatenation_and_mismatch() {
        assert_eq!(bin(BinaryOp::Add, Value::string("ab"), Value::string("c")), Value::string("abc"));
        let err = binary(BinaryOp::Add, &Value::string("a"), &Value::Int32(1)).unwrap_err();
        assert_eq!(
            err.message,
            "Type Mismatch. Operator \"+\" can't be applied to \"String\" and \"Integer\"."
        );
    }

    #[test]
    fn test_shifts() {
        assert_eq!(bin(BinaryOp::LeftShift, Value::Int32(1), Value::Int32(4)), Value::Int32(16));
        assert_eq!(bin(BinaryOp::RightShift, Value::Int32(-16), Value::Int32(2)), Value::Int32(-4));
        let err = binary(BinaryOp::LeftShift, &Value::Int32(1), &Value::Int32(32)).unwrap_err();
        assert_eq!(err.errno(), 30);
        let err = binary(BinaryOp::RightShift, &Value::Int32(1), &Value::Int32(-1)).unwrap_err();
        assert_eq!(err.errno(), 30);
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(bin(BinaryOp::Lt, Value::Int32(1), Value::Double(1.5)), Value::Boolean(true));
        assert_eq!(bin(BinaryOp::GtEq, Value::string("b"), Value::string("a")), Value::Boolean(true));
        assert_eq!(bin(BinaryOp::Eq, Value::Int32(2), Value::Float(2.0)), Value::Boolean(true));
        assert_eq!(bin(BinaryOp::NotEq, Value::Boolean(true), Value::Boolean(false)), Value::Boolean(true));
        assert!(binary(BinaryOp::Lt, &Value::Boolean(true), &Value::Boolean(false)).is_err());
    }

    #[test]
    fn test_invalid_equality() {
        assert_eq!(bin(BinaryOp::Eq, Value::Invalid, Value::Invalid), Value::Boolean(true));
        assert_eq!(bin(BinaryOp::Eq, Value::Int32(0), Value::Invalid), Value::Boolean(false));
        assert_eq!(bin(BinaryOp::NotEq, Value::string(""), Value::Invalid), Value::Boolean(true));
    }

    #[test]
    fn test_logical_and_bitwise() {
        assert_eq!(bin(BinaryOp::And, Value::Boolean(true), Value::Boolean(false)), Value::Boolean(false));
        assert_eq!(bin(BinaryOp::Or, Value::Int32(0b1010), Value::Int32(0b0101)), Value::Int32(0b1111));
        assert_eq!(bin(BinaryOp::And, Value::Int64(6), Value::Int32(3)), Value::Int64(2));
        assert!(binary(BinaryOp::And, &Value::Boolean(true), &Value::Int32(1)).is_err());
    }

    #[test]
    fn test_pow() {
        assert_eq!(bin(BinaryOp::Pow, Value::Int32(2), Value::Int32(10)), Value::Float(1024.0));
        assert_eq!(bin(BinaryOp::Pow, Value::Double(2.0), Value::Int32(3)), Value::Double(8.0));
    }

    #[test]
    fn test_uninitialized_operand() {
        let err = binary(BinaryOp::Add, &Value::Uninitialized, &Value::Int32(1)).unwrap_err();
        assert_eq!(err.errno(), 233);
    }

    #[test]
    fn test_unary() {
        assert_eq!(unary(UnaryOp::Neg, &Value::Int32(5)).unwrap(), Value::Int32(-5));
        assert_eq!(unary(UnaryOp::Not, &Value::Boolean(true)).unwrap(), Value::Boolean(false));
        assert_eq!(unary(UnaryOp::Not, &Value::Int32(0)).unwrap(), Value::Int32(-1));
        let err = unary(UnaryOp::Neg, &Value::string("x")).unwrap_err();
        assert_eq!(err.message, "Type Mismatch. Operator \"-\" can't be applied to \"String\".");
    }
}
