//! Built-in global functions

use super::Interpreter;
use super::callable::{Argument, Callable, Implementation, Signature, SignatureAndImpl};
use super::collections::create_object;
use super::env::Environment;
use super::error::{ErrorKind, InterpResult, RuntimeError};
use super::operators::{saturate, truncate_to_int32};
use super::value::{Value, format_float};
use crate::ast::{Expr, Expression, Literal, Location, Spanned, ValueKind};
use std::rc::Rc;

type NativeBody = fn(&mut Interpreter, &[Value]) -> InterpResult<Value>;

/// Bind every built-in into the Global tier of `env`
pub fn register_stdlib(env: &mut Environment) {
    let simple: &[(&str, &[(&str, ValueKind)], ValueKind, NativeBody)] = &[
        ("Type", &[("variable", ValueKind::Dynamic)], ValueKind::String, type_of),
        ("Str", &[("value", ValueKind::Float)], ValueKind::String, str_float),
        ("Int", &[("x", ValueKind::Dynamic)], ValueKind::Int32, int),
        ("Fix", &[("x", ValueKind::Dynamic)], ValueKind::Int32, fix),
        ("Abs", &[("x", ValueKind::Float)], ValueKind::Float, abs),
        ("Len", &[("s", ValueKind::String)], ValueKind::Int32, len),
        ("UCase", &[("s", ValueKind::String)], ValueKind::String, ucase),
        ("LCase", &[("s", ValueKind::String)], ValueKind::String, lcase),
        ("Left", &[("s", ValueKind::String), ("n", ValueKind::Int32)], ValueKind::String, left),
        ("Right", &[("s", ValueKind::String), ("n", ValueKind::Int32)], ValueKind::String, right),
        ("Chr", &[("ch", ValueKind::Int32)], ValueKind::String, chr),
        ("Asc", &[("letter", ValueKind::String)], ValueKind::Int32, asc),
        ("GetGlobalAA", &[], ValueKind::Dynamic, get_global_aa),
    ];
    for (name, args, returns, body) in simple {
        let args = args.iter().map(|(n, k)| Argument::new(*n, *k)).collect();
        define(env, Callable::native(name, Signature::new(args, *returns), *body));
    }

    define(
        env,
        Callable::variadic(
            "CreateObject",
            Signature::new(vec![Argument::new("objName", ValueKind::String)], ValueKind::Dynamic),
            create,
        ),
    );
    define(
        env,
        Callable::native(
            "StrI",
            Signature::new(
                vec![
                    Argument::new("value", ValueKind::Int32),
                    Argument::optional("radix", ValueKind::Int32, literal(Literal::Int32(10))),
                ],
                ValueKind::String,
            ),
            str_i,
        ),
    );
    define(
        env,
        Callable::native(
            "Val",
            Signature::new(
                vec![
                    Argument::new("s", ValueKind::String),
                    Argument::optional("radix", ValueKind::Int32, literal(Literal::Int32(0))),
                ],
                ValueKind::Dynamic,
            ),
            val,
        ),
    );
    let mid: Rc<dyn Fn(&mut Interpreter, &[Value]) -> InterpResult<Value>> = Rc::new(substring);
    define(
        env,
        Callable::new(
            Some("Mid"),
            vec![
                SignatureAndImpl {
                    signature: Signature::new(
                        vec![Argument::new("s", ValueKind::String), Argument::new("p", ValueKind::Int32)],
                        ValueKind::String,
                    ),
                    implementation: Implementation::Native(Rc::clone(&mid)),
                },
                SignatureAndImpl {
                    signature: Signature::new(
                        vec![
                            Argument::new("s", ValueKind::String),
                            Argument::new("p", ValueKind::Int32),
                            Argument::new("n", ValueKind::Int32),
                        ],
                        ValueKind::String,
                    ),
                    implementation: Implementation::Native(mid),
                },
            ],
        ),
    );
}

fn define(env: &mut Environment, callable: Callable) {
    let name = callable.name().to_string();
    env.define_global(&name, Value::Callable(Rc::new(callable)));
}

fn literal(value: Literal) -> Expression {
    Spanned {
        node: Expr::Literal(value),
        loc: Location::internal(),
    }
}

fn string_arg(args: &[Value], index: usize) -> &str {
    args.get(index).and_then(Value::as_str).unwrap_or_default()
}

fn int_arg(args: &[Value], index: usize) -> i32 {
    match args.get(index) {
        Some(Value::Int32(n)) => *n,
        _ => 0,
    }
}

fn number_arg(args: &[Value]) -> Result<&Value, RuntimeError> {
    args.first()
        .filter(|v| v.is_numeric())
        .ok_or_else(|| RuntimeError::from_kind(ErrorKind::TypeMismatch))
}

fn create(interp: &mut Interpreter, args: &[Value]) -> InterpResult<Value> {
    let class = string_arg(args, 0);
    match create_object(interp.heap(), class) {
        Some(obj) => Ok(Value::Object(obj)),
        None => {
            log::warn!("unknown component class {class}");
            let loc = interp.current_loc.clone();
            interp.warn(&format!(
                "BRIGHTSCRIPT: ERROR: Runtime: unknown classname \"{class}\": {loc}"
            ));
            Ok(Value::Invalid)
        }
    }
}

fn type_of(_: &mut Interpreter, args: &[Value]) -> InterpResult<Value> {
    let name = args.first().map(Value::type_name).unwrap_or_default();
    Ok(Value::string(name))
}

fn str_float(_: &mut Interpreter, args: &[Value]) -> InterpResult<Value> {
    let x = args.first().and_then(Value::as_f64).unwrap_or(0.0);
    let text = format_float(x);
    Ok(Value::string(if x >= 0.0 { format!(" {text}") } else { text }))
}

fn str_i(_: &mut Interpreter, args: &[Value]) -> InterpResult<Value> {
    let value = int_arg(args, 0);
    let radix = int_arg(args, 1);
    if !(2..=36).contains(&radix) {
        return Ok(Value::string(""));
    }
    let mut n = i64::from(value).unsigned_abs();
    let mut digits = Vec::new();
    loop {
        let digit = (n % radix as u64) as u32;
        digits.push(char::from_digit(digit, radix as u32).unwrap_or('0'));
        n /= radix as u64;
        if n == 0 {
            break;
        }
    }
    if value < 0 {
        digits.push('-');
    }
    Ok(Value::string(digits.iter().rev().collect::<String>()))
}

fn val(_: &mut Interpreter, args: &[Value]) -> InterpResult<Value> {
    let text = string_arg(args, 0).trim();
    let radix = int_arg(args, 1);
    if radix != 0 {
        let parsed = (2..=36)
            .contains(&radix)
            .then(|| i32::from_str_radix(text, radix as u32).ok())
            .flatten();
        return Ok(Value::Int32(parsed.unwrap_or(0)));
    }
    Ok(Value::Float(numeric_prefix(text).parse().unwrap_or(0.0)))
}

/// Longest leading slice of `text` that reads as a decimal number
fn numeric_prefix(text: &str) -> &str {
    let bytes = text.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'-' | b'+')) {
        end = 1;
    }
    let mut seen_dot = false;
    let mut seen_exp = false;
    while let Some(&b) = bytes.get(end) {
        match b {
            b'0'..=b'9' => {}
            b'.' if !seen_dot && !seen_exp => seen_dot = true,
            b'e' | b'E' if !seen_exp && end > 0 => {
                seen_exp = true;
                if matches!(bytes.get(end + 1), Some(b'-' | b'+')) {
                    end += 1;
                }
            }
            _ => break,
        }
        end += 1;
    }
    &text[..end]
}

fn int(_: &mut Interpreter, args: &[Value]) -> InterpResult<Value> {
    Ok(Value::Int32(match number_arg(args)? {
        Value::Float(x) => truncate_to_int32(f64::from(x.floor())),
        Value::Double(x) => truncate_to_int32(x.floor()),
        Value::Int64(n) => saturate(*n),
        other => int_arg(std::slice::from_ref(other), 0),
    }))
}

fn fix(_: &mut Interpreter, args: &[Value]) -> InterpResult<Value> {
    Ok(Value::Int32(match number_arg(args)? {
        Value::Float(x) => truncate_to_int32(f64::from(*x)),
        Value::Double(x) => truncate_to_int32(*x),
        Value::Int64(n) => saturate(*n),
        other => int_arg(std::slice::from_ref(other), 0),
    }))
}

fn abs(_: &mut Interpreter, args: &[Value]) -> InterpResult<Value> {
    match args.first() {
        Some(Value::Float(x)) => Ok(Value::Float(x.abs())),
        _ => Ok(Value::Float(0.0)),
    }
}

fn len(_: &mut Interpreter, args: &[Value]) -> InterpResult<Value> {
    Ok(Value::Int32(string_arg(args, 0).chars().count() as i32))
}

fn ucase(_: &mut Interpreter, args: &[Value]) -> InterpResult<Value> {
    Ok(Value::string(string_arg(args, 0).to_uppercase()))
}

fn lcase(_: &mut Interpreter, args: &[Value]) -> InterpResult<Value> {
    Ok(Value::string(string_arg(args, 0).to_lowercase()))
}

fn left(_: &mut Interpreter, args: &[Value]) -> InterpResult<Value> {
    let n = usize::try_from(int_arg(args, 1)).unwrap_or(0);
    Ok(Value::string(string_arg(args, 0).chars().take(n).collect::<String>()))
}

fn right(_: &mut Interpreter, args: &[Value]) -> InterpResult<Value> {
    let text = string_arg(args, 0);
    let n = usize::try_from(int_arg(args, 1)).unwrap_or(0);
    let skip = text.chars().count().saturating_sub(n);
    Ok(Value::string(text.chars().skip(skip).collect::<String>()))
}

/// `Mid(s, p[, n])`: `p` is 1-based
fn substring(_: &mut Interpreter, args: &[Value]) -> InterpResult<Value> {
    let text = string_arg(args, 0);
    let start = usize::try_from(int_arg(args, 1) - 1).unwrap_or(0);
    let chars = text.chars().skip(start);
    let result: String = match args.get(2) {
        Some(Value::Int32(n)) => chars.take(usize::try_from(*n).unwrap_or(0)).collect(),
        _ => chars.collect(),
    };
    Ok(Value::string(result))
}

fn chr(_: &mut Interpreter, args: &[Value]) -> InterpResult<Value> {
    let text = u32::try_from(int_arg(args, 0))
        .ok()
        .and_then(char::from_u32)
        .map(String::from)
        .unwrap_or_default();
    Ok(Value::string(text))
}

fn asc(_: &mut Interpreter, args: &[Value]) -> InterpResult<Value> {
    let code = string_arg(args, 0).chars().next().map_or(0, |c| c as i32);
    Ok(Value::Int32(code))
}

fn get_global_aa(interp: &mut Interpreter, _: &[Value]) -> InterpResult<Value> {
    Ok(Value::Object(Rc::clone(interp.environment().root_m())))
}
