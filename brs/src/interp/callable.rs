//! Invocable values with one or more typed signatures

use super::Interpreter;
use super::coercion::try_coerce;
use super::error::{InterpResult, RuntimeError};
use super::value::Value;
use crate::ast::{Expression, FunctionExpr, Location, ValueKind};
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

/// Extra `Dynamic` slots generated for a variadic native signature
pub const MAX_VARIADIC_ARGS: usize = 10;

thread_local! {
    static ANON_COUNTER: Cell<u64> = const { Cell::new(0) };
}

fn next_anonymous_name() -> String {
    ANON_COUNTER.with(|counter| {
        let n = counter.get() + 1;
        counter.set(n);
        format!("$anon_{n}")
    })
}

/// Native function body
pub type NativeFn = Rc<dyn Fn(&mut Interpreter, &[Value]) -> InterpResult<Value>>;

/// One declared argument
#[derive(Debug, Clone)]
pub struct Argument {
    pub name: String,
    pub kind: ValueKind,
    /// Evaluated in the callee's environment when the caller omits the argument
    pub default: Option<Expression>,
}

impl Argument {
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
        }
    }

    /// Optional native argument; the default is a literal expression
    pub fn optional(name: impl Into<String>, kind: ValueKind, default: Expression) -> Self {
        Self {
            name: name.into(),
            kind,
            default: Some(default),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Signature {
    pub args: Vec<Argument>,
    pub variadic: bool,
    pub returns: ValueKind,
}

impl Signature {
    pub fn new(args: Vec<Argument>, returns: ValueKind) -> Self {
        Self {
            args,
            variadic: false,
            returns,
        }
    }

    pub fn required_count(&self) -> usize {
        self.args.iter().filter(|a| a.default.is_none()).count()
    }

    /// `name(a As Integer, b As String) As Void`, as shown in backtraces
    pub fn describe(&self, name: &str) -> String {
        let args: Vec<String> = self
            .args
            .iter()
            .map(|a| format!("{} As {}", a.name, a.kind))
            .collect();
        format!("{name}({}) As {}", args.join(","), self.returns)
    }
}

pub enum Implementation {
    Native(NativeFn),
    User(Arc<FunctionExpr>),
}

pub struct SignatureAndImpl {
    pub signature: Signature,
    pub implementation: Implementation,
}

/// Why a signature rejected the provided arguments
#[derive(Debug, Clone, PartialEq)]
pub enum Mismatch {
    TooFewArguments { received: usize },
    TooManyArguments { expected: usize, received: usize },
    ArgumentTypeMismatch {
        name: String,
        expected: ValueKind,
        received: ValueKind,
    },
}

/// A signature together with everything wrong with a set of arguments
pub struct SignatureMismatches<'a> {
    pub signature: &'a Signature,
    pub mismatches: Vec<Mismatch>,
}

/// The signature chosen for a call and the arguments coerced to it
pub struct SatisfiedSignature<'a> {
    pub signature: &'a Signature,
    pub implementation: &'a Implementation,
    pub args: Vec<Value>,
}

pub struct Callable {
    name: String,
    signatures: Vec<SignatureAndImpl>,
    location: Option<Location>,
}

impl Callable {
    /// Callable with explicit signatures; an empty name becomes `$anon_<n>`
    pub fn new(name: Option<&str>, signatures: Vec<SignatureAndImpl>) -> Self {
        let name = match name {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => next_anonymous_name(),
        };
        Self {
            name,
            signatures,
            location: None,
        }
    }

    /// Single-signature native function
    pub fn native<F>(name: &str, signature: Signature, func: F) -> Self
    where
        F: Fn(&mut Interpreter, &[Value]) -> InterpResult<Value> + 'static,
    {
        Self::new(
            Some(name),
            vec![SignatureAndImpl {
                signature,
                implementation: Implementation::Native(Rc::new(func)),
            }],
        )
    }

    /// Native function accepting up to [`MAX_VARIADIC_ARGS`] extra `Dynamic`
    /// arguments after the base signature, as a family of fixed-arity variants
    pub fn variadic<F>(name: &str, base: Signature, func: F) -> Self
    where
        F: Fn(&mut Interpreter, &[Value]) -> InterpResult<Value> + 'static,
    {
        let func: NativeFn = Rc::new(func);
        let signatures = (0..=MAX_VARIADIC_ARGS)
            .map(|extra| {
                let mut signature = base.clone();
                signature
                    .args
                    .extend((0..extra).map(|i| Argument::new(format!("arg{i}"), ValueKind::Dynamic)));
                SignatureAndImpl {
                    signature,
                    implementation: Implementation::Native(Rc::clone(&func)),
                }
            })
            .collect();
        Self::new(Some(name), signatures)
    }

    /// Callable for a parsed `function`/`sub`
    pub fn user(name: Option<&str>, func: Arc<FunctionExpr>) -> Self {
        let args = func
            .params
            .iter()
            .map(|p| Argument {
                name: p.name.text.clone(),
                kind: p.kind,
                default: p.default.clone(),
            })
            .collect();
        let signature = Signature::new(args, func.return_kind);
        let location = func.loc.clone();
        let mut callable = Self::new(
            name,
            vec![SignatureAndImpl {
                signature,
                implementation: Implementation::User(func),
            }],
        );
        callable.location = Some(location);
        callable
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    pub fn signatures(&self) -> &[SignatureAndImpl] {
        &self.signatures
    }

    /// Invoke through the interpreter's call machinery
    pub fn call(self: &Rc<Self>, interp: &mut Interpreter, args: Vec<Value>) -> InterpResult<Value> {
        let loc = self.location.clone().unwrap_or_else(Location::internal);
        interp.call_callable(self, args, &loc, None)
    }

    /// First declared signature the arguments satisfy, with coerced arguments
    pub fn get_first_satisfied_signature(&self, args: &[Value]) -> Option<SatisfiedSignature<'_>> {
        self.signatures.iter().find_map(|s| {
            let (coerced, mismatches) = check_signature(&s.signature, args);
            mismatches.is_empty().then_some(SatisfiedSignature {
                signature: &s.signature,
                implementation: &s.implementation,
                args: coerced,
            })
        })
    }

    /// Every signature and the reasons it rejects `args`
    pub fn get_all_signature_mismatches(&self, args: &[Value]) -> Vec<SignatureMismatches<'_>> {
        self.signatures
            .iter()
            .map(|s| SignatureMismatches {
                signature: &s.signature,
                mismatches: check_signature(&s.signature, args).1,
            })
            .collect()
    }

    /// Type mismatch error listing every signature against the arguments received
    pub fn mismatch_error(&self, args: &[Value]) -> RuntimeError {
        let all = self.get_all_signature_mismatches(args);
        let header = if all.len() == 1 {
            format!("Provided arguments don't match {}'s signature.", self.name)
        } else {
            format!(
                "Provided arguments don't match any of {}'s signatures.",
                self.name
            )
        };
        let mut lines = vec![header];
        lines.extend(all.iter().map(|m| self.format_mismatch(m)));
        RuntimeError::type_mismatch(&lines.join("\n"))
    }

    fn format_mismatch(&self, entry: &SignatureMismatches<'_>) -> String {
        let sig = entry.signature;
        let args: Vec<String> = sig
            .args
            .iter()
            .map(|a| {
                let text = format!("{} as {}", a.name, a.kind);
                if a.default.is_some() {
                    format!("[{text}]")
                } else {
                    text
                }
            })
            .collect();
        let mut lines = vec![format!(
            "    function {}({}) as {}:",
            self.name,
            args.join(", "),
            sig.returns
        )];
        for mismatch in &entry.mismatches {
            let line = match mismatch {
                Mismatch::TooFewArguments { received } => format!(
                    "* {} requires at least {} argument(s), but received {received}.",
                    self.name,
                    sig.required_count()
                ),
                Mismatch::TooManyArguments { expected, received } => format!(
                    "* {} accepts at most {expected} argument(s), but received {received}.",
                    self.name
                ),
                Mismatch::ArgumentTypeMismatch {
                    name,
                    expected,
                    received,
                } => format!(
                    "* Argument '{name}' must be of type {expected}, but received {received}."
                ),
            };
            lines.push(format!("        {line}"));
        }
        lines.join("\n")
    }
}

/// Check `args` against one signature: arity first, then each provided argument
fn check_signature(signature: &Signature, args: &[Value]) -> (Vec<Value>, Vec<Mismatch>) {
    if args.len() < signature.required_count() {
        return (
            Vec::new(),
            vec![Mismatch::TooFewArguments {
                received: args.len(),
            }],
        );
    }
    if !signature.variadic && args.len() > signature.args.len() {
        return (
            Vec::new(),
            vec![Mismatch::TooManyArguments {
                expected: signature.args.len(),
                received: args.len(),
            }],
        );
    }

    let mut coerced = Vec::with_capacity(args.len());
    let mut mismatches = Vec::new();
    for (index, value) in args.iter().enumerate() {
        let Some(declared) = signature.args.get(index) else {
            coerced.push(value.clone());
            continue;
        };
        match try_coerce(value, declared.kind) {
            Some(v) => coerced.push(v),
            None => mismatches.push(Mismatch::ArgumentTypeMismatch {
                name: declared.name.clone(),
                expected: declared.kind,
                received: value.kind(),
            }),
        }
    }
    (coerced, mismatches)
}

impl fmt::Display for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Function: {}>", self.name)
    }
}
