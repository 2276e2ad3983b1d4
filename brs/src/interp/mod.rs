//! Tree-walking interpreter
//!
//! Values, components and the environment live here alongside the evaluator.
//! Each [`Interpreter`] is single-threaded; tasks run a separate instance on
//! their own thread.

pub mod callable;
pub mod coercion;
pub mod collections;
pub mod component;
pub mod context;
pub mod debug;
pub mod env;
pub mod error;
mod eval;
pub mod operators;
pub mod stdlib;
pub mod value;

pub use callable::{Argument, Callable, Signature};
pub use component::{BrsComponent, HeapStats, ObjRef};
pub use context::RuntimeContext;
pub use env::{Environment, Scope};
pub use error::{EndReason, ErrorKind, InterpResult, RuntimeError, Signal, TracePoint};
pub use eval::{Flow, Interpreter, NO_ENTRY_POINT_WARNING};
pub use value::Value;
