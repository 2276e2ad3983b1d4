//! brs Runtime Library
//!
//! BrightScript lexer, preprocessor and parser feeding a tree-walking
//! interpreter, plus the task-thread protocol hosts use to run apps.

pub mod ast;
pub mod error;
pub mod extensions;
pub mod interp;
pub mod lexer;
pub mod parser;
pub mod preprocessor;
pub mod repl;
pub mod runtime;
pub mod task;

pub use ast::Location;
pub use error::{CompileError, Result};
