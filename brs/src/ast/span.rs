//! Source location tracking

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A line/column pair. Lines start at 1, columns at 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// A region of a source file: inclusive start, exclusive end
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub file: Arc<str>,
    pub start: Position,
    pub end: Position,
}

impl Location {
    pub fn new(file: Arc<str>, start: Position, end: Position) -> Self {
        Self { file, start, end }
    }

    /// Location used for values created by the runtime itself
    pub fn internal() -> Self {
        Self {
            file: Arc::from("(internal)"),
            start: Position::new(0, 0),
            end: Position::new(0, 0),
        }
    }

    /// Smallest location covering both `self` and `other`
    pub fn merge(&self, other: &Location) -> Location {
        Location {
            file: Arc::clone(&self.file),
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start.line == self.end.line {
            write!(f, "{}({},{}", self.file, self.start.line, self.start.column)?;
            if self.start.column != self.end.column {
                write!(f, "-{}", self.end.column)?;
            }
            write!(f, ")")
        } else {
            write!(
                f,
                "{}({},{},{},{})",
                self.file, self.start.line, self.start.column, self.end.line, self.end.column
            )
        }
    }
}

/// Render `message` prefixed with its location, `file(line,col): message`
pub fn format_with_location(message: &str, location: &Location) -> String {
    format!("{location}: {message}")
}

/// A value with source location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Spanned<T> {
    pub node: T,
    pub loc: Location,
}

impl<T> Spanned<T> {
    pub fn new(node: T, loc: Location) -> Self {
        Self { node, loc }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Spanned<U> {
        Spanned {
            node: f(self.node),
            loc: self.loc,
        }
    }
}
