//! Error types and reporting for the front end (lexer, preprocessor, parser)

use crate::ast::Location;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, CompileError>;

/// Compile error
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("{location}: {message}")]
    Lexer { message: String, location: Location },

    #[error("{location}: {message}")]
    Preprocessor { message: String, location: Location },

    #[error("{location}: {message}")]
    Parser { message: String, location: Location },

    /// Malformed manifest or runtime configuration
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("IO error: {message}")]
    Io { message: String },
}

impl CompileError {
    pub fn lexer(message: impl Into<String>, location: Location) -> Self {
        Self::Lexer {
            message: message.into(),
            location,
        }
    }

    pub fn preprocessor(message: impl Into<String>, location: Location) -> Self {
        Self::Preprocessor {
            message: message.into(),
            location,
        }
    }

    pub fn parser(message: impl Into<String>, location: Location) -> Self {
        Self::Parser {
            message: message.into(),
            location,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn io_error(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    pub fn location(&self) -> Option<&Location> {
        match self {
            Self::Lexer { location, .. }
            | Self::Preprocessor { location, .. }
            | Self::Parser { location, .. } => Some(location),
            Self::Config { .. } | Self::Io { .. } => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Lexer { message, .. } => message,
            Self::Preprocessor { message, .. } => message,
            Self::Parser { message, .. } => message,
            Self::Config { message } => message,
            Self::Io { message } => message,
        }
    }
}

impl From<std::io::Error> for CompileError {
    fn from(e: std::io::Error) -> Self {
        CompileError::io_error(e.to_string())
    }
}

/// Character offset of a line/column position within `source`
fn char_offset(source: &str, line: u32, column: u32) -> usize {
    let mut offset = 0;
    for (idx, text) in source.split_inclusive('\n').enumerate() {
        if idx + 1 == line as usize {
            return offset + column as usize;
        }
        offset += text.chars().count();
    }
    offset
}

/// Report error with ariadne
pub fn report_error(filename: &str, source: &str, error: &CompileError) {
    use ariadne::{Color, Label, Report, ReportKind, Source};

    let kind = match error {
        CompileError::Lexer { .. } => "Lexer",
        CompileError::Preprocessor { .. } => "Preprocessor",
        CompileError::Parser { .. } => "Syntax",
        CompileError::Config { .. } => "Configuration",
        CompileError::Io { .. } => "IO",
    };

    let report = if let Some(loc) = error.location() {
        let start = char_offset(source, loc.start.line, loc.start.column);
        let end = char_offset(source, loc.end.line, loc.end.column).max(start + 1);
        Report::build(ReportKind::Error, (filename, start..end))
            .with_message(format!("{kind} error"))
            .with_label(
                Label::new((filename, start..end))
                    .with_message(error.message())
                    .with_color(Color::Red),
            )
            .finish()
    } else {
        Report::build(ReportKind::Error, (filename, 0..0))
            .with_message(format!("{kind} error: {}", error.message()))
            .finish()
    };

    if let Err(e) = report.eprint((filename, Source::from(source))) {
        log::warn!("failed to render diagnostic: {e}");
    }
}
