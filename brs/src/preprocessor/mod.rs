//! Conditional-compilation preprocessor
//!
//! Evaluates `#if` / `#else if` / `#else` / `#end if`, `#const` and `#error`
//! directives against boolean constants taken from the manifest's `bs_const`
//! entry, and returns only the tokens of satisfied branches.

mod chunk;

pub use chunk::{Chunk, ChunkParser};

use crate::error::{CompileError, Result};
use crate::lexer::{Lexeme, Token};
use std::collections::{BTreeMap, HashMap};

/// Application manifest: string keys to string values
pub type Manifest = BTreeMap<String, String>;

/// Output of [`preprocess`]
#[derive(Debug, Default)]
pub struct FilterResults {
    pub processed_tokens: Vec<Token>,
    pub errors: Vec<CompileError>,
}

/// Parse a manifest file: one `key=value` per line, `#` comments and blank lines ignored
pub fn parse_manifest(text: &str) -> Manifest {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let (key, value) = line.split_once('=')?;
            Some((key.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Extract the `bs_const` constants from a manifest.
///
/// Keys are case-insensitive and stored lowercased. A malformed entry is a
/// configuration error for the whole application.
pub fn bs_const(manifest: &Manifest) -> Result<HashMap<String, bool>> {
    let Some(raw) = manifest.get("bs_const") else {
        return Ok(HashMap::new());
    };

    let mut constants = HashMap::new();
    for pair in raw.split(';').filter(|p| !p.is_empty()) {
        let Some((key, value)) = pair.split_once('=') else {
            return Err(CompileError::config(format!(
                "No '=' detected for key {pair}.  bs_const constants must be of the form 'key=value'."
            )));
        };
        let key = key.trim();
        let value = match value.trim().to_ascii_lowercase().as_str() {
            "true" => true,
            "false" => false,
            _ => {
                return Err(CompileError::config(format!(
                    "Invalid value for bs_const key '{key}'.  Values must be either 'true' or 'false'."
                )));
            }
        };
        constants.insert(key.to_ascii_lowercase(), value);
    }
    Ok(constants)
}

/// Filter `tokens` through the conditional-compilation directives.
///
/// Returns `Err` only for a malformed `bs_const`; directive problems are
/// reported in [`FilterResults::errors`].
pub fn preprocess(tokens: &[Token], manifest: &Manifest) -> Result<FilterResults> {
    let constants = bs_const(manifest)?;

    let Some(eof) = tokens.last().cloned() else {
        return Ok(FilterResults::default());
    };

    let chunks = match ChunkParser::new(tokens).parse() {
        Ok(chunks) => chunks,
        Err(errors) => {
            return Ok(FilterResults {
                processed_tokens: Vec::new(),
                errors,
            });
        }
    };

    let mut filter = Filter {
        constants,
        output: Vec::new(),
        errors: Vec::new(),
    };
    filter.chunks(&chunks);

    let mut processed_tokens = filter.output;
    if eof.kind == Lexeme::Eof {
        processed_tokens.push(eof);
    }
    log::debug!(
        "preprocessed {} tokens into {} ({} errors)",
        tokens.len(),
        processed_tokens.len(),
        filter.errors.len()
    );
    Ok(FilterResults {
        processed_tokens,
        errors: filter.errors,
    })
}

struct Filter {
    constants: HashMap<String, bool>,
    output: Vec<Token>,
    errors: Vec<CompileError>,
}

impl Filter {
    fn chunks(&mut self, chunks: &[Chunk]) {
        for chunk in chunks {
            self.chunk(chunk);
        }
    }

    fn chunk(&mut self, chunk: &Chunk) {
        match chunk {
            Chunk::BrightScript(tokens) => self.output.extend(tokens.iter().cloned()),
            Chunk::Declaration { name, value } => {
                let key = name.text.to_ascii_lowercase();
                if self.constants.contains_key(&key) {
                    self.errors.push(CompileError::preprocessor(
                        format!("Attempting to re-declare #const with name '{}'", name.text),
                        name.loc.clone(),
                    ));
                    return;
                }
                if let Some(resolved) = self.evaluate(value) {
                    self.constants.insert(key, resolved);
                }
            }
            Chunk::If {
                condition,
                then_chunks,
                else_ifs,
                else_chunks,
            } => {
                if self.evaluate(condition) == Some(true) {
                    self.chunks(then_chunks);
                    return;
                }
                for (condition, chunks) in else_ifs {
                    if self.evaluate(condition) == Some(true) {
                        self.chunks(chunks);
                        return;
                    }
                }
                if let Some(chunks) = else_chunks {
                    self.chunks(chunks);
                }
            }
            Chunk::Error { directive, message } => {
                self.errors.push(CompileError::preprocessor(
                    format!("#error {message}"),
                    directive.loc.clone(),
                ));
            }
        }
    }

    /// Value of a condition token; `None` after recording an error
    fn evaluate(&mut self, token: &Token) -> Option<bool> {
        match token.kind {
            Lexeme::True => Some(true),
            Lexeme::False => Some(false),
            _ => {
                let value = self.constants.get(&token.text.to_ascii_lowercase()).copied();
                if value.is_none() {
                    self.errors.push(CompileError::preprocessor(
                        format!(
                            "Attempting to reference undefined #const with name '{}'",
                            token.text
                        ),
                        token.loc.clone(),
                    ));
                }
                value
            }
        }
    }
}
