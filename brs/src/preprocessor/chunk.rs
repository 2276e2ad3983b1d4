//! Directive chunks: the tree a token stream forms around `#if`/`#const`/`#error`

use crate::error::{CompileError, Result};
use crate::lexer::{Lexeme, Token};

/// A run of tokens or a conditional-compilation directive
#[derive(Debug, Clone)]
pub enum Chunk {
    /// Ordinary tokens passed through when their branch is taken
    BrightScript(Vec<Token>),
    /// `#const name = value`
    Declaration { name: Token, value: Token },
    /// `#if` with optional `#else if` arms and `#else`
    If {
        condition: Token,
        then_chunks: Vec<Chunk>,
        else_ifs: Vec<(Token, Vec<Chunk>)>,
        else_chunks: Option<Vec<Chunk>>,
    },
    /// `#error message`
    Error { directive: Token, message: String },
}

/// Recursive-descent parser from tokens to [`Chunk`]s
pub struct ChunkParser<'a> {
    tokens: &'a [Token],
    current: usize,
}

impl<'a> ChunkParser<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, current: 0 }
    }

    /// Parse the whole stream. The trailing `Eof` token is not part of any chunk.
    pub fn parse(mut self) -> std::result::Result<Vec<Chunk>, Vec<CompileError>> {
        match self.chunks(&[]) {
            Ok(chunks) => {
                if self.check(Lexeme::Eof) {
                    Ok(chunks)
                } else {
                    let token = self.peek().clone();
                    Err(vec![CompileError::preprocessor(
                        format!("Unexpected '{}' without a matching '#if'", token.kind),
                        token.loc,
                    )])
                }
            }
            Err(e) => Err(vec![e]),
        }
    }

    /// Parse chunks until one of `terminators` (or end of input) is next
    fn chunks(&mut self, terminators: &[Lexeme]) -> Result<Vec<Chunk>> {
        let mut chunks = Vec::new();
        let mut plain = Vec::new();

        loop {
            let kind = self.peek().kind;
            if kind == Lexeme::Eof || terminators.contains(&kind) {
                break;
            }
            match kind {
                Lexeme::HashConst | Lexeme::HashIf | Lexeme::HashError => {
                    if !plain.is_empty() {
                        chunks.push(Chunk::BrightScript(std::mem::take(&mut plain)));
                    }
                    let chunk = match kind {
                        Lexeme::HashConst => self.declaration()?,
                        Lexeme::HashIf => self.if_chunk()?,
                        _ => self.error_chunk()?,
                    };
                    chunks.push(chunk);
                }
                Lexeme::HashElseIf | Lexeme::HashElse | Lexeme::HashEndIf => {
                    let token = self.peek().clone();
                    return Err(CompileError::preprocessor(
                        format!("Unexpected '{}' without a matching '#if'", token.kind),
                        token.loc,
                    ));
                }
                _ => plain.push(self.advance().clone()),
            }
        }

        if !plain.is_empty() {
            chunks.push(Chunk::BrightScript(plain));
        }
        Ok(chunks)
    }

    fn declaration(&mut self) -> Result<Chunk> {
        self.advance();
        let name = self.consume(&[Lexeme::Identifier], "#const name")?;
        self.consume(&[Lexeme::Equal], "'=' after #const name")?;
        let value = self.consume(
            &[Lexeme::Identifier, Lexeme::True, Lexeme::False],
            "#const value (true, false, or another #const)",
        )?;
        self.end_of_directive()?;
        Ok(Chunk::Declaration { name, value })
    }

    fn if_chunk(&mut self) -> Result<Chunk> {
        let if_token = self.advance().clone();
        let condition = self.condition()?;
        let branch_end = [Lexeme::HashElseIf, Lexeme::HashElse, Lexeme::HashEndIf];
        let then_chunks = self.chunks(&branch_end)?;

        let mut else_ifs = Vec::new();
        while self.check(Lexeme::HashElseIf) {
            self.advance();
            let condition = self.condition()?;
            let chunks = self.chunks(&branch_end)?;
            else_ifs.push((condition, chunks));
        }

        let else_chunks = if self.check(Lexeme::HashElse) {
            self.advance();
            self.end_of_directive()?;
            Some(self.chunks(&[Lexeme::HashEndIf])?)
        } else {
            None
        };

        if !self.check(Lexeme::HashEndIf) {
            return Err(CompileError::preprocessor(
                "Expected '#end if' to close '#if'",
                if_token.loc,
            ));
        }
        self.advance();
        self.end_of_directive()?;

        Ok(Chunk::If {
            condition,
            then_chunks,
            else_ifs,
            else_chunks,
        })
    }

    fn error_chunk(&mut self) -> Result<Chunk> {
        let directive = self.advance().clone();
        let message = if self.check(Lexeme::HashErrorMessage) {
            self.advance().text.clone()
        } else {
            String::new()
        };
        self.end_of_directive()?;
        Ok(Chunk::Error { directive, message })
    }

    fn condition(&mut self) -> Result<Token> {
        let token = self.consume(
            &[Lexeme::Identifier, Lexeme::True, Lexeme::False],
            "#if condition (true, false, or a #const name)",
        )?;
        self.end_of_directive()?;
        Ok(token)
    }

    /// Directives own their line: a newline (or end of input) must follow
    fn end_of_directive(&mut self) -> Result<()> {
        match self.peek().kind {
            Lexeme::Newline => {
                self.advance();
                Ok(())
            }
            Lexeme::Eof => Ok(()),
            _ => {
                let token = self.peek().clone();
                Err(CompileError::preprocessor(
                    format!("Expected newline after directive, found '{}'", token.text),
                    token.loc,
                ))
            }
        }
    }

    fn consume(&mut self, kinds: &[Lexeme], what: &str) -> Result<Token> {
        if kinds.contains(&self.peek().kind) {
            Ok(self.advance().clone())
        } else {
            let token = self.peek().clone();
            let found = if token.kind == Lexeme::Eof {
                "end of file".to_string()
            } else {
                format!("'{}'", token.text)
            };
            Err(CompileError::preprocessor(
                format!("Expected {what}, found {found}"),
                token.loc,
            ))
        }
    }

    fn check(&self, kind: Lexeme) -> bool {
        self.peek().kind == kind
    }

    fn peek(&self) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.current.min(last)]
    }

    fn advance(&mut self) -> &Token {
        let idx = self.current.min(self.tokens.len().saturating_sub(1));
        if self.current < self.tokens.len() {
            self.current += 1;
        }
        &self.tokens[idx]
    }
}
