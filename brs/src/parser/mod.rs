//! Recursive-descent parser with per-statement error recovery
//!
//! Statements are parsed by recursive descent; binary operators use binding
//! powers (see `expression.rs`). A syntax error is recorded, the parser skips
//! to the next statement boundary (newline or `:`) and carries on, so a single
//! pass reports every error in the file.

mod expression;

#[cfg(test)]
mod tests;

use crate::ast::{
    BinaryOp, ElseIf, Expr, Expression, FunctionExpr, Identifier, Location, Param, PrintItem,
    Spanned, Statement, Stmt, ValueKind,
};
use crate::error::{CompileError, Result};
use crate::lexer::{Lexeme, Token};
use std::sync::Arc;

/// Output of [`parse`]
#[derive(Debug, Default)]
pub struct ParseResults {
    pub statements: Vec<Statement>,
    pub errors: Vec<CompileError>,
}

/// Parse a preprocessed token stream (terminated by `Eof`)
pub fn parse(tokens: &[Token]) -> ParseResults {
    if tokens.is_empty() {
        return ParseResults::default();
    }
    let mut parser = Parser::new(tokens);
    let statements = parser.program();
    log::debug!(
        "parsed {} top-level statements ({} errors)",
        statements.len(),
        parser.errors.len()
    );
    ParseResults {
        statements,
        errors: parser.errors,
    }
}

/// Keywords that close a block; any of them ends the current statement list
const BLOCK_ENDS: &[Lexeme] = &[
    Lexeme::EndFunction,
    Lexeme::EndSub,
    Lexeme::EndIf,
    Lexeme::EndWhile,
    Lexeme::EndFor,
    Lexeme::Next,
    Lexeme::EndTry,
    Lexeme::Catch,
    Lexeme::Else,
    Lexeme::ElseIf,
];

struct Parser<'a> {
    tokens: &'a [Token],
    current: usize,
    errors: Vec<CompileError>,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self {
            tokens,
            current: 0,
            errors: Vec::new(),
        }
    }

    // ============================================
    // Statement lists
    // ============================================

    fn program(&mut self) -> Vec<Statement> {
        let mut statements = Vec::new();
        loop {
            self.skip_separators();
            if self.is_at_end() {
                break;
            }
            self.statement_in_list(&mut statements);
        }
        statements
    }

    /// Statements up to (not including) the next block-closing keyword
    fn block(&mut self) -> Vec<Statement> {
        let mut statements = Vec::new();
        loop {
            self.skip_separators();
            let kind = self.peek().kind;
            if kind == Lexeme::Eof || BLOCK_ENDS.contains(&kind) {
                break;
            }
            self.statement_in_list(&mut statements);
        }
        statements
    }

    fn statement_in_list(&mut self, statements: &mut Vec<Statement>) {
        match self.statement() {
            Ok(stmt) => {
                statements.push(stmt);
                if let Err(e) = self.end_of_statement() {
                    self.recover(e);
                }
            }
            Err(e) => self.recover(e),
        }
    }

    /// Statements of a single-line `if`, separated by `:`
    fn inline_block(&mut self) -> Result<Vec<Statement>> {
        let mut statements = Vec::new();
        loop {
            statements.push(self.statement()?);
            let continues = self.check(Lexeme::Colon)
                && !matches!(
                    self.peek_next().kind,
                    Lexeme::Newline | Lexeme::Eof | Lexeme::Else | Lexeme::ElseIf | Lexeme::EndIf
                );
            if !continues {
                break;
            }
            self.advance();
        }
        Ok(statements)
    }

    fn end_of_statement(&mut self) -> Result<()> {
        match self.peek().kind {
            Lexeme::Newline | Lexeme::Colon => {
                self.advance();
                Ok(())
            }
            Lexeme::Eof => Ok(()),
            _ => Err(self.expected("newline or ':' after statement")),
        }
    }

    fn recover(&mut self, error: CompileError) {
        log::trace!("syntax error, resynchronizing: {error}");
        self.errors.push(error);
        self.synchronize();
    }

    /// Skip to just past the next statement separator
    fn synchronize(&mut self) {
        while !self.peek().kind.is_terminator() {
            self.advance();
        }
        if !self.is_at_end() {
            self.advance();
        }
    }

    // ============================================
    // Statements
    // ============================================

    fn statement(&mut self) -> Result<Statement> {
        let start = self.peek().clone();
        match start.kind {
            Lexeme::Function | Lexeme::Sub if self.peek_next().kind == Lexeme::Identifier => {
                self.function_declaration()
            }
            Lexeme::If => self.if_statement(),
            Lexeme::For => self.for_statement(),
            Lexeme::ForEach => self.for_each_statement(),
            Lexeme::While => self.while_statement(),
            Lexeme::Print => self.print_statement(),
            Lexeme::Dim => self.dim_statement(),
            Lexeme::Goto => {
                self.advance();
                let label = self.identifier("label name after 'goto'")?;
                Ok(self.finish(Stmt::Goto { label }, &start.loc))
            }
            Lexeme::Return => self.return_statement(),
            Lexeme::Try => self.try_statement(),
            Lexeme::Throw => {
                self.advance();
                let value = self.expression()?;
                Ok(self.finish(Stmt::Throw { value }, &start.loc))
            }
            Lexeme::ExitFor
            | Lexeme::ExitWhile
            | Lexeme::ContinueFor
            | Lexeme::ContinueWhile
            | Lexeme::End
            | Lexeme::Stop => {
                self.advance();
                let stmt = match start.kind {
                    Lexeme::ExitFor => Stmt::ExitFor,
                    Lexeme::ExitWhile => Stmt::ExitWhile,
                    Lexeme::ContinueFor => Stmt::ContinueFor,
                    Lexeme::ContinueWhile => Stmt::ContinueWhile,
                    Lexeme::End => Stmt::End,
                    _ => Stmt::Stop,
                };
                Ok(Spanned::new(stmt, start.loc))
            }
            Lexeme::Identifier if self.peek_next().kind == Lexeme::Colon => {
                self.advance();
                let name = Identifier::new(start.text, start.loc.clone());
                Ok(Spanned::new(Stmt::Label { name }, start.loc))
            }
            kind if BLOCK_ENDS.contains(&kind) || kind == Lexeme::Exit => Err(
                CompileError::parser(format!("Unexpected '{}'", start.text), start.loc),
            ),
            _ => self.expression_statement(),
        }
    }

    fn function_declaration(&mut self) -> Result<Statement> {
        let keyword = self.advance().clone();
        let name = self.identifier("function name")?;
        let func = self.function_body(&keyword)?;
        let loc = func.loc.clone();
        Ok(Spanned::new(
            Stmt::Function {
                name,
                func: Arc::new(func),
            },
            loc,
        ))
    }

    /// Parameters, return type and body after `function name` or an anonymous `function`
    fn function_body(&mut self, keyword: &Token) -> Result<FunctionExpr> {
        let is_sub = keyword.kind == Lexeme::Sub;
        self.consume(Lexeme::LeftParen, "'(' to begin parameter list")?;
        let params = self.parameters()?;

        let mut return_kind = if is_sub {
            ValueKind::Void
        } else {
            ValueKind::Dynamic
        };
        if self.peek().is_word("as") {
            self.advance();
            return_kind = self.type_name()?;
        }

        let body = self.block();
        let (end, opener) = if is_sub {
            (Lexeme::EndSub, "sub")
        } else {
            (Lexeme::EndFunction, "function")
        };
        let end = self.block_end(&[end], opener)?;

        Ok(FunctionExpr {
            params,
            return_kind,
            body,
            is_sub,
            loc: keyword.loc.merge(&end.loc),
        })
    }

    fn parameters(&mut self) -> Result<Vec<Param>> {
        let mut params: Vec<Param> = Vec::new();
        if !self.check(Lexeme::RightParen) {
            loop {
                let name = self.identifier("parameter name")?;
                let mut kind = ValueKind::from_designator(&name.text).unwrap_or(ValueKind::Dynamic);
                let default = if self.match_kind(Lexeme::Equal) {
                    Some(self.expression()?)
                } else {
                    None
                };
                if self.peek().is_word("as") {
                    self.advance();
                    kind = self.type_name()?;
                }
                if default.is_none() && params.iter().any(|p| p.default.is_some()) {
                    return Err(CompileError::parser(
                        format!(
                            "Argument '{}' has no default value, but comes after arguments with default values",
                            name.text
                        ),
                        name.loc,
                    ));
                }
                params.push(Param {
                    name,
                    kind,
                    default,
                });
                if !self.match_kind(Lexeme::Comma) {
                    break;
                }
            }
        }
        self.consume(Lexeme::RightParen, "')' after parameters")?;
        Ok(params)
    }

    fn type_name(&mut self) -> Result<ValueKind> {
        let token = self.peek().clone();
        let kind = ValueKind::from_name(&token.text).ok_or_else(|| {
            CompileError::parser(
                format!("Expected a type name after 'as', found {}", describe(&token)),
                token.loc.clone(),
            )
        })?;
        self.advance();
        Ok(kind)
    }

    fn if_statement(&mut self) -> Result<Statement> {
        let start = self.advance().clone();
        let condition = self.expression()?;
        self.match_kind(Lexeme::Then);

        if !self.check(Lexeme::Newline) {
            return self.inline_if(condition, &start.loc);
        }

        let then_branch = self.block();
        let mut else_ifs = Vec::new();
        let mut else_branch = None;
        loop {
            match self.peek().kind {
                Lexeme::ElseIf => {
                    self.advance();
                    let condition = self.expression()?;
                    self.match_kind(Lexeme::Then);
                    let then_branch = self.block();
                    else_ifs.push(ElseIf {
                        condition,
                        then_branch,
                    });
                }
                Lexeme::Else => {
                    self.advance();
                    else_branch = Some(self.block());
                    self.block_end(&[Lexeme::EndIf], "if")?;
                    break;
                }
                _ => {
                    self.block_end(&[Lexeme::EndIf], "if")?;
                    break;
                }
            }
        }

        Ok(self.finish(
            Stmt::If {
                condition,
                then_branch,
                else_ifs,
                else_branch,
            },
            &start.loc,
        ))
    }

    /// `if cond then stmt [: stmt] [else if ...] [else stmt]` on one line
    fn inline_if(&mut self, condition: Expression, start: &Location) -> Result<Statement> {
        let then_branch = self.inline_block()?;
        let mut else_ifs = Vec::new();
        while self.match_kind(Lexeme::ElseIf) {
            let condition = self.expression()?;
            self.match_kind(Lexeme::Then);
            let then_branch = self.inline_block()?;
            else_ifs.push(ElseIf {
                condition,
                then_branch,
            });
        }
        let else_branch = if self.match_kind(Lexeme::Else) {
            Some(self.inline_block()?)
        } else {
            None
        };
        if self.check(Lexeme::Colon) && self.peek_next().kind == Lexeme::EndIf {
            self.advance();
        }
        self.match_kind(Lexeme::EndIf);

        Ok(self.finish(
            Stmt::If {
                condition,
                then_branch,
                else_ifs,
                else_branch,
            },
            start,
        ))
    }

    fn for_statement(&mut self) -> Result<Statement> {
        let start = self.advance().clone();
        let counter = self.identifier("loop counter after 'for'")?;
        self.consume(Lexeme::Equal, "'=' after for-loop counter")?;
        let initial = self.expression()?;
        self.consume(Lexeme::To, "'to' after for-loop start value")?;
        let end = self.expression()?;
        let step = if self.match_kind(Lexeme::Step) {
            Some(self.expression()?)
        } else {
            None
        };

        let body = self.block();
        self.loop_end("for")?;

        Ok(self.finish(
            Stmt::For {
                counter,
                start: initial,
                end,
                step,
                body,
            },
            &start.loc,
        ))
    }

    fn for_each_statement(&mut self) -> Result<Statement> {
        let start = self.advance().clone();
        let item = self.identifier("item name after 'for each'")?;
        if !self.peek().is_word("in") {
            return Err(self.expected("'in' after 'for each' item"));
        }
        self.advance();
        let target = self.expression()?;

        let body = self.block();
        self.loop_end("for each")?;

        Ok(self.finish(Stmt::ForEach { item, target, body }, &start.loc))
    }

    /// `next [counter]` or `end for`
    fn loop_end(&mut self, opener: &str) -> Result<()> {
        let end = self.block_end(&[Lexeme::Next, Lexeme::EndFor], opener)?;
        if end.kind == Lexeme::Next && self.check(Lexeme::Identifier) {
            self.advance();
        }
        Ok(())
    }

    fn while_statement(&mut self) -> Result<Statement> {
        let start = self.advance().clone();
        let condition = self.expression()?;
        let body = self.block();
        self.block_end(&[Lexeme::EndWhile], "while")?;
        Ok(self.finish(Stmt::While { condition, body }, &start.loc))
    }

    fn print_statement(&mut self) -> Result<Statement> {
        let start = self.advance().clone();
        let mut items = Vec::new();
        loop {
            match self.peek().kind {
                Lexeme::Newline | Lexeme::Colon | Lexeme::Eof | Lexeme::Else | Lexeme::ElseIf => {
                    break;
                }
                Lexeme::Comma => {
                    self.advance();
                    items.push(PrintItem::Comma);
                }
                Lexeme::Semicolon => {
                    self.advance();
                    items.push(PrintItem::Semicolon);
                }
                _ => items.push(PrintItem::Expr(self.expression()?)),
            }
        }
        Ok(self.finish(Stmt::Print { items }, &start.loc))
    }

    fn dim_statement(&mut self) -> Result<Statement> {
        let start = self.advance().clone();
        let name = self.identifier("array name after 'dim'")?;
        self.consume(Lexeme::LeftSquare, "'[' after dim name")?;
        let mut dimensions = vec![self.expression()?];
        while self.match_kind(Lexeme::Comma) {
            dimensions.push(self.expression()?);
        }
        self.consume(Lexeme::RightSquare, "']' after dim dimensions")?;
        Ok(self.finish(Stmt::Dim { name, dimensions }, &start.loc))
    }

    fn return_statement(&mut self) -> Result<Statement> {
        let start = self.advance().clone();
        let value = match self.peek().kind {
            Lexeme::Newline | Lexeme::Colon | Lexeme::Eof | Lexeme::Else | Lexeme::ElseIf => None,
            _ => Some(self.expression()?),
        };
        Ok(self.finish(Stmt::Return { value }, &start.loc))
    }

    fn try_statement(&mut self) -> Result<Statement> {
        let start = self.advance().clone();
        let try_block = self.block();
        self.block_end(&[Lexeme::Catch], "try")?;
        let error_binding = self.identifier("error variable name after 'catch'")?;
        let catch_block = self.block();
        self.block_end(&[Lexeme::EndTry], "try")?;
        Ok(self.finish(
            Stmt::TryCatch {
                try_block,
                error_binding,
                catch_block,
            },
            &start.loc,
        ))
    }

    /// Assignment, compound assignment, increment, or a bare call
    fn expression_statement(&mut self) -> Result<Statement> {
        let target = self.postfix()?;
        let kind = self.peek().kind;

        if kind == Lexeme::Equal {
            self.advance();
            let value = self.expression()?;
            return self.assignment(target, value);
        }

        if let Some(op) = compound_operator(kind) {
            self.advance();
            let right = self.expression()?;
            let loc = target.loc.merge(&right.loc);
            let value = Spanned::new(
                Expr::Binary {
                    left: Box::new(target.clone()),
                    op,
                    right: Box::new(right),
                },
                loc,
            );
            return self.assignment(target, value);
        }

        if matches!(kind, Lexeme::PlusPlus | Lexeme::MinusMinus) {
            if !is_assignable(&target) {
                return Err(CompileError::parser(
                    "Increment and decrement require a variable, property or index target",
                    target.loc,
                ));
            }
            self.advance();
            let loc = target.loc.clone();
            return Ok(self.finish(
                Stmt::Increment {
                    target,
                    decrement: kind == Lexeme::MinusMinus,
                },
                &loc,
            ));
        }

        if matches!(target.node, Expr::Call { .. }) {
            let loc = target.loc.clone();
            return Ok(Spanned::new(Stmt::Expression(target), loc));
        }

        Err(CompileError::parser(
            "Expected statement or function call, but received an expression",
            target.loc,
        ))
    }

    fn assignment(&mut self, target: Expression, value: Expression) -> Result<Statement> {
        let loc = target.loc.merge(&value.loc);
        let stmt = match target.node {
            Expr::Variable(name) => Stmt::Assignment { name, value },
            Expr::DottedGet { obj, name, .. } => Stmt::DottedSet {
                obj: *obj,
                name,
                value,
            },
            Expr::IndexedGet { obj, index, .. } => Stmt::IndexedSet {
                obj: *obj,
                index: *index,
                value,
            },
            _ => {
                return Err(CompileError::parser(
                    "Invalid assignment target",
                    target.loc,
                ));
            }
        };
        Ok(Spanned::new(stmt, loc))
    }

    // ============================================
    // Token helpers
    // ============================================

    /// Wrap `stmt` with a location running from `start` to the last consumed token
    fn finish(&self, stmt: Stmt, start: &Location) -> Statement {
        Spanned::new(stmt, start.merge(&self.previous().loc))
    }

    /// Consume one of `kinds` closing a block opened by `opener`
    fn block_end(&mut self, kinds: &[Lexeme], opener: &str) -> Result<Token> {
        if kinds.contains(&self.peek().kind) {
            return Ok(self.advance().clone());
        }
        let wanted = kinds
            .iter()
            .map(|k| format!("'{k}'"))
            .collect::<Vec<_>>()
            .join(" or ");
        Err(self.expected(&format!("{wanted} to terminate '{opener}' block")))
    }

    fn identifier(&mut self, what: &str) -> Result<Identifier> {
        let token = self.consume(Lexeme::Identifier, what)?;
        Ok(Identifier::new(token.text, token.loc))
    }

    fn consume(&mut self, kind: Lexeme, what: &str) -> Result<Token> {
        if self.check(kind) {
            Ok(self.advance().clone())
        } else {
            Err(self.expected(what))
        }
    }

    fn expected(&self, what: &str) -> CompileError {
        let token = self.peek();
        CompileError::parser(
            format!("Expected {what}, found {}", describe(token)),
            token.loc.clone(),
        )
    }

    fn match_kind(&mut self, kind: Lexeme) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn check(&self, kind: Lexeme) -> bool {
        self.peek().kind == kind
    }

    fn skip_separators(&mut self) {
        while matches!(self.peek().kind, Lexeme::Newline | Lexeme::Colon) {
            self.advance();
        }
    }

    /// Skip newlines inside brackets; returns whether any were skipped
    fn skip_newlines(&mut self) -> bool {
        let mut skipped = false;
        while self.check(Lexeme::Newline) {
            self.advance();
            skipped = true;
        }
        skipped
    }

    fn is_at_end(&self) -> bool {
        self.check(Lexeme::Eof)
    }

    fn peek(&self) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.current.min(last)]
    }

    fn peek_next(&self) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[(self.current + 1).min(last)]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1).min(self.tokens.len().saturating_sub(1))]
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }
}

/// Human-readable description of a token for diagnostics
fn describe(token: &Token) -> String {
    match token.kind {
        Lexeme::Eof => "end of file".to_string(),
        Lexeme::Newline => "newline".to_string(),
        _ => format!("'{}'", token.text),
    }
}

fn compound_operator(kind: Lexeme) -> Option<BinaryOp> {
    match kind {
        Lexeme::PlusEqual => Some(BinaryOp::Add),
        Lexeme::MinusEqual => Some(BinaryOp::Sub),
        Lexeme::StarEqual => Some(BinaryOp::Mul),
        Lexeme::SlashEqual => Some(BinaryOp::Div),
        Lexeme::BackslashEqual => Some(BinaryOp::IntDiv),
        Lexeme::LeftShiftEqual => Some(BinaryOp::LeftShift),
        Lexeme::RightShiftEqual => Some(BinaryOp::RightShift),
        _ => None,
    }
}

fn is_assignable(expr: &Expression) -> bool {
    matches!(
        expr.node,
        Expr::Variable(_) | Expr::DottedGet { .. } | Expr::IndexedGet { .. }
    )
}
