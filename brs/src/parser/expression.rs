//! Expression parsing with binding powers

use super::{Parser, describe};
use crate::ast::{AAMember, BinaryOp, Expr, Expression, Identifier, Literal, Spanned, UnaryOp};
use crate::error::{CompileError, Result};
use crate::lexer::Lexeme;
use std::sync::Arc;

const STACK_RED_ZONE: usize = 64 * 1024;
const STACK_GROW_SIZE: usize = 1024 * 1024;

const NOT_BINDING: u8 = 5;
const UNARY_BINDING: u8 = 17;

/// (operator, left binding power, right binding power); all left-associative
fn infix_binding(kind: Lexeme) -> Option<(BinaryOp, u8, u8)> {
    let binding = match kind {
        Lexeme::Or => (BinaryOp::Or, 1, 2),
        Lexeme::And => (BinaryOp::And, 3, 4),
        Lexeme::Equal => (BinaryOp::Eq, 7, 8),
        Lexeme::LessGreater => (BinaryOp::NotEq, 7, 8),
        Lexeme::Less => (BinaryOp::Lt, 7, 8),
        Lexeme::LessEqual => (BinaryOp::LtEq, 7, 8),
        Lexeme::Greater => (BinaryOp::Gt, 7, 8),
        Lexeme::GreaterEqual => (BinaryOp::GtEq, 7, 8),
        Lexeme::LeftShift => (BinaryOp::LeftShift, 9, 10),
        Lexeme::RightShift => (BinaryOp::RightShift, 9, 10),
        Lexeme::Plus => (BinaryOp::Add, 11, 12),
        Lexeme::Minus => (BinaryOp::Sub, 11, 12),
        Lexeme::Star => (BinaryOp::Mul, 13, 14),
        Lexeme::Slash => (BinaryOp::Div, 13, 14),
        Lexeme::Backslash => (BinaryOp::IntDiv, 13, 14),
        Lexeme::Mod => (BinaryOp::Mod, 13, 14),
        Lexeme::Caret => (BinaryOp::Pow, 15, 16),
        _ => return None,
    };
    Some(binding)
}

impl Parser<'_> {
    pub(super) fn expression(&mut self) -> Result<Expression> {
        self.expr_bp(0)
    }

    fn expr_bp(&mut self, min_bp: u8) -> Result<Expression> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            let mut lhs = self.prefix()?;
            while let Some((op, left_bp, right_bp)) = infix_binding(self.peek().kind) {
                if left_bp < min_bp {
                    break;
                }
                self.advance();
                let rhs = self.expr_bp(right_bp)?;
                let loc = lhs.loc.merge(&rhs.loc);
                lhs = Spanned::new(
                    Expr::Binary {
                        left: Box::new(lhs),
                        op,
                        right: Box::new(rhs),
                    },
                    loc,
                );
            }
            Ok(lhs)
        })
    }

    fn prefix(&mut self) -> Result<Expression> {
        let (op, power) = match self.peek().kind {
            Lexeme::Not => (UnaryOp::Not, NOT_BINDING),
            Lexeme::Minus => (UnaryOp::Neg, UNARY_BINDING),
            Lexeme::Plus => (UnaryOp::Plus, UNARY_BINDING),
            _ => return self.postfix(),
        };
        let start = self.advance().loc.clone();
        let right = self.expr_bp(power)?;
        let loc = start.merge(&right.loc);
        Ok(Spanned::new(
            Expr::Unary {
                op,
                right: Box::new(right),
            },
            loc,
        ))
    }

    /// Primary expression followed by any calls, property and index accesses
    pub(super) fn postfix(&mut self) -> Result<Expression> {
        let mut expr = self.primary()?;
        loop {
            match self.peek().kind {
                Lexeme::LeftParen => {
                    self.advance();
                    let args = self.arguments()?;
                    let close = self.consume(Lexeme::RightParen, "')' after arguments")?;
                    let loc = expr.loc.merge(&close.loc);
                    expr = Spanned::new(
                        Expr::Call {
                            callee: Box::new(expr),
                            args,
                            optional: false,
                        },
                        loc,
                    );
                }
                kind @ (Lexeme::Dot | Lexeme::QuestionDot) => {
                    self.advance();
                    let name = self.property_name()?;
                    let loc = expr.loc.merge(&name.loc);
                    expr = Spanned::new(
                        Expr::DottedGet {
                            obj: Box::new(expr),
                            name,
                            optional: kind == Lexeme::QuestionDot,
                        },
                        loc,
                    );
                }
                kind @ (Lexeme::LeftSquare | Lexeme::QuestionLeftSquare) => {
                    self.advance();
                    let mut indexes = vec![self.expression()?];
                    while self.match_kind(Lexeme::Comma) {
                        indexes.push(self.expression()?);
                    }
                    let close = self.consume(Lexeme::RightSquare, "']' after index")?;
                    // a[i, j] is a[i][j]
                    for index in indexes {
                        let loc = expr.loc.merge(&close.loc);
                        expr = Spanned::new(
                            Expr::IndexedGet {
                                obj: Box::new(expr),
                                index: Box::new(index),
                                optional: kind == Lexeme::QuestionLeftSquare,
                            },
                            loc,
                        );
                    }
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn arguments(&mut self) -> Result<Vec<Expression>> {
        let mut args = Vec::new();
        self.skip_newlines();
        if self.check(Lexeme::RightParen) {
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            self.skip_newlines();
            if !self.match_kind(Lexeme::Comma) {
                break;
            }
            self.skip_newlines();
        }
        Ok(args)
    }

    /// Name after `.`: identifiers and reserved words alike (`obj.next`, `m.print`)
    fn property_name(&mut self) -> Result<Identifier> {
        let token = self.peek().clone();
        let word_like = token
            .text
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && !token.text.contains(char::is_whitespace)
            && token.kind != Lexeme::String;
        if !word_like {
            return Err(self.expected("property name after '.'"));
        }
        self.advance();
        Ok(Identifier::new(token.text, token.loc))
    }

    fn primary(&mut self) -> Result<Expression> {
        let token = self.peek().clone();
        match token.kind {
            Lexeme::Integer
            | Lexeme::LongInteger
            | Lexeme::Float
            | Lexeme::Double
            | Lexeme::String
            | Lexeme::True
            | Lexeme::False
            | Lexeme::Invalid => {
                self.advance();
                let literal = token.literal.unwrap_or(Literal::Invalid);
                Ok(Spanned::new(Expr::Literal(literal), token.loc))
            }
            Lexeme::Identifier => {
                self.advance();
                let loc = token.loc.clone();
                Ok(Spanned::new(
                    Expr::Variable(Identifier::new(token.text, token.loc)),
                    loc,
                ))
            }
            Lexeme::LeftParen => {
                self.advance();
                self.skip_newlines();
                let inner = self.expression()?;
                self.skip_newlines();
                let close = self.consume(Lexeme::RightParen, "')' after expression")?;
                Ok(Spanned::new(
                    Expr::Grouping(Box::new(inner)),
                    token.loc.merge(&close.loc),
                ))
            }
            Lexeme::LeftSquare => self.array_literal(),
            Lexeme::LeftBrace => self.aa_literal(),
            Lexeme::Function | Lexeme::Sub => {
                self.advance();
                let func = self.function_body(&token)?;
                let loc = func.loc.clone();
                Ok(Spanned::new(Expr::Function(Arc::new(func)), loc))
            }
            _ => Err(CompileError::parser(
                format!("Expected expression, found {}", describe(&token)),
                token.loc,
            )),
        }
    }

    /// `[a, b, c]`; elements may also be separated by newlines
    fn array_literal(&mut self) -> Result<Expression> {
        let open = self.advance().clone();
        let mut elements = Vec::new();
        loop {
            self.skip_newlines();
            if self.check(Lexeme::RightSquare) || self.is_at_end() {
                break;
            }
            elements.push(self.expression()?);
            let newline = self.skip_newlines();
            if !self.match_kind(Lexeme::Comma) && !newline {
                break;
            }
        }
        let close = self.consume(Lexeme::RightSquare, "']' to close array literal")?;
        Ok(Spanned::new(
            Expr::ArrayLiteral(elements),
            open.loc.merge(&close.loc),
        ))
    }

    /// `{ key: value, "quoted key": value }`; members may be newline-separated
    fn aa_literal(&mut self) -> Result<Expression> {
        let open = self.advance().clone();
        let mut members = Vec::new();
        loop {
            self.skip_newlines();
            if self.check(Lexeme::RightBrace) || self.is_at_end() {
                break;
            }
            let name = if self.check(Lexeme::String) {
                let token = self.advance().clone();
                match token.literal {
                    Some(Literal::Str(s)) => s,
                    _ => token.text,
                }
            } else {
                self.property_name()
                    .map_err(|_| self.expected("associative array key"))?
                    .text
            };
            self.consume(Lexeme::Colon, "':' after associative array key")?;
            let value = self.expression()?;
            members.push(AAMember { name, value });
            let newline = self.skip_newlines();
            if !self.match_kind(Lexeme::Comma) && !newline {
                break;
            }
        }
        let close = self.consume(Lexeme::RightBrace, "'}' to close associative array literal")?;
        Ok(Spanned::new(
            Expr::AALiteral(members),
            open.loc.merge(&close.loc),
        ))
    }
}
