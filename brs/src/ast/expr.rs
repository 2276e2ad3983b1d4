//! Expression AST nodes

use super::{Block, Spanned, ValueKind};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Expression with its source location
pub type Expression = Spanned<Expr>;

/// Literal value as written in source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Int32(i32),
    Int64(i64),
    Float(f32),
    Double(f64),
    Str(String),
    Bool(bool),
    Invalid,
}

/// Expression
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Expr {
    Literal(Literal),

    /// Variable reference
    Variable(Identifier),

    Binary {
        left: Box<Expression>,
        op: BinaryOp,
        right: Box<Expression>,
    },

    Unary {
        op: UnaryOp,
        right: Box<Expression>,
    },

    /// Parenthesized expression
    Grouping(Box<Expression>),

    /// Function call; `optional` for `f?(...)`-style chains
    Call {
        callee: Box<Expression>,
        args: Vec<Expression>,
        optional: bool,
    },

    /// `obj.name` or `obj?.name`
    DottedGet {
        obj: Box<Expression>,
        name: Identifier,
        optional: bool,
    },

    /// `obj[index]` or `obj?[index]`
    IndexedGet {
        obj: Box<Expression>,
        index: Box<Expression>,
        optional: bool,
    },

    /// Anonymous `function`/`sub`
    Function(Arc<FunctionExpr>),

    ArrayLiteral(Vec<Expression>),

    /// `{ key: value, ... }`
    AALiteral(Vec<AAMember>),
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    IntDiv,
    Mod,
    Pow,
    LeftShift,
    RightShift,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

impl std::fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::IntDiv => "\\",
            BinaryOp::Mod => "mod",
            BinaryOp::Pow => "^",
            BinaryOp::LeftShift => "<<",
            BinaryOp::RightShift => ">>",
            BinaryOp::Eq => "=",
            BinaryOp::NotEq => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        };
        write!(f, "{text}")
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
}

impl std::fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnaryOp::Neg => write!(f, "-"),
            UnaryOp::Plus => write!(f, "+"),
            UnaryOp::Not => write!(f, "not"),
        }
    }
}

/// A name as written in source. Lookups use the lowercased form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identifier {
    pub text: String,
    pub loc: super::Location,
}

impl Identifier {
    pub fn new(text: impl Into<String>, loc: super::Location) -> Self {
        Self {
            text: text.into(),
            loc,
        }
    }

    pub fn key(&self) -> String {
        self.text.to_ascii_lowercase()
    }
}

/// Associative-array literal member
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AAMember {
    pub name: String,
    pub value: Expression,
}

/// Function parameter: `name [= default] [as Type]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Param {
    pub name: Identifier,
    pub kind: ValueKind,
    pub default: Option<Expression>,
}

/// Body and signature of a named or anonymous function/sub
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionExpr {
    pub params: Vec<Param>,
    pub return_kind: ValueKind,
    pub body: Block,
    pub is_sub: bool,
    pub loc: super::Location,
}
