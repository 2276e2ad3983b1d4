//! Statement AST nodes

use super::{Expression, FunctionExpr, Identifier, Spanned};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Statement with its source location
pub type Statement = Spanned<Stmt>;

/// A sequence of statements
pub type Block = Vec<Statement>;

/// Statement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Stmt {
    /// `name = value`; compound assignments are desugared by the parser
    Assignment { name: Identifier, value: Expression },

    /// `dim name[d1, d2, ...]`
    Dim { name: Identifier, dimensions: Vec<Expression> },

    /// Expression evaluated for its side effects (a call)
    Expression(Expression),

    ExitFor,
    ExitWhile,
    ContinueFor,
    ContinueWhile,

    /// Named `function`/`sub` declaration
    Function { name: Identifier, func: Arc<FunctionExpr> },

    If {
        condition: Expression,
        then_branch: Block,
        else_ifs: Vec<ElseIf>,
        else_branch: Option<Block>,
    },

    /// `target++` / `target--`
    Increment { target: Expression, decrement: bool },

    Print { items: Vec<PrintItem> },

    Goto { label: Identifier },

    Label { name: Identifier },

    Return { value: Option<Expression> },

    End,

    Stop,

    For {
        counter: Identifier,
        start: Expression,
        end: Expression,
        step: Option<Expression>,
        body: Block,
    },

    ForEach {
        item: Identifier,
        target: Expression,
        body: Block,
    },

    While { condition: Expression, body: Block },

    /// `obj.name = value`
    DottedSet {
        obj: Expression,
        name: Identifier,
        value: Expression,
    },

    /// `obj[index] = value`
    IndexedSet {
        obj: Expression,
        index: Expression,
        value: Expression,
    },

    TryCatch {
        try_block: Block,
        error_binding: Identifier,
        catch_block: Block,
    },

    Throw { value: Expression },
}

/// `else if` arm of an `if` statement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElseIf {
    pub condition: Expression,
    pub then_branch: Block,
}

/// Element of a `print` list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PrintItem {
    Expr(Expression),
    /// `,` pads to the next print zone
    Comma,
    /// `;` joins without spacing
    Semicolon,
}
