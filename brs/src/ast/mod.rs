//! Abstract Syntax Tree definitions

mod expr;
mod span;
mod stmt;
mod types;

pub use expr::*;
pub use span::*;
pub use stmt::*;
pub use types::*;

/// Does `block` (or any block nested in it) define `label`?
///
/// Used by `goto` to decide which nested block to enter while searching.
pub fn block_contains_label(block: &[Statement], label: &str) -> bool {
    block.iter().any(|stmt| statement_contains_label(stmt, label))
}

pub fn statement_contains_label(stmt: &Statement, label: &str) -> bool {
    match &stmt.node {
        Stmt::Label { name } => name.key() == label,
        Stmt::If {
            then_branch,
            else_ifs,
            else_branch,
            ..
        } => {
            block_contains_label(then_branch, label)
                || else_ifs
                    .iter()
                    .any(|arm| block_contains_label(&arm.then_branch, label))
                || else_branch
                    .as_ref()
                    .is_some_and(|b| block_contains_label(b, label))
        }
        Stmt::For { body, .. } | Stmt::ForEach { body, .. } | Stmt::While { body, .. } => {
            block_contains_label(body, label)
        }
        Stmt::TryCatch {
            try_block,
            catch_block,
            ..
        } => block_contains_label(try_block, label) || block_contains_label(catch_block, label),
        _ => false,
    }
}
