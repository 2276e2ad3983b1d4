//! Parser tests

use crate::ast::{BinaryOp, Expr, Literal, PrintItem, Statement, Stmt, UnaryOp, ValueKind};
use crate::lexer::scan;
use crate::parser::{ParseResults, parse};

/// Helper to scan and parse a source string
fn parse_source(source: &str) -> ParseResults {
    let scanned = scan(source, "test.brs");
    assert!(scanned.errors.is_empty(), "lex errors: {:?}", scanned.errors);
    parse(&scanned.tokens)
}

/// Helper to parse and expect success
fn parse_ok(source: &str) -> Vec<Statement> {
    let results = parse_source(source);
    assert!(results.errors.is_empty(), "parse errors: {:?}", results.errors);
    results.statements
}

/// Helper returning the error messages
fn parse_errors(source: &str) -> Vec<String> {
    parse_source(source)
        .errors
        .iter()
        .map(|e| e.message().to_string())
        .collect()
}

/// Body of the first declared function
fn function_body(statements: &[Statement]) -> &[Statement] {
    match &statements[0].node {
        Stmt::Function { func, .. } => &func.body,
        other => panic!("Expected function, got {other:?}"),
    }
}

// ============================================
// Assignments
// ============================================

#[test]
fn test_parse_simple_assignment() {
    let stmts = parse_ok("a = 1 + 2");
    assert_eq!(stmts.len(), 1);
    match &stmts[0].node {
        Stmt::Assignment { name, value } => {
            assert_eq!(name.text, "a");
            assert!(matches!(
                value.node,
                Expr::Binary {
                    op: BinaryOp::Add,
                    ..
                }
            ));
        }
        other => panic!("Expected assignment, got {other:?}"),
    }
}

#[test]
fn test_parse_compound_assignment_desugars() {
    let stmts = parse_ok("total += 5");
    match &stmts[0].node {
        Stmt::Assignment { name, value } => {
            assert_eq!(name.key(), "total");
            match &value.node {
                Expr::Binary { left, op, .. } => {
                    assert_eq!(*op, BinaryOp::Add);
                    assert!(matches!(&left.node, Expr::Variable(id) if id.text == "total"));
                }
                other => panic!("Expected binary, got {other:?}"),
            }
        }
        other => panic!("Expected assignment, got {other:?}"),
    }
}

#[test]
fn test_parse_all_compound_operators() {
    for (src, op) in [
        ("x -= 1", BinaryOp::Sub),
        ("x *= 1", BinaryOp::Mul),
        ("x /= 1", BinaryOp::Div),
        ("x \\= 1", BinaryOp::IntDiv),
        ("x <<= 1", BinaryOp::LeftShift),
        ("x >>= 1", BinaryOp::RightShift),
    ] {
        let stmts = parse_ok(src);
        match &stmts[0].node {
            Stmt::Assignment { value, .. } => {
                assert!(matches!(&value.node, Expr::Binary { op: o, .. } if *o == op), "{src}");
            }
            other => panic!("Expected assignment for {src}, got {other:?}"),
        }
    }
}

#[test]
fn test_parse_dotted_and_indexed_set() {
    let stmts = parse_ok("m.name = \"x\"\narr[2] = 5");
    assert!(matches!(&stmts[0].node, Stmt::DottedSet { name, .. } if name.text == "name"));
    assert!(matches!(&stmts[1].node, Stmt::IndexedSet { .. }));
}

#[test]
fn test_parse_increment_decrement() {
    let stmts = parse_ok("i++\nm.count--");
    assert!(matches!(&stmts[0].node, Stmt::Increment { decrement: false, .. }));
    assert!(matches!(&stmts[1].node, Stmt::Increment { decrement: true, .. }));
}

#[test]
fn test_parse_designator_names() {
    let stmts = parse_ok("name$ = \"x\"\ncount% = 3");
    assert!(matches!(&stmts[0].node, Stmt::Assignment { name, .. } if name.text == "name$"));
    assert!(matches!(&stmts[1].node, Stmt::Assignment { name, .. } if name.text == "count%"));
}

// ============================================
// Expressions
// ============================================

fn assigned_value(source: &str) -> Expr {
    let stmts = parse_ok(source);
    match &stmts[0].node {
        Stmt::Assignment { value, .. } => value.node.clone(),
        other => panic!("Expected assignment, got {other:?}"),
    }
}

#[test]
fn test_parse_precedence_mul_over_add() {
    match assigned_value("x = 1 + 2 * 3") {
        Expr::Binary { op, right, .. } => {
            assert_eq!(op, BinaryOp::Add);
            assert!(matches!(right.node, Expr::Binary { op: BinaryOp::Mul, .. }));
        }
        other => panic!("{other:?}"),
    }
}

#[test]
fn test_parse_left_associative_subtraction() {
    match assigned_value("x = 10 - 3 - 2") {
        Expr::Binary { op, left, .. } => {
            assert_eq!(op, BinaryOp::Sub);
            assert!(matches!(left.node, Expr::Binary { op: BinaryOp::Sub, .. }));
        }
        other => panic!("{other:?}"),
    }
}

#[test]
fn test_parse_and_binds_tighter_than_or() {
    match assigned_value("x = a or b and c") {
        Expr::Binary { op, right, .. } => {
            assert_eq!(op, BinaryOp::Or);
            assert!(matches!(right.node, Expr::Binary { op: BinaryOp::And, .. }));
        }
        other => panic!("{other:?}"),
    }
}

#[test]
fn test_parse_not_covers_comparison() {
    match assigned_value("x = not a = b") {
        Expr::Unary { op, right } => {
            assert_eq!(op, UnaryOp::Not);
            assert!(matches!(right.node, Expr::Binary { op: BinaryOp::Eq, .. }));
        }
        other => panic!("{other:?}"),
    }
}

#[test]
fn test_parse_comparison_in_expression_is_equality() {
    assert!(matches!(
        assigned_value("x = a = b"),
        Expr::Binary { op: BinaryOp::Eq, .. }
    ));
}

#[test]
fn test_parse_unary_minus() {
    match assigned_value("x = -5") {
        Expr::Unary { op, right } => {
            assert_eq!(op, UnaryOp::Neg);
            assert!(matches!(right.node, Expr::Literal(Literal::Int32(5))));
        }
        other => panic!("{other:?}"),
    }
}

#[test]
fn test_parse_mod_keyword_operator() {
    assert!(matches!(
        assigned_value("x = 7 mod 3"),
        Expr::Binary { op: BinaryOp::Mod, .. }
    ));
}

#[test]
fn test_parse_grouping() {
    match assigned_value("x = (1 + 2) * 3") {
        Expr::Binary { op, left, .. } => {
            assert_eq!(op, BinaryOp::Mul);
            assert!(matches!(left.node, Expr::Grouping(_)));
        }
        other => panic!("{other:?}"),
    }
}

#[test]
fn test_parse_call_chain() {
    match assigned_value("x = obj.items[0].name(1, 2)") {
        Expr::Call { callee, args, .. } => {
            assert_eq!(args.len(), 2);
            assert!(matches!(callee.node, Expr::DottedGet { .. }));
        }
        other => panic!("{other:?}"),
    }
}

#[test]
fn test_parse_optional_chaining() {
    match assigned_value("x = a?.b") {
        Expr::DottedGet { optional, .. } => assert!(optional),
        other => panic!("{other:?}"),
    }
    match assigned_value("x = a?[1]") {
        Expr::IndexedGet { optional, .. } => assert!(optional),
        other => panic!("{other:?}"),
    }
}

#[test]
fn test_parse_multi_index_nests() {
    match assigned_value("x = grid[1, 2]") {
        Expr::IndexedGet { obj, .. } => assert!(matches!(obj.node, Expr::IndexedGet { .. })),
        other => panic!("{other:?}"),
    }
}

#[test]
fn test_parse_keyword_property_name() {
    assert!(matches!(
        assigned_value("x = m.next"),
        Expr::DottedGet { name, .. } if name.text == "next"
    ));
}

#[test]
fn test_parse_array_literal_multiline() {
    match assigned_value("x = [\n  1,\n  2\n  3\n]") {
        Expr::ArrayLiteral(elements) => assert_eq!(elements.len(), 3),
        other => panic!("{other:?}"),
    }
}

#[test]
fn test_parse_aa_literal() {
    match assigned_value("x = { name: \"n\", \"quoted key\": 2,\n  nested: { a: 1 } }") {
        Expr::AALiteral(members) => {
            let names: Vec<_> = members.iter().map(|m| m.name.as_str()).collect();
            assert_eq!(names, vec!["name", "quoted key", "nested"]);
        }
        other => panic!("{other:?}"),
    }
}

#[test]
fn test_parse_anonymous_function() {
    match assigned_value("f = function(a as Integer) as Integer\n  return a * 2\nend function") {
        Expr::Function(func) => {
            assert_eq!(func.params.len(), 1);
            assert_eq!(func.params[0].kind, ValueKind::Int32);
            assert_eq!(func.return_kind, ValueKind::Int32);
            assert_eq!(func.body.len(), 1);
        }
        other => panic!("{other:?}"),
    }
}

// ============================================
// Functions
// ============================================

#[test]
fn test_parse_function_declaration() {
    let stmts = parse_ok("function add(a as Integer, b = 2 as Integer) as Integer\n  return a + b\nend function");
    match &stmts[0].node {
        Stmt::Function { name, func } => {
            assert_eq!(name.text, "add");
            assert_eq!(func.params.len(), 2);
            assert!(func.params[0].default.is_none());
            assert!(func.params[1].default.is_some());
            assert_eq!(func.return_kind, ValueKind::Int32);
            assert!(!func.is_sub);
        }
        other => panic!("{other:?}"),
    }
}

#[test]
fn test_parse_sub_defaults_to_void() {
    let stmts = parse_ok("sub main()\nend sub");
    match &stmts[0].node {
        Stmt::Function { func, .. } => {
            assert!(func.is_sub);
            assert_eq!(func.return_kind, ValueKind::Void);
        }
        other => panic!("{other:?}"),
    }
}

#[test]
fn test_parse_function_defaults_to_dynamic() {
    let stmts = parse_ok("function f(x)\nend function");
    match &stmts[0].node {
        Stmt::Function { func, .. } => {
            assert_eq!(func.return_kind, ValueKind::Dynamic);
            assert_eq!(func.params[0].kind, ValueKind::Dynamic);
        }
        other => panic!("{other:?}"),
    }
}

#[test]
fn test_parse_param_designator_type() {
    let stmts = parse_ok("sub f(name$, count%)\nend sub");
    match &stmts[0].node {
        Stmt::Function { func, .. } => {
            assert_eq!(func.params[0].kind, ValueKind::String);
            assert_eq!(func.params[1].kind, ValueKind::Int32);
        }
        other => panic!("{other:?}"),
    }
}

#[test]
fn test_parse_one_word_end_keywords() {
    let stmts = parse_ok("function f()\n  if true then\n    x = 1\n  endif\nendfunction");
    assert_eq!(function_body(&stmts).len(), 1);
}

#[test]
fn test_required_after_optional_is_error() {
    let errors = parse_errors("sub f(a = 1, b)\nend sub");
    assert!(errors[0].contains("comes after arguments with default values"));
}

// ============================================
// Control flow
// ============================================

#[test]
fn test_parse_block_if_else_if_else() {
    let stmts = parse_ok("if a then\n  x = 1\nelse if b\n  x = 2\nelse\n  x = 3\nend if");
    match &stmts[0].node {
        Stmt::If {
            then_branch,
            else_ifs,
            else_branch,
            ..
        } => {
            assert_eq!(then_branch.len(), 1);
            assert_eq!(else_ifs.len(), 1);
            assert_eq!(else_branch.as_ref().map(Vec::len), Some(1));
        }
        other => panic!("{other:?}"),
    }
}

#[test]
fn test_parse_single_line_if() {
    let stmts = parse_ok("if x > 1 then y = 1 : z = 2 else y = 0\nw = 1");
    assert_eq!(stmts.len(), 2);
    match &stmts[0].node {
        Stmt::If {
            then_branch,
            else_branch,
            ..
        } => {
            assert_eq!(then_branch.len(), 2);
            assert_eq!(else_branch.as_ref().map(Vec::len), Some(1));
        }
        other => panic!("{other:?}"),
    }
}

#[test]
fn test_parse_single_line_if_with_return() {
    let stmts = parse_ok("function f(x)\n  if x then return 1 else return 2\nend function");
    assert!(matches!(function_body(&stmts)[0].node, Stmt::If { .. }));
}

#[test]
fn test_parse_for_loop_with_step() {
    let stmts = parse_ok("for i = 10 to 1 step -2\n  print i\nnext i");
    match &stmts[0].node {
        Stmt::For {
            counter, step, body, ..
        } => {
            assert_eq!(counter.text, "i");
            assert!(step.is_some());
            assert_eq!(body.len(), 1);
        }
        other => panic!("{other:?}"),
    }
}

#[test]
fn test_parse_for_each() {
    let stmts = parse_ok("for each item in list\n  print item\nend for");
    assert!(matches!(&stmts[0].node, Stmt::ForEach { item, .. } if item.text == "item"));
}

#[test]
fn test_parse_while_with_exit() {
    let stmts = parse_ok("while true\n  exit while\nend while");
    match &stmts[0].node {
        Stmt::While { body, .. } => assert!(matches!(body[0].node, Stmt::ExitWhile)),
        other => panic!("{other:?}"),
    }
}

#[test]
fn test_parse_continue_statements() {
    let stmts = parse_ok("for i = 1 to 2\n  continue for\nend for\nwhile x\n  continue while\nend while");
    match (&stmts[0].node, &stmts[1].node) {
        (Stmt::For { body: a, .. }, Stmt::While { body: b, .. }) => {
            assert!(matches!(a[0].node, Stmt::ContinueFor));
            assert!(matches!(b[0].node, Stmt::ContinueWhile));
        }
        other => panic!("{other:?}"),
    }
}

#[test]
fn test_parse_goto_and_label() {
    let stmts = parse_ok("goto skip\nprint 1\nskip:\nprint 2");
    assert!(matches!(&stmts[0].node, Stmt::Goto { label } if label.text == "skip"));
    assert!(matches!(&stmts[2].node, Stmt::Label { name } if name.text == "skip"));
}

#[test]
fn test_parse_try_catch_throw() {
    let stmts = parse_ok("try\n  throw \"bad\"\ncatch e\n  print e.message\nend try");
    match &stmts[0].node {
        Stmt::TryCatch {
            try_block,
            error_binding,
            catch_block,
        } => {
            assert!(matches!(try_block[0].node, Stmt::Throw { .. }));
            assert_eq!(error_binding.text, "e");
            assert_eq!(catch_block.len(), 1);
        }
        other => panic!("{other:?}"),
    }
}

#[test]
fn test_parse_end_and_stop() {
    let stmts = parse_ok("stop\nend");
    assert!(matches!(stmts[0].node, Stmt::Stop));
    assert!(matches!(stmts[1].node, Stmt::End));
}

#[test]
fn test_parse_dim() {
    let stmts = parse_ok("dim grid[3, 4]");
    assert!(matches!(&stmts[0].node, Stmt::Dim { dimensions, .. } if dimensions.len() == 2));
}

// ============================================
// Print
// ============================================

#[test]
fn test_parse_print_separators() {
    let stmts = parse_ok("print \"a\"; 1, 2;");
    match &stmts[0].node {
        Stmt::Print { items } => {
            assert_eq!(items.len(), 6);
            assert!(matches!(items[1], PrintItem::Semicolon));
            assert!(matches!(items[3], PrintItem::Comma));
            assert!(matches!(items[5], PrintItem::Semicolon));
        }
        other => panic!("{other:?}"),
    }
}

#[test]
fn test_parse_question_mark_print() {
    let stmts = parse_ok("? 42");
    assert!(matches!(&stmts[0].node, Stmt::Print { items } if items.len() == 1));
}

#[test]
fn test_parse_colon_separated_statements() {
    let stmts = parse_ok("a = 1 : b = 2 : print a");
    assert_eq!(stmts.len(), 3);
}

// ============================================
// Errors and recovery
// ============================================

#[test]
fn test_bare_expression_is_error() {
    let errors = parse_errors("1 + 2");
    assert_eq!(
        errors,
        vec!["Expected statement or function call, but received an expression".to_string()]
    );
}

#[test]
fn test_recovers_and_reports_all_errors() {
    let results = parse_source("a = \nb = 2\nc = )\nd = 4");
    assert_eq!(results.errors.len(), 2);
    let names: Vec<_> = results
        .statements
        .iter()
        .filter_map(|s| match &s.node {
            Stmt::Assignment { name, .. } => Some(name.text.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(names, vec!["b", "d"]);
}

#[test]
fn test_missing_end_if_reports_end_of_file() {
    let errors = parse_errors("if x then\n  y = 1\n");
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("'end if'"));
    assert!(errors[0].contains("end of file"));
}

#[test]
fn test_mismatched_block_end() {
    let errors = parse_errors("sub main()\n  while x\n  end sub");
    assert!(errors.iter().any(|e| e.contains("'end while'")));
}

#[test]
fn test_error_location_points_at_token() {
    let results = parse_source("x = 1\ny = * 2");
    assert_eq!(results.errors.len(), 1);
    let loc = results.errors[0].location().unwrap();
    assert_eq!((loc.start.line, loc.start.column), (2, 4));
}

#[test]
fn test_stray_block_end_is_error() {
    let errors = parse_errors("x = 1\nend while\ny = 2");
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("Unexpected"));
}

#[test]
fn test_statement_locations() {
    let stmts = parse_ok("a = 1\nprint a");
    assert_eq!(stmts[0].loc.start.line, 1);
    assert_eq!(stmts[1].loc.start.line, 2);
    assert_eq!(stmts[1].loc.to_string(), "test.brs(2,0-7)");
}
