//! Unit tests for the parser module.
//!
//! Covers top-level items, declarations, control flow, expression
//! precedence, calls, the string pool and syntax errors.

use std::rc::Rc;

use super::parser::parse;
use crate::{
    ast::{
        ast::{FunctionArena, Module},
        expressions::{BinaryOperator, ExprKind, Literal, UnaryOperator},
        statements::StmtKind,
        types::Type,
    },
    errors::errors::Error,
    lexer::lexer::tokenize,
};

fn parse_source(source: &str) -> Result<(Module, FunctionArena), Error> {
    let tokens = tokenize(source.to_string(), Some("test".to_string()))?;
    let mut arena = FunctionArena::new();
    let module = parse(tokens, Rc::new("test".to_string()), &mut arena)?;
    Ok((module, arena))
}

fn body_of(source: &str) -> Vec<StmtKind> {
    let (module, arena) = parse_source(source).unwrap();
    let function = &arena[module.functions[0]];
    function
        .block
        .as_ref()
        .unwrap()
        .statements
        .iter()
        .map(|stmt| stmt.kind.clone())
        .collect()
}

#[test]
fn test_parse_function_definition() {
    let (module, arena) = parse_source("int64 add(int64 a, int64 b) { return a + b; }").unwrap();

    assert_eq!(module.functions.len(), 1);
    let function = &arena[module.functions[0]];
    assert_eq!(function.symbol.qualified(), "test:add");
    assert_eq!(function.arguments.len(), 2);
    assert_eq!(function.arguments[1].name, "b");
    assert_eq!(function.return_type.to_string(), "int64");
    assert!(!function.is_extern());
}

#[test]
fn test_parse_imports_and_extern() {
    let (module, arena) =
        parse_source("import \"util\";\nimport asm \"rt.s\";\nextern void putchar(int64 c);")
            .unwrap();

    assert_eq!(module.imports.len(), 2);
    assert_eq!(module.imports[0].path, "util");
    assert!(!module.imports[0].is_assembly);
    assert_eq!(module.imports[1].path, "rt.s");
    assert!(module.imports[1].is_assembly);
    assert!(arena[module.functions[0]].is_extern());
}

#[test]
fn test_parse_declarations_with_suffixes() {
    let body = body_of("void main() { int64 x, y; int64[5]* pa; bool[2][3] grid; }");

    match &body[0] {
        StmtKind::Declaration(declaration) => {
            let names: Vec<&str> = declaration.names.iter().map(|n| n.name.as_str()).collect();
            assert_eq!(names, vec!["x", "y"]);
        }
        other => panic!("expected declaration, got {:?}", other),
    }
    match &body[1] {
        StmtKind::Declaration(declaration) => {
            assert_eq!(declaration.ty.to_string(), "int64[5]*");
            assert!(matches!(declaration.ty, Type::Pointer(_)));
        }
        other => panic!("expected declaration, got {:?}", other),
    }
    match &body[2] {
        StmtKind::Declaration(declaration) => {
            assert_eq!(declaration.ty.to_string(), "bool[2][3]");
            assert_eq!(declaration.ty.size(), 48);
        }
        other => panic!("expected declaration, got {:?}", other),
    }
}

#[test]
fn test_parse_assignment_targets() {
    let body = body_of("void main() { a[0] = 1; *p = 2; x = y; }");

    for stmt in &body {
        assert!(matches!(stmt, StmtKind::Assignment { .. }));
    }
    match &body[1] {
        StmtKind::Assignment { lhs, .. } => assert!(matches!(
            lhs.kind,
            ExprKind::Unary {
                operator: UnaryOperator::Dereference,
                ..
            }
        )),
        _ => unreachable!(),
    }
}

#[test]
fn test_parse_precedence() {
    let body = body_of("void main() { x = 1 + 2 * 3; b = x < 1 && !c || d; }");

    match &body[0] {
        StmtKind::Assignment { rhs, .. } => assert_eq!(rhs.to_string(), "(1 + (2 * 3))"),
        _ => unreachable!(),
    }
    match &body[1] {
        StmtKind::Assignment { rhs, .. } => {
            assert_eq!(rhs.to_string(), "(((x < 1) && !c) || d)")
        }
        _ => unreachable!(),
    }
}

#[test]
fn test_parse_unary_binds_tighter_than_binary() {
    let body = body_of("void main() { x = -a - b; y = *p * 2; z = &a[1]; }");

    match &body[0] {
        StmtKind::Assignment { rhs, .. } => assert_eq!(rhs.to_string(), "(-a - b)"),
        _ => unreachable!(),
    }
    match &body[1] {
        StmtKind::Assignment { rhs, .. } => assert_eq!(rhs.to_string(), "(*p * 2)"),
        _ => unreachable!(),
    }
    match &body[2] {
        StmtKind::Assignment { rhs, .. } => assert_eq!(rhs.to_string(), "&a[1]"),
        _ => unreachable!(),
    }
}

#[test]
fn test_parse_calls_get_unique_ids() {
    let body = body_of("void main() { f(1, g(2)); util:h(); }");

    let (outer, inner) = match &body[0] {
        StmtKind::Call(expr) => {
            let call = expr.as_call().unwrap();
            assert_eq!(call.symbol.qualified(), "test:f");
            (call.id, call.arguments[1].as_call().unwrap().id)
        }
        _ => unreachable!(),
    };
    assert_ne!(outer, inner);

    match &body[1] {
        StmtKind::Call(expr) => {
            assert_eq!(expr.as_call().unwrap().symbol.qualified(), "util:h");
            assert_eq!(expr.as_call().unwrap().symbol.asm(), "$util.h");
        }
        _ => unreachable!(),
    }
}

#[test]
fn test_parse_string_pool() {
    let (module, arena) = parse_source("void main() { s = \"a\"; t = \"bc\"; }").unwrap();

    assert_eq!(module.strings, vec![b"a".to_vec(), b"bc".to_vec()]);
    let block = arena[module.functions[0]].block.as_ref().unwrap();
    match &block.statements[1].kind {
        StmtKind::Assignment { rhs, .. } => assert!(matches!(
            rhs.kind,
            ExprKind::Literal(Literal::String { index: 1, .. })
        )),
        _ => unreachable!(),
    }
}

#[test]
fn test_parse_if_chain() {
    let body = body_of("void main() { if (a) { } else if (b) { } else { x = 1; } }");

    match &body[0] {
        StmtKind::If(if_stmt) => {
            assert!(if_stmt.predicate.is_some());
            let second = if_stmt.else_clause.as_ref().unwrap();
            assert!(second.predicate.is_some());
            let last = second.else_clause.as_ref().unwrap();
            assert!(last.predicate.is_none());
            assert_eq!(last.block.statements.len(), 1);
            assert!(last.else_clause.is_none());
        }
        other => panic!("expected if, got {:?}", other),
    }
}

#[test]
fn test_parse_loops() {
    let body = body_of(
        "void main() { while (x < 10) { x = x + 1; } for (i in 0 .. n) { } for (v in arr) { } }",
    );

    assert!(matches!(body[0], StmtKind::While { .. }));
    match &body[1] {
        StmtKind::RangeFor { start, end, .. } => {
            assert_eq!(start.to_string(), "0");
            assert_eq!(end.to_string(), "n");
        }
        other => panic!("expected range for, got {:?}", other),
    }
    assert!(matches!(
        body[2],
        StmtKind::ArrayFor { counter: None, .. }
    ));
}

#[test]
fn test_parse_return_forms() {
    let body = body_of("void main() { return; return f(1); }");

    assert!(matches!(body[0], StmtKind::Return(None)));
    match &body[1] {
        StmtKind::Return(Some(expr)) => assert!(expr.as_call().is_some()),
        _ => unreachable!(),
    }
}

#[test]
fn test_parse_index_expression() {
    let body = body_of("void main() { x = a[i + 1][2]; }");

    match &body[0] {
        StmtKind::Assignment { rhs, .. } => match &rhs.kind {
            ExprKind::Binary { operator, lhs, .. } => {
                assert_eq!(*operator, BinaryOperator::Index);
                assert_eq!(lhs.to_string(), "a[(i + 1)]");
            }
            _ => panic!("expected index"),
        },
        _ => unreachable!(),
    }
}

#[test]
fn test_parse_missing_semicolon() {
    let error = parse_source("void main() { x = 1 }").unwrap_err();
    assert_eq!(error.get_error_name(), "UnexpectedToken");
}

#[test]
fn test_parse_bare_expression_rejected() {
    let error = parse_source("void main() { x + 1; }").unwrap_err();
    assert_eq!(error.get_error_name(), "UnexpectedTokenDetailed");
}

#[test]
fn test_parse_number_overflow() {
    let error = parse_source("void main() { x = 99999999999999999999; }").unwrap_err();
    assert_eq!(error.get_error_name(), "NumberParseError");
}

#[test]
fn test_parse_oversized_array() {
    let source = "void main() { int64[4611686018427387904] a; return; }";
    let error = parse_source(source).unwrap_err();
    assert_eq!(error.get_error_name(), "ArrayTooLarge");
    assert_eq!(error.get_position().0, 20);

    // The limit applies to the whole nested array, not each dimension.
    let error = parse_source("void main() { int64[65536][65536] a; return; }").unwrap_err();
    assert_eq!(error.to_string(), "Array type int64[65536][65536] is too large");

    assert!(parse_source("void main() { int64[268435455] a; return; }").is_ok());
}

#[test]
fn test_parse_string_literal_bytes() {
    let (module, _) = parse_source(r#"void main() { s = "\xff\x00a\n"; }"#).unwrap();
    assert_eq!(module.strings, vec![vec![0xff, 0x00, b'a', b'\n']]);
}

#[test]
fn test_parse_error_leaves_arena_untouched() {
    let tokens = tokenize("void a() { } void b( {".to_string(), None).unwrap();
    let mut arena = FunctionArena::new();
    assert!(parse(tokens, Rc::new("test".to_string()), &mut arena).is_err());
    assert!(arena.is_empty());
}
