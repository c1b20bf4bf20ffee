//! Unit tests for the AST model: type compatibility, sizes, symbol forms
//! and the textual rendering used by `--print-ast`.

use std::rc::Rc;

use crate::Position;

use super::{
    ast::{Function, FunctionArena, Parameter, Symbol, Variable},
    expressions::{BinaryOperator, Expr, UnaryOperator},
    statements::{Block, Stmt, StmtKind},
    types::{BasicTypeId, Type},
};

fn module() -> Rc<String> {
    Rc::new(String::from("test"))
}

#[test]
fn test_array_compatibility_requires_same_count() {
    let five = Type::array_of(Type::int64(), 5);
    let other_five = Type::array_of(Type::int64(), 5);
    let four = Type::array_of(Type::int64(), 4);
    let bools = Type::array_of(Type::bool(), 5);

    assert!(five.is_compatible_with(&other_five));
    assert!(!five.is_compatible_with(&four));
    assert!(!five.is_compatible_with(&bools));
}

#[test]
fn test_pointer_compatibility_is_covariant() {
    let a = Type::pointer_to(Type::array_of(Type::int64(), 3));
    let b = Type::pointer_to(Type::array_of(Type::int64(), 3));
    let c = Type::pointer_to(Type::int64());

    assert!(a.is_compatible_with(&b));
    assert!(!a.is_compatible_with(&c));
    assert!(!c.is_compatible_with(&Type::int64()));
}

#[test]
fn test_basic_compatibility_by_id() {
    assert!(Type::int64().is_compatible_with(&Type::Basic(BasicTypeId::Int64)));
    assert!(!Type::int64().is_compatible_with(&Type::Basic(BasicTypeId::U64)));
    assert!(!Type::named("int64", Position::null()).is_compatible_with(&Type::int64()));
}

#[test]
fn test_type_sizes() {
    assert_eq!(Type::int64().size(), 8);
    assert_eq!(Type::bool().size(), 8);
    assert_eq!(Type::pointer_to(Type::array_of(Type::int64(), 10)).size(), 8);
    assert_eq!(Type::array_of(Type::int64(), 5).size(), 40);
    assert_eq!(Type::array_of(Type::array_of(Type::bool(), 2), 3).size(), 48);
}

#[test]
fn test_type_display() {
    let ty = Type::pointer_to(Type::array_of(Type::int64(), 5));
    assert_eq!(ty.to_string(), "int64[5]*");
    assert_eq!(Type::named("foo", Position::null()).to_string(), "foo");
}

#[test]
fn test_symbol_forms() {
    let symbol = Symbol::new(module(), "fact");
    assert_eq!(symbol.qualified(), "test:fact");
    assert_eq!(symbol.asm(), "$test.fact");
}

#[test]
fn test_frame_size_sums_all_regions() {
    let mut function = Function::new(
        Symbol::new(module(), "f"),
        vec![Parameter {
            name: String::from("a"),
            ty: Type::int64(),
            position: Position::null(),
        }],
        Type::void(),
        Some(Block {
            statements: vec![],
            position: Position::null(),
        }),
        Position::null(),
    );
    for (name, ty) in [("a", Type::int64()), ("x", Type::array_of(Type::int64(), 2))] {
        function.variables.push(Variable {
            symbol: Symbol::new(module(), name),
            ty,
            position: Position::null(),
            stack_offset: None,
        });
    }
    function.stack_space_for_args = 16;
    function.temporary_space = 24;

    assert_eq!(function.locals().len(), 1);
    assert_eq!(function.locals_size(), 16);
    assert_eq!(function.frame_size(), 56);
}

#[test]
fn test_arena_indexing() {
    let mut arena = FunctionArena::new();
    let id = arena.push(Function::new(
        Symbol::new(module(), "main"),
        vec![],
        Type::void(),
        None,
        Position::null(),
    ));

    assert_eq!(arena.len(), 1);
    assert!(arena[id].is_extern());
    arena[id].is_tail_recursive = false;
    assert!(!arena.get(id).map(|f| f.is_tail_recursive).unwrap_or(true));
}

#[test]
fn test_expression_display() {
    let sum = Expr::binary(
        BinaryOperator::Add,
        Expr::variable("x", Position::null()),
        Expr::integer(1, Position::null()),
    );
    let index = Expr::binary(
        BinaryOperator::Index,
        Expr::variable("a", Position::null()),
        Expr::integer(2, Position::null()),
    );
    let negated = Expr::unary(
        UnaryOperator::LogicalNot,
        Expr::boolean(true, Position::null()),
        Position::null(),
    );

    assert_eq!(sum.to_string(), "(x + 1)");
    assert_eq!(index.to_string(), "a[2]");
    assert_eq!(negated.to_string(), "!true");
    assert!(index.is_addressable());
    assert!(!sum.is_addressable());
}

#[test]
fn test_block_render_indents() {
    let block = Block {
        statements: vec![Stmt::new(StmtKind::Return(None), Position::null())],
        position: Position::null(),
    };
    assert_eq!(block.render(0), "{\n    return;\n}");
}
