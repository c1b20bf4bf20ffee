use std::slice::{Iter, IterMut};

use crate::Position;

use super::{ast::VariableId, expressions::Expr, types::Type};

/// An ordered statement list. Blocks do not open a scope: every function
/// has exactly one flat scope.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub statements: Vec<Stmt>,
    pub position: Position,
}

impl Block {
    pub fn iter(&self) -> Iter<'_, Stmt> {
        self.statements.iter()
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, Stmt> {
        self.statements.iter_mut()
    }

    pub fn render(&self, level: usize) -> String {
        let mut s = String::from("{\n");
        for statement in &self.statements {
            s.push_str(&indent(level + 1));
            s.push_str(&statement.render(level + 1));
            s.push('\n');
        }
        s.push_str(&indent(level));
        s.push('}');
        s
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    pub name: String,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub ty: Type,
    pub names: Vec<Identifier>,
    /// Set by the validator for declarations directly inside a function's
    /// outermost block.
    pub in_outer_block: bool,
}

/// One link of an `if` / `else if` / `else` chain. A plain `else` is a link
/// without a predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct If {
    pub predicate: Option<Expr>,
    pub block: Block,
    pub else_clause: Option<Box<If>>,
    pub position: Position,
}

impl If {
    fn render(&self, level: usize) -> String {
        let mut s = match &self.predicate {
            Some(predicate) => format!("if ({}) ", predicate),
            None => String::new(),
        };
        s.push_str(&self.block.render(level));
        if let Some(else_clause) = &self.else_clause {
            s.push_str(" else ");
            s.push_str(&else_clause.render(level));
        }
        s
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Assignment {
        lhs: Expr,
        rhs: Expr,
    },
    Declaration(Declaration),
    Return(Option<Expr>),
    /// A call evaluated for its side effects; the expression is always
    /// `ExprKind::Call`.
    Call(Expr),
    If(If),
    While {
        predicate: Expr,
        block: Block,
    },
    RangeFor {
        variable: Expr,
        start: Expr,
        end: Expr,
        block: Block,
    },
    ArrayFor {
        variable: Expr,
        array: Expr,
        block: Block,
        /// Hidden index local, allocated by the validator.
        counter: Option<VariableId>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub position: Position,
}

impl Stmt {
    pub fn new(kind: StmtKind, position: Position) -> Self {
        Stmt { kind, position }
    }

    pub fn render(&self, level: usize) -> String {
        match &self.kind {
            StmtKind::Assignment { lhs, rhs } => format!("{} = {};", lhs, rhs),
            StmtKind::Declaration(declaration) => {
                let names = declaration
                    .names
                    .iter()
                    .map(|id| id.name.as_str())
                    .collect::<Vec<&str>>()
                    .join(", ");
                format!("{} {};", declaration.ty, names)
            }
            StmtKind::Return(Some(expr)) => format!("return {};", expr),
            StmtKind::Return(None) => String::from("return;"),
            StmtKind::Call(call) => format!("{};", call),
            StmtKind::If(if_stmt) => if_stmt.render(level),
            StmtKind::While { predicate, block } => {
                format!("while ({}) {}", predicate, block.render(level))
            }
            StmtKind::RangeFor {
                variable,
                start,
                end,
                block,
            } => format!(
                "for ({} in {} .. {}) {}",
                variable,
                start,
                end,
                block.render(level)
            ),
            StmtKind::ArrayFor {
                variable,
                array,
                block,
                ..
            } => format!("for ({} in {}) {}", variable, array, block.render(level)),
        }
    }
}

fn indent(level: usize) -> String {
    "    ".repeat(level)
}
