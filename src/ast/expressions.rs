use std::fmt::Display;

use crate::Position;

use super::{
    ast::{FunctionId, Symbol, VariableId},
    types::Type,
};

/// Binary operators, including array indexing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    LogicalOr,
    LogicalAnd,
    Equal,
    NotEqual,
    Greater,
    GreaterEq,
    Less,
    LessEq,
    Add,
    Sub,
    Div,
    Mul,
    Mod,
    Index,
}

impl BinaryOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOperator::LogicalOr => "||",
            BinaryOperator::LogicalAnd => "&&",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::Greater => ">",
            BinaryOperator::GreaterEq => ">=",
            BinaryOperator::Less => "<",
            BinaryOperator::LessEq => "<=",
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Div => "/",
            BinaryOperator::Mul => "*",
            BinaryOperator::Mod => "%",
            BinaryOperator::Index => "[]",
        }
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOperator::LogicalOr | BinaryOperator::LogicalAnd)
    }

    pub fn is_relational(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Equal
                | BinaryOperator::NotEqual
                | BinaryOperator::Greater
                | BinaryOperator::GreaterEq
                | BinaryOperator::Less
                | BinaryOperator::LessEq
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    LogicalNot,
    Minus,
    AddressOf,
    Dereference,
}

impl UnaryOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnaryOperator::LogicalNot => "!",
            UnaryOperator::Minus => "-",
            UnaryOperator::AddressOf => "&",
            UnaryOperator::Dereference => "*",
        }
    }
}

/// Identifies one call site within a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallId(pub usize);

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Boolean(bool),
    Integer(i64),
    /// `index` addresses the owning module's string pool.
    String { value: Vec<u8>, index: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableRef {
    pub name: String,
    /// Filled in by the validator.
    pub variable: Option<VariableId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub id: CallId,
    pub symbol: Symbol,
    pub arguments: Vec<Expr>,
    /// Filled in by the validator.
    pub function: Option<FunctionId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Binary {
        operator: BinaryOperator,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        operator: UnaryOperator,
        operand: Box<Expr>,
    },
    /// Dereference inserted by the validator when a pointer to an array is
    /// indexed directly.
    ImplicitDeref(Box<Expr>),
    Variable(VariableRef),
    Literal(Literal),
    Call(FunctionCall),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub position: Position,
    /// `None` until validation of this node succeeds.
    pub ty: Option<Type>,
    /// Scratch stack bytes needed to evaluate this expression.
    pub temporary_space: u64,
}

impl Expr {
    pub fn new(kind: ExprKind, position: Position) -> Self {
        Expr {
            kind,
            position,
            ty: None,
            temporary_space: 0,
        }
    }

    pub fn binary(operator: BinaryOperator, lhs: Expr, rhs: Expr) -> Self {
        let position = lhs.position.clone();
        Expr::new(
            ExprKind::Binary {
                operator,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            position,
        )
    }

    pub fn unary(operator: UnaryOperator, operand: Expr, position: Position) -> Self {
        Expr::new(
            ExprKind::Unary {
                operator,
                operand: Box::new(operand),
            },
            position,
        )
    }

    pub fn variable(name: &str, position: Position) -> Self {
        Expr::new(
            ExprKind::Variable(VariableRef {
                name: name.to_string(),
                variable: None,
            }),
            position,
        )
    }

    pub fn integer(value: i64, position: Position) -> Self {
        Expr::new(ExprKind::Literal(Literal::Integer(value)), position)
    }

    pub fn boolean(value: bool, position: Position) -> Self {
        Expr::new(ExprKind::Literal(Literal::Boolean(value)), position)
    }

    pub fn get_type(&self) -> Option<&Type> {
        self.ty.as_ref()
    }

    /// Whether this expression denotes a storage location.
    pub fn is_addressable(&self) -> bool {
        match &self.kind {
            ExprKind::Variable(_) | ExprKind::ImplicitDeref(_) => true,
            ExprKind::Unary { operator, .. } => *operator == UnaryOperator::Dereference,
            ExprKind::Binary { operator, .. } => *operator == BinaryOperator::Index,
            ExprKind::Literal(_) | ExprKind::Call(_) => false,
        }
    }

    pub fn as_call(&self) -> Option<&FunctionCall> {
        match &self.kind {
            ExprKind::Call(call) => Some(call),
            _ => None,
        }
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Boolean(value) => write!(f, "{}", value),
            Literal::Integer(value) => write!(f, "{}", value),
            Literal::String { value, .. } => {
                write!(f, "\"")?;
                for &byte in value {
                    match byte {
                        b'\n' => write!(f, "\\n")?,
                        b'\t' => write!(f, "\\t")?,
                        b'\r' => write!(f, "\\r")?,
                        b'\\' => write!(f, "\\\\")?,
                        b'"' => write!(f, "\\\"")?,
                        0x20..=0x7e => write!(f, "{}", byte as char)?,
                        _ => write!(f, "\\x{:02x}", byte)?,
                    }
                }
                write!(f, "\"")
            }
        }
    }
}

impl Display for FunctionCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}(", self.symbol.qualified())?;
        for (i, argument) in self.arguments.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", argument)?;
        }
        write!(f, ")")
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ExprKind::Binary {
                operator: BinaryOperator::Index,
                lhs,
                rhs,
            } => write!(f, "{}[{}]", lhs, rhs),
            ExprKind::Binary { operator, lhs, rhs } => {
                write!(f, "({} {} {})", lhs, operator.as_str(), rhs)
            }
            ExprKind::Unary { operator, operand } => write!(f, "{}{}", operator.as_str(), operand),
            ExprKind::ImplicitDeref(inner) => write!(f, "{}", inner),
            ExprKind::Variable(variable) => write!(f, "{}", variable.name),
            ExprKind::Literal(literal) => write!(f, "{}", literal),
            ExprKind::Call(call) => write!(f, "{}", call),
        }
    }
}
