//! Type system definitions for the AST.
//!
//! This module defines the type system used in the language:
//!
//! - Basic types (fixed-size scalars identified by a `BasicTypeId`)
//! - Array types (element type and a fixed element count)
//! - Pointer types
//!
//! The parser produces `Type::Named` for every written type name; the
//! validator resolves each of those into a `Type::Basic` in place.

use std::fmt::Display;

use crate::Position;

/// Width of every stack slot and of every basic type in the current ABI.
pub const SLOT_SIZE: u64 = 8;

/// Largest array or stack frame, in bytes. Frame slots are addressed with
/// 32-bit displacements.
pub const MAX_OBJECT_SIZE: u64 = i32::MAX as u64;

/// The fixed set of built-in scalar types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasicTypeId {
    Int8,
    Int16,
    Int32,
    Int64,
    U8,
    U16,
    U32,
    U64,
    Bool,
    String,
    Void,
}

impl BasicTypeId {
    pub fn name(&self) -> &'static str {
        match self {
            BasicTypeId::Int8 => "int8",
            BasicTypeId::Int16 => "int16",
            BasicTypeId::Int32 => "int32",
            BasicTypeId::Int64 => "int64",
            BasicTypeId::U8 => "u8",
            BasicTypeId::U16 => "u16",
            BasicTypeId::U32 => "u32",
            BasicTypeId::U64 => "u64",
            BasicTypeId::Bool => "bool",
            BasicTypeId::String => "string",
            BasicTypeId::Void => "void",
        }
    }
}

/// A type name as written in the source, before resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeName {
    pub name: String,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    /// Unresolved name; never survives a successful validation.
    Named(TypeName),
    Basic(BasicTypeId),
    Array { element: Box<Type>, count: u64 },
    Pointer(Box<Type>),
}

impl Type {
    pub fn int64() -> Self {
        Type::Basic(BasicTypeId::Int64)
    }

    pub fn bool() -> Self {
        Type::Basic(BasicTypeId::Bool)
    }

    pub fn void() -> Self {
        Type::Basic(BasicTypeId::Void)
    }

    pub fn string() -> Self {
        Type::Basic(BasicTypeId::String)
    }

    pub fn pointer_to(pointee: Type) -> Self {
        Type::Pointer(Box::new(pointee))
    }

    pub fn array_of(element: Type, count: u64) -> Self {
        Type::Array {
            element: Box::new(element),
            count,
        }
    }

    pub fn named(name: &str, position: Position) -> Self {
        Type::Named(TypeName {
            name: name.to_string(),
            position,
        })
    }

    /// Structural compatibility: basic types by id, arrays by count and
    /// element, pointers by pointee.
    pub fn is_compatible_with(&self, other: &Type) -> bool {
        match (self, other) {
            (Type::Basic(a), Type::Basic(b)) => a == b,
            (
                Type::Array { element, count },
                Type::Array {
                    element: other_element,
                    count: other_count,
                },
            ) => count == other_count && element.is_compatible_with(other_element),
            (Type::Pointer(a), Type::Pointer(b)) => a.is_compatible_with(b),
            _ => false,
        }
    }

    /// Size in bytes of a value of this type.
    pub fn size(&self) -> u64 {
        match self {
            Type::Named(_) | Type::Basic(_) | Type::Pointer(_) => SLOT_SIZE,
            Type::Array { element, count } => element.size().saturating_mul(*count),
        }
    }

    pub fn is_basic(&self, id: BasicTypeId) -> bool {
        matches!(self, Type::Basic(basic) if *basic == id)
    }

    pub fn is_void(&self) -> bool {
        self.is_basic(BasicTypeId::Void)
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Type::Array { .. })
    }

    pub fn element(&self) -> Option<&Type> {
        match self {
            Type::Array { element, .. } => Some(element),
            _ => None,
        }
    }

    pub fn pointee(&self) -> Option<&Type> {
        match self {
            Type::Pointer(pointee) => Some(pointee),
            _ => None,
        }
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Named(type_name) => write!(f, "{}", type_name.name),
            Type::Basic(id) => write!(f, "{}", id.name()),
            Type::Array { element, count } => write!(f, "{}[{}]", element, count),
            Type::Pointer(pointee) => write!(f, "{}*", pointee),
        }
    }
}
