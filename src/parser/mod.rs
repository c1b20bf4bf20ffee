//! Parser module for building an Abstract Syntax Tree (AST).
//!
//! This module contains the parser that transforms a stream of tokens
//! into a `Module`. It uses a Pratt parser for expressions with proper
//! operator precedence and handles:
//!
//! - Top-level items (imports, extern declarations, function definitions)
//! - Statement parsing (declarations, assignments, calls, control flow)
//! - Expression parsing (binary and unary ops, indexing, calls, literals)
//! - Type parsing for declarations and signatures
//!
//! The parser uses NUD (null denotation) and LED (left denotation) functions
//! for expression parsing with binding power for precedence handling.

pub mod expr;
pub mod lookups;
pub mod parser;
pub mod stmt;
pub mod types;

#[cfg(test)]
mod tests;
