//! Semantic analysis module.
//!
//! Validation runs in two passes over the whole program:
//!
//! - The signature pass resolves return and argument types, assigns argument
//!   stack slots and registers every function in the shared `SymbolTable`.
//! - The body pass resolves names, checks types, lays out local stack slots,
//!   sizes the expression temporaries and detects tail recursion.
//!
//! Every defect is collected into an `ErrorCollector`; a subtree that fails
//! stops its own checks but its siblings are still validated.

pub mod symbol_table;
pub mod validator;
