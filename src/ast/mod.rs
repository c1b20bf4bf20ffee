/// AST (Abstract Syntax Tree) module
/// Contains all definitions related to the AST structure
///
/// Submodules:
/// - ast: modules, the function arena, symbols and variables
/// - expressions: the closed set of expression variants
/// - statements: the closed set of statement variants
/// - types: basic, array and pointer types and their compatibility rules
pub mod ast;
pub mod expressions;
pub mod statements;
pub mod types;

#[cfg(test)]
mod tests;
