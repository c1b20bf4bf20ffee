//! Code generation module for the compiler.
//!
//! This module turns a validated module into NASM x86-64 assembly text. It
//! handles:
//!
//! - Function frames, prologues and the shared return path
//! - Expression evaluation into `rax` with value/address modes
//! - Control flow, including short-circuit `&&`/`||` and lowered loops
//! - Self tail calls rewritten into jumps
//! - The string data section and the program startup stub

pub mod compiler;
pub mod expr;
pub mod stdlib;
pub mod stmt;

#[cfg(test)]
mod tests;
