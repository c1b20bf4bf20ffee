#![allow(clippy::module_inception)]

//! An ahead-of-time compiler for a small statically-typed imperative
//! language, lowering straight to NASM x86-64 assembly.
//!
//! Pipeline: `lexer` -> `parser` -> `validator` -> `compiler`, orchestrated
//! across modules and the external toolchain by `driver`.

use std::rc::Rc;

pub mod ast;
pub mod compiler;
pub mod driver;
pub mod errors;
pub mod lexer;
pub mod macros;
pub mod parser;
pub mod validator;

extern crate regex;

/// A byte offset into a module's source text, tagged with the module name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position(pub u32, pub Rc<String>);

impl Position {
    pub fn null() -> Self {
        Position(0, Rc::new(String::from("<null>")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

/// Returns the zero-based line number, the text of that line (without the
/// trailing newline) and the zero-based column of `position` within it.
///
/// Offsets past the end of `content` resolve to the last line.
pub fn get_line_at_position(content: &str, position: u32) -> (usize, String, usize) {
    let pos = (position as usize).min(content.len());

    let mut start = 0;
    let mut line_number = 0;

    for line in content.split_inclusive('\n') {
        let end = start + line.len();

        if (start..end).contains(&pos) {
            let text = line.trim_end_matches(['\n', '\r']).to_string();
            return (line_number, text, pos - start);
        }

        start = end;
        line_number += 1;
    }

    // Past the final newline (or empty input): point just after the last line.
    let last = content.lines().last().unwrap_or("");
    (line_number.saturating_sub(1), last.to_string(), last.len())
}
