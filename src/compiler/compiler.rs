//! Main compiler module.
//!
//! This module contains the `Compiler` context that walks one validated
//! module and emits NASM x86-64 assembly for it. The context carries the
//! current module, the function being generated and its label counter, so
//! independent compilations never share state.
//!
//! Stack frame of a generated function, from the frame base downwards:
//!
//! ```text
//! [rbp+16+8i]                       incoming argument i
//! [rbp+8]                           return address
//! [rbp]                             saved frame pointer
//! [rbp-locals_size, rbp)            locals
//! [rbp-locals_size-8(k+1)]          temporary slot k
//! [rsp+8i]                          outgoing argument i
//! ```

use tracing::debug;

use crate::{
    ast::{
        ast::{Function, FunctionArena, FunctionId, Module, Symbol, Variable},
        expressions::{Expr, VariableRef},
        types::{Type, SLOT_SIZE},
    },
    errors::errors::{Error, ErrorImpl},
    Position,
};

use super::stmt::gen_block;

/// Label every generated function jumps to in order to return.
pub const RETURN_LABEL: &str = ".return";

/// Re-entry point of a tail-recursive function, right after the prologue.
pub const TAIL_ENTRY_LABEL: &str = ".tail_entry";

/// Name the entry module's `main` is emitted under.
pub const ENTRY_FUNCTION: &str = "main";

/// Configures one code generation run.
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Turn recorded self tail calls into jumps.
    pub eliminate_tail_calls: bool,
    /// Module whose `main` is emitted as the program entry.
    pub entry_module: String,
}

/// Code generation context for one module.
pub struct Compiler<'a> {
    pub options: &'a Options,
    pub arena: &'a FunctionArena,
    pub module: &'a Module,

    /// The function whose body is being emitted.
    pub function: Option<FunctionId>,
    /// Numbers the local labels of the current function.
    pub label_counter: usize,

    output: String,
}

impl<'a> Compiler<'a> {
    pub fn new(module: &'a Module, arena: &'a FunctionArena, options: &'a Options) -> Self {
        Compiler {
            options,
            arena,
            module,
            function: None,
            label_counter: 0,
            output: String::new(),
        }
    }

    /// Appends one indented instruction.
    pub fn emit(&mut self, instruction: impl AsRef<str>) {
        self.output.push_str("    ");
        self.output.push_str(instruction.as_ref());
        self.output.push('\n');
    }

    pub fn emit_label(&mut self, label: impl AsRef<str>) {
        self.output.push_str(label.as_ref());
        self.output.push_str(":\n");
    }

    fn emit_raw(&mut self, line: impl AsRef<str>) {
        self.output.push_str(line.as_ref());
        self.output.push('\n');
    }

    pub fn next_label(&mut self) -> usize {
        self.label_counter += 1;
        self.label_counter
    }

    pub fn internal(&self, message: impl Into<String>, position: &Position) -> Error {
        Error::new(
            ErrorImpl::Internal {
                message: message.into(),
            },
            position.clone(),
        )
    }

    pub fn current_function(&self) -> Result<&'a Function, Error> {
        let arena = self.arena;
        match self.function {
            Some(id) => Ok(&arena[id]),
            None => Err(self.internal("no function is being generated", &Position::null())),
        }
    }

    /// Whether calls recorded as tail calls in the current function become
    /// jumps to its re-entry label.
    pub fn eliminates_tail_calls(&self, function: &Function) -> bool {
        self.options.eliminate_tail_calls && function.is_tail_recursive
    }

    fn is_entry(&self, symbol: &Symbol) -> bool {
        *symbol.module == self.options.entry_module && symbol.name == ENTRY_FUNCTION
    }

    /// Label a function is defined under.
    pub fn function_label(&self, symbol: &Symbol) -> String {
        if self.is_entry(symbol) {
            ENTRY_FUNCTION.to_string()
        } else {
            format!("{}.{}", symbol.module, symbol.name)
        }
    }

    /// Operand used to call a function.
    pub fn call_target(&self, symbol: &Symbol) -> String {
        if self.is_entry(symbol) {
            ENTRY_FUNCTION.to_string()
        } else {
            symbol.asm()
        }
    }

    pub fn string_label(&self, index: usize) -> String {
        format!("{}.D${}", self.module.name, index)
    }

    /// Memory operand of temporary slot `index` in the current frame.
    pub fn temp_slot(&self, index: u64, position: &Position) -> Result<String, Error> {
        let function = self.current_function()?;
        let depth = SLOT_SIZE * (index + 1);

        if depth > function.temporary_space {
            return Err(self.internal(
                format!(
                    "temporary slot {} exceeds the {} bytes reserved by {}",
                    index, function.temporary_space, function.symbol
                ),
                position,
            ));
        }

        Ok(format!("qword [rbp-{}]", function.locals_size() + depth))
    }

    /// Resolved variable behind a reference in the current function.
    pub fn variable(&self, reference: &VariableRef, position: &Position) -> Result<&'a Variable, Error> {
        let function = self.current_function()?;

        reference
            .variable
            .and_then(|id| function.variables.get(id.0))
            .ok_or_else(|| self.internal(format!("unresolved variable {}", reference.name), position))
    }

    /// Memory operand of a variable's stack slot.
    pub fn variable_slot(&self, variable: &Variable) -> Result<String, Error> {
        match variable.stack_offset {
            Some(offset) => Ok(frame_address(offset)),
            None => Err(self.internal(
                format!("no stack slot assigned to {}", variable.symbol),
                &variable.position,
            )),
        }
    }

    fn gen_function(&mut self, id: FunctionId) -> Result<(), Error> {
        let arena = self.arena;
        let function = &arena[id];
        let Some(block) = &function.block else {
            return Ok(());
        };

        self.function = Some(id);
        self.label_counter = 0;

        let frame_size = function.frame_size();
        let label = self.function_label(&function.symbol);

        self.emit_raw(format!("; {}", function.signature()));
        self.emit_label(label);
        self.emit("push rbp");
        self.emit("mov rbp, rsp");
        if frame_size > 0 {
            self.emit(format!("sub rsp, {}", frame_size));
        }
        if self.eliminates_tail_calls(function) {
            self.emit_label(TAIL_ENTRY_LABEL);
        }

        gen_block(self, block)?;

        self.emit_label(RETURN_LABEL);
        self.emit("mov rsp, rbp");
        self.emit("pop rbp");
        self.emit("ret");
        self.emit_raw("");

        self.function = None;
        Ok(())
    }

    fn gen_strings(&mut self) {
        let module = self.module;
        if module.strings.is_empty() {
            return;
        }

        self.emit_raw("section .data");
        for (index, value) in module.strings.iter().enumerate() {
            let label = self.string_label(index);
            self.emit_label(label);
            self.emit(format!("dd {}", value.len()));
            if !value.is_empty() {
                let bytes: Vec<String> = value.iter().map(|byte| byte.to_string()).collect();
                self.emit(format!("db {}", bytes.join(", ")));
            }
        }
        self.emit_raw("");
    }

    fn gen(&mut self) -> Result<(), Error> {
        let module = self.module;

        self.emit_raw("section .text");
        for &id in &module.functions {
            self.gen_function(id)?;
        }
        self.gen_strings();

        Ok(())
    }
}

/// `[rbp+16]` / `[rbp-8]`.
pub fn frame_address(offset: i64) -> String {
    if offset < 0 {
        format!("[rbp-{}]", -offset)
    } else {
        format!("[rbp+{}]", offset)
    }
}

/// Type recorded on `expr` by the validator.
pub fn resolved_type(expr: &Expr) -> Result<&Type, Error> {
    expr.get_type().ok_or_else(|| {
        Error::new(
            ErrorImpl::Internal {
                message: format!("expression {} was not validated", expr),
            },
            expr.position.clone(),
        )
    })
}

/// Generates the assembly text of one validated module.
///
/// Fails with an `Internal` error if the module breaks an invariant the
/// validator guarantees, e.g. because it was never validated.
pub fn compile_module(
    module: &Module,
    arena: &FunctionArena,
    options: &Options,
) -> Result<String, Error> {
    let mut compiler = Compiler::new(module, arena, options);
    compiler.gen()?;

    debug!(
        module = %module.name,
        bytes = compiler.output.len(),
        "generated module assembly"
    );

    Ok(compiler.output)
}
