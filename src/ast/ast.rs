use std::{
    collections::HashSet,
    fmt::Display,
    ops::{Index, IndexMut},
    rc::Rc,
};

use crate::Position;

use super::{expressions::CallId, statements::Block, types::Type};

/// A module-qualified name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Symbol {
    pub module: Rc<String>,
    pub name: String,
}

impl Symbol {
    pub fn new(module: Rc<String>, name: &str) -> Self {
        Symbol {
            module,
            name: name.to_string(),
        }
    }

    /// `module:name`, the symbol table key.
    pub fn qualified(&self) -> String {
        format!("{}:{}", self.module, self.name)
    }

    /// `$module.name`, the form used in emitted assembly.
    pub fn asm(&self) -> String {
        format!("${}.{}", self.module, self.name)
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.qualified())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionId(pub usize);

/// Index into `Function::variables`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VariableId(pub usize);

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub symbol: Symbol,
    pub ty: Type,
    pub position: Position,
    /// Relative to the frame base: positive for arguments, negative for
    /// locals. Only valid once the owning function has been validated.
    pub stack_offset: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub ty: Type,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub symbol: Symbol,
    pub position: Position,
    pub arguments: Vec<Parameter>,
    /// Arguments first, then locals in declaration order, then hidden loop
    /// counters.
    pub variables: Vec<Variable>,
    /// `None` for `extern` declarations.
    pub block: Option<Block>,
    pub return_type: Type,
    pub is_tail_recursive: bool,
    pub tail_calls: HashSet<CallId>,
    pub stack_space_for_args: u64,
    pub temporary_space: u64,
}

impl Function {
    pub fn new(
        symbol: Symbol,
        arguments: Vec<Parameter>,
        return_type: Type,
        block: Option<Block>,
        position: Position,
    ) -> Self {
        Function {
            symbol,
            position,
            arguments,
            variables: vec![],
            block,
            return_type,
            is_tail_recursive: true,
            tail_calls: HashSet::new(),
            stack_space_for_args: 0,
            temporary_space: 0,
        }
    }

    pub fn is_extern(&self) -> bool {
        self.block.is_none()
    }

    pub fn locals(&self) -> &[Variable] {
        let start = self.arguments.len().min(self.variables.len());
        &self.variables[start..]
    }

    pub fn locals_size(&self) -> u64 {
        self.locals().iter().map(|local| local.ty.size()).sum()
    }

    /// Bytes reserved below the frame base by the prologue.
    pub fn frame_size(&self) -> u64 {
        self.stack_space_for_args + self.locals_size() + self.temporary_space
    }

    pub fn signature(&self) -> String {
        let arguments = self
            .arguments
            .iter()
            .map(|argument| format!("{} {}", argument.ty, argument.name))
            .collect::<Vec<String>>()
            .join(", ");
        format!("{} {}({})", self.return_type, self.symbol.name, arguments)
    }

    pub fn render(&self) -> String {
        match &self.block {
            Some(block) => format!("{} {}", self.signature(), block.render(0)),
            None => format!("extern {};", self.signature()),
        }
    }
}

/// Owns every function of the program. Call sites and the symbol table
/// refer to functions by `FunctionId`.
#[derive(Debug, Clone, Default)]
pub struct FunctionArena {
    functions: Vec<Function>,
}

impl FunctionArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, function: Function) -> FunctionId {
        self.functions.push(function);
        FunctionId(self.functions.len() - 1)
    }

    pub fn get(&self, id: FunctionId) -> Option<&Function> {
        self.functions.get(id.0)
    }

    pub fn get_mut(&mut self, id: FunctionId) -> Option<&mut Function> {
        self.functions.get_mut(id.0)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl Index<FunctionId> for FunctionArena {
    type Output = Function;

    fn index(&self, id: FunctionId) -> &Self::Output {
        &self.functions[id.0]
    }
}

impl IndexMut<FunctionId> for FunctionArena {
    fn index_mut(&mut self, id: FunctionId) -> &mut Self::Output {
        &mut self.functions[id.0]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    pub path: String,
    pub is_assembly: bool,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub name: Rc<String>,
    pub imports: Vec<Import>,
    pub functions: Vec<FunctionId>,
    /// String literal pool; a literal's index is its position here.
    pub strings: Vec<Vec<u8>>,
}

impl Module {
    pub fn new(name: Rc<String>) -> Self {
        Module {
            name,
            imports: vec![],
            functions: vec![],
            strings: vec![],
        }
    }

    pub fn render(&self, arena: &FunctionArena) -> String {
        let mut s = String::new();
        for import in &self.imports {
            if import.is_assembly {
                s.push_str(&format!("import asm {:?};\n", import.path));
            } else {
                s.push_str(&format!("import {:?};\n", import.path));
            }
        }
        for id in &self.functions {
            s.push_str(&arena[*id].render());
            s.push('\n');
        }
        s
    }
}
