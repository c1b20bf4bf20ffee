use std::collections::HashMap;

use lazy_static::lazy_static;

use crate::ast::{
    ast::{FunctionId, VariableId},
    types::BasicTypeId,
};

lazy_static! {
    pub static ref BASIC_TYPE_LOOKUP: HashMap<&'static str, BasicTypeId> = {
        let mut map = HashMap::new();
        map.insert("int8", BasicTypeId::Int8);
        map.insert("int16", BasicTypeId::Int16);
        map.insert("int32", BasicTypeId::Int32);
        map.insert("int64", BasicTypeId::Int64);
        map.insert("int", BasicTypeId::Int64);
        map.insert("u8", BasicTypeId::U8);
        map.insert("u16", BasicTypeId::U16);
        map.insert("u32", BasicTypeId::U32);
        map.insert("u64", BasicTypeId::U64);
        map.insert("bool", BasicTypeId::Bool);
        map.insert("string", BasicTypeId::String);
        map.insert("void", BasicTypeId::Void);
        map
    };
}

/// Functions of the whole program by qualified name, plus the flat scope of
/// the function whose body is being validated.
#[derive(Debug, Default)]
pub struct SymbolTable {
    functions: HashMap<String, FunctionId>,
    variables: HashMap<String, VariableId>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_function(&self, qualified_name: &str) -> Option<FunctionId> {
        self.functions.get(qualified_name).copied()
    }

    pub fn set_function(&mut self, qualified_name: String, function: FunctionId) {
        self.functions.insert(qualified_name, function);
    }

    pub fn get_variable(&self, name: &str) -> Option<VariableId> {
        self.variables.get(name).copied()
    }

    /// Overwrites any existing binding of `name`.
    pub fn set_variable(&mut self, name: String, variable: VariableId) {
        self.variables.insert(name, variable);
    }

    pub fn clear_variables(&mut self) {
        self.variables.clear();
    }

    pub fn get_basic_type_id(&self, name: &str) -> Option<BasicTypeId> {
        BASIC_TYPE_LOOKUP.get(name).copied()
    }
}
