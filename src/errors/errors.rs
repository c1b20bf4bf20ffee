use std::{fmt::Display, rc::Rc};

use thiserror::Error;

use crate::{ast::types::MAX_OBJECT_SIZE, get_line_at_position, Position};

#[derive(Debug, Clone)]
pub struct Error {
    internal_error: ErrorImpl,
    position: Position,
}

impl Error {
    pub fn new(error_impl: ErrorImpl, position: Position) -> Self {
        Error {
            internal_error: error_impl,
            position,
        }
    }

    pub fn get_position(&self) -> &Position {
        &self.position
    }

    pub fn kind(&self) -> &ErrorImpl {
        &self.internal_error
    }

    pub fn get_error_name(&self) -> &str {
        match &self.internal_error {
            ErrorImpl::UnrecognisedToken { .. } => "UnrecognisedToken",
            ErrorImpl::UnexpectedToken { .. } => "UnexpectedToken",
            ErrorImpl::UnexpectedTokenDetailed { .. } => "UnexpectedTokenDetailed",
            ErrorImpl::NumberParseError { .. } => "NumberParseError",
            ErrorImpl::UndefinedVariable { .. } => "UndefinedVariable",
            ErrorImpl::UndefinedFunction { .. } => "UndefinedFunction",
            ErrorImpl::UndefinedType { .. } => "UndefinedType",
            ErrorImpl::FunctionRedefinition { .. } => "FunctionRedefinition",
            ErrorImpl::VariableRedeclaration { .. } => "VariableRedeclaration",
            ErrorImpl::ArgumentCountMismatch { .. } => "ArgumentCountMismatch",
            ErrorImpl::ArgumentTypeMismatch { .. } => "ArgumentTypeMismatch",
            ErrorImpl::AssignmentTypeMismatch { .. } => "AssignmentTypeMismatch",
            ErrorImpl::ReturnTypeMismatch { .. } => "ReturnTypeMismatch",
            ErrorImpl::PredicateTypeMismatch { .. } => "PredicateTypeMismatch",
            ErrorImpl::OperatorTypeMismatch { .. } => "OperatorTypeMismatch",
            ErrorImpl::NotAddressable => "NotAddressable",
            ErrorImpl::NonArrayIndexed { .. } => "NonArrayIndexed",
            ErrorImpl::InvalidLoopVariable { .. } => "InvalidLoopVariable",
            ErrorImpl::MissingTerminalReturn { .. } => "MissingTerminalReturn",
            ErrorImpl::DeclarationOutsideOuterBlock { .. } => "DeclarationOutsideOuterBlock",
            ErrorImpl::InvalidReturnSize { .. } => "InvalidReturnSize",
            ErrorImpl::ArrayTooLarge { .. } => "ArrayTooLarge",
            ErrorImpl::FrameTooLarge { .. } => "FrameTooLarge",
            ErrorImpl::InvalidModuleName { .. } => "InvalidModuleName",
            ErrorImpl::InvalidMainSignature => "InvalidMainSignature",
            ErrorImpl::ModuleOrFileNotFound { .. } => "ModuleOrFileNotFound",
            ErrorImpl::ToolchainFailure { .. } => "ToolchainFailure",
            ErrorImpl::Io { .. } => "Io",
            ErrorImpl::Internal { .. } => "Internal",
        }
    }

    pub fn get_tip(&self) -> ErrorTip {
        match &self.internal_error {
            ErrorImpl::UnexpectedToken { token } => ErrorTip::Suggestion(format!(
                "Unexpected token: `{}`, did you miss a semicolon?",
                token
            )),
            ErrorImpl::NumberParseError { token } => ErrorTip::Suggestion(format!(
                "Invalid number: `{}`, is it above the integer limit?",
                token
            )),
            ErrorImpl::NotAddressable => ErrorTip::Suggestion(String::from(
                "Only variables, dereferences and array elements denote storage",
            )),
            ErrorImpl::DeclarationOutsideOuterBlock { .. } => ErrorTip::Suggestion(String::from(
                "Move the declaration to the top level of the function body",
            )),
            ErrorImpl::InvalidReturnSize { .. } => ErrorTip::Suggestion(String::from(
                "Return a pointer instead of an array",
            )),
            ErrorImpl::ArrayTooLarge { .. } | ErrorImpl::FrameTooLarge { .. } => {
                ErrorTip::Suggestion(format!(
                    "Stack objects may span at most {} bytes",
                    MAX_OBJECT_SIZE
                ))
            }
            ErrorImpl::InvalidModuleName { .. } => ErrorTip::Suggestion(String::from(
                "Module file names must be identifiers, e.g. `my_module.u`",
            )),
            ErrorImpl::MissingTerminalReturn { .. } => ErrorTip::Suggestion(String::from(
                "The last statement of a non-void function must be a return",
            )),
            _ => ErrorTip::None,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.internal_error)
    }
}

impl std::error::Error for Error {}

pub enum ErrorTip {
    None,
    Suggestion(String),
}

impl Display for ErrorTip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorTip::None => write!(f, ""),
            ErrorTip::Suggestion(suggestion) => write!(f, "{}", suggestion),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ErrorImpl {
    #[error("Unrecognised token: {token}")]
    UnrecognisedToken { token: String },
    #[error("Unexpected token: {token}")]
    UnexpectedToken { token: String },
    #[error("Unexpected token ({message}): {token}")]
    UnexpectedTokenDetailed { token: String, message: String },
    #[error("Invalid integer literal: {token}")]
    NumberParseError { token: String },
    #[error("Reference to undefined variable: {variable}")]
    UndefinedVariable { variable: String },
    #[error("Reference to undefined function: {function}")]
    UndefinedFunction { function: String },
    #[error("Undefined type: {type_}")]
    UndefinedType { type_: String },
    #[error("Redefinition of function {function}")]
    FunctionRedefinition { function: String },
    #[error("Redeclaration of variable: {variable}")]
    VariableRedeclaration { variable: String },
    #[error("Invalid number of arguments for function call: {function} (expected {expected}, received {received})")]
    ArgumentCountMismatch {
        function: String,
        expected: usize,
        received: usize,
    },
    #[error("Argument type mismatch in call to function: {function} (expected '{expected}', found '{found}')")]
    ArgumentTypeMismatch {
        function: String,
        expected: String,
        found: String,
    },
    #[error("Cannot assign expression of type '{found}' to '{expected}'")]
    AssignmentTypeMismatch { expected: String, found: String },
    #[error("Expected return value of type '{expected}', found '{found}'")]
    ReturnTypeMismatch { expected: String, found: String },
    #[error("Expected expression of type '{expected}', found '{found}'")]
    PredicateTypeMismatch { expected: String, found: String },
    #[error("Operator {operator} cannot be applied to type {found}")]
    OperatorTypeMismatch { operator: String, found: String },
    #[error("Expression does not denote an addressable location")]
    NotAddressable,
    #[error("Cannot index expression of non-array type {found}")]
    NonArrayIndexed { found: String },
    #[error("Invalid loop variable: {message}")]
    InvalidLoopVariable { message: String },
    #[error("Function {function} does not end with a return statement")]
    MissingTerminalReturn { function: String },
    #[error("Declaration of {variable} must be in the outermost block of the function")]
    DeclarationOutsideOuterBlock { variable: String },
    #[error("Return type of function {function} must be a single 8-byte value, found {found}")]
    InvalidReturnSize { function: String, found: String },
    #[error("Array type {type_} is too large")]
    ArrayTooLarge { type_: String },
    #[error("Stack frame of function {function} is too large: {size} bytes")]
    FrameTooLarge { function: String, size: u64 },
    #[error("Invalid module name: {name}")]
    InvalidModuleName { name: String },
    #[error("main must be declared as 'void main()'")]
    InvalidMainSignature,
    #[error("Module or file not found: {path}")]
    ModuleOrFileNotFound { path: String },
    #[error("{tool} failed: {message}")]
    ToolchainFailure { tool: String, message: String },
    #[error("I/O error on {path}: {message}")]
    Io { path: String, message: String },
    #[error("Internal compiler error: {message}")]
    Internal { message: String },
}

/// Accumulates every defect found in one module so that a single compiler
/// invocation can surface as many of them as possible.
#[derive(Debug, Clone)]
pub struct ErrorCollector {
    module_name: Rc<String>,
    source: Rc<String>,
    errors: Vec<Error>,
}

impl ErrorCollector {
    pub fn new(module_name: Rc<String>, source: Rc<String>) -> Self {
        ErrorCollector {
            module_name,
            source,
            errors: vec![],
        }
    }

    pub fn error(&mut self, error_impl: ErrorImpl, position: Position) {
        self.errors.push(Error::new(error_impl, position));
    }

    pub fn push(&mut self, error: Error) {
        self.errors.push(error);
    }

    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Renders the report: one record per error, each followed by the
    /// offending source line. An empty string means no errors.
    pub fn get_error_string(&self) -> String {
        let mut report = String::new();
        for error in &self.errors {
            report.push_str(&format_error(&self.module_name, &self.source, error));
        }
        report
    }
}

/// Formats one error record as `<module> <line+1>:<column> <message>`
/// followed by the indented source line and a blank line.
pub fn format_error(module_name: &str, source: &str, error: &Error) -> String {
    let (line, line_text, column) = get_line_at_position(source, error.get_position().0);
    format!(
        "{} {}:{} {}\n    {}\n\n",
        module_name,
        line + 1,
        column,
        error,
        line_text
    )
}
