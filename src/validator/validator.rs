use std::{cmp::max, mem, rc::Rc};

use tracing::debug;

use crate::{
    ast::{
        ast::{Function, FunctionArena, FunctionId, Module, Symbol, Variable, VariableId},
        expressions::{BinaryOperator, Expr, ExprKind, FunctionCall, Literal, UnaryOperator},
        statements::{Block, If, Stmt, StmtKind},
        types::{BasicTypeId, Type, MAX_OBJECT_SIZE, SLOT_SIZE},
    },
    compiler::compiler::ENTRY_FUNCTION,
    errors::errors::{ErrorCollector, ErrorImpl},
    Position,
};

use super::symbol_table::SymbolTable;

/// Saved frame pointer plus return address sit between the frame base and
/// the first argument.
const ARGUMENT_BASE_OFFSET: i64 = 2 * SLOT_SIZE as i64;

/// Runs both passes over a single module.
pub fn validate_module(
    module: &Module,
    arena: &mut FunctionArena,
    symbols: &mut SymbolTable,
    errors: &mut ErrorCollector,
) {
    validate_signatures(module, arena, symbols, errors);
    validate_bodies(module, arena, symbols, errors);
}

/// Resolves the signature of every function of `module`, assigns argument
/// stack slots and registers the functions in `symbols`.
///
/// Resets all state a previous validation left on the functions, so running
/// it again over an unmodified module gives the same result.
pub fn validate_signatures(
    module: &Module,
    arena: &mut FunctionArena,
    symbols: &mut SymbolTable,
    errors: &mut ErrorCollector,
) {
    for &id in &module.functions {
        let function = &mut arena[id];
        reset_analysis(function);

        // Only values that fit the accumulator can be returned; arrays
        // never do, whatever their size.
        if validate_type(&mut function.return_type, symbols, errors)
            && (function.return_type.is_array() || function.return_type.size() != SLOT_SIZE)
        {
            errors.error(
                ErrorImpl::InvalidReturnSize {
                    function: function.symbol.qualified(),
                    found: function.return_type.to_string(),
                },
                function.position.clone(),
            );
        }

        let mut offset = ARGUMENT_BASE_OFFSET;
        for argument in function.arguments.iter_mut() {
            validate_type(&mut argument.ty, symbols, errors);

            function.variables.push(Variable {
                symbol: Symbol::new(Rc::clone(&function.symbol.module), &argument.name),
                ty: argument.ty.clone(),
                position: argument.position.clone(),
                stack_offset: Some(offset),
            });
            offset += argument.ty.size() as i64;
        }

        let qualified = function.symbol.qualified();
        match symbols.get_function(&qualified) {
            Some(existing) if existing != id => errors.error(
                ErrorImpl::FunctionRedefinition {
                    function: qualified,
                },
                function.position.clone(),
            ),
            _ => symbols.set_function(qualified, id),
        }
    }

    debug!(
        module = %module.name,
        functions = module.functions.len(),
        "registered function signatures"
    );
}

/// Checks that the program's entry module defines `void main()`. Runs after
/// the signature pass of `module`; only the entry module is held to this.
pub fn validate_entry_point(
    module: &Module,
    arena: &FunctionArena,
    symbols: &SymbolTable,
    errors: &mut ErrorCollector,
) {
    let qualified = Symbol::new(Rc::clone(&module.name), ENTRY_FUNCTION).qualified();
    let Some(id) = symbols.get_function(&qualified) else {
        errors.error(
            ErrorImpl::UndefinedFunction {
                function: qualified,
            },
            Position(0, Rc::clone(&module.name)),
        );
        return;
    };

    let main = &arena[id];
    if !main.return_type.is_void() || !main.arguments.is_empty() {
        errors.error(ErrorImpl::InvalidMainSignature, main.position.clone());
    }
}

/// Validates the body of every defined function of `module`. Expects the
/// signature pass to have run for this module and everything it imports.
pub fn validate_bodies(
    module: &Module,
    arena: &mut FunctionArena,
    symbols: &mut SymbolTable,
    errors: &mut ErrorCollector,
) {
    for &id in &module.functions {
        if arena[id].is_extern() {
            continue;
        }

        let mut validator = BodyValidator::new(id, arena, symbols, errors);
        validator.validate_function();

        let function = &arena[id];
        debug!(
            function = %function.symbol,
            tail_recursive = function.is_tail_recursive,
            frame_size = function.frame_size(),
            "validated function body"
        );
    }
}

/// Resolves a written type in place. Returns false (after reporting) when a
/// name does not denote a basic type.
pub fn validate_type(ty: &mut Type, symbols: &SymbolTable, errors: &mut ErrorCollector) -> bool {
    match ty {
        Type::Basic(_) => true,
        Type::Named(name) => match symbols.get_basic_type_id(&name.name) {
            Some(id) => {
                *ty = Type::Basic(id);
                true
            }
            None => {
                errors.error(
                    ErrorImpl::UndefinedType {
                        type_: name.name.clone(),
                    },
                    name.position.clone(),
                );
                false
            }
        },
        Type::Array { element, .. } => validate_type(element, symbols, errors),
        Type::Pointer(pointee) => validate_type(pointee, symbols, errors),
    }
}

fn reset_analysis(function: &mut Function) {
    function.variables.clear();
    function.is_tail_recursive = true;
    function.tail_calls.clear();
    function.stack_space_for_args = 0;
    function.temporary_space = 0;
}

/// Validation state for the body of one function.
struct BodyValidator<'a> {
    arena: &'a mut FunctionArena,
    symbols: &'a mut SymbolTable,
    errors: &'a mut ErrorCollector,
    function: FunctionId,
    qualified_name: String,
    return_type: Type,
}

impl<'a> BodyValidator<'a> {
    fn new(
        function: FunctionId,
        arena: &'a mut FunctionArena,
        symbols: &'a mut SymbolTable,
        errors: &'a mut ErrorCollector,
    ) -> Self {
        let qualified_name = arena[function].symbol.qualified();
        let return_type = arena[function].return_type.clone();

        BodyValidator {
            arena,
            symbols,
            errors,
            function,
            qualified_name,
            return_type,
        }
    }

    fn current(&self) -> &Function {
        &self.arena[self.function]
    }

    fn current_mut(&mut self) -> &mut Function {
        &mut self.arena[self.function]
    }

    fn validate_function(&mut self) {
        let errors_before = self.errors.errors().len();
        self.symbols.clear_variables();

        let function = &mut self.arena[self.function];
        let argument_count = function.arguments.len();
        function.variables.truncate(argument_count);
        let position = function.position.clone();
        let mut block = match function.block.take() {
            Some(block) => block,
            None => return,
        };

        let arguments: Vec<(String, Position)> = function
            .arguments
            .iter()
            .map(|argument| (argument.name.clone(), argument.position.clone()))
            .collect();
        for (index, (name, position)) in arguments.into_iter().enumerate() {
            if self.symbols.get_variable(&name).is_some() {
                self.errors
                    .error(ErrorImpl::VariableRedeclaration { variable: name }, position);
            } else {
                self.symbols.set_variable(name, VariableId(index));
            }
        }

        for stmt in block.iter_mut() {
            if let StmtKind::Declaration(declaration) = &mut stmt.kind {
                declaration.in_outer_block = true;
            }
        }

        self.validate_block(&mut block);

        let ends_with_return = matches!(
            block.statements.last(),
            Some(Stmt {
                kind: StmtKind::Return(_),
                ..
            })
        );
        if !self.return_type.is_void() && !ends_with_return {
            self.errors.error(
                ErrorImpl::MissingTerminalReturn {
                    function: self.qualified_name.clone(),
                },
                position.clone(),
            );
        }

        let succeeded = self.errors.errors().len() == errors_before;
        let function = &mut self.arena[self.function];
        function.block = Some(block);

        if function.tail_calls.is_empty() {
            function.is_tail_recursive = false;
        }

        let frame_size = function.frame_size();
        if succeeded && frame_size > MAX_OBJECT_SIZE {
            self.errors.error(
                ErrorImpl::FrameTooLarge {
                    function: self.qualified_name.clone(),
                    size: frame_size,
                },
                position,
            );
        } else if succeeded {
            let mut offset = 0;
            for local in function.variables.iter_mut().skip(argument_count) {
                offset -= local.ty.size() as i64;
                local.stack_offset = Some(offset);
            }
        }

        self.symbols.clear_variables();
    }

    fn add_variable(&mut self, name: &str, ty: Type, position: Position) -> VariableId {
        let function = self.current_mut();
        function.variables.push(Variable {
            symbol: Symbol::new(Rc::clone(&function.symbol.module), name),
            ty,
            position,
            stack_offset: None,
        });
        VariableId(function.variables.len() - 1)
    }

    fn variable_type(&self, id: VariableId) -> Option<Type> {
        self.current().variables.get(id.0).map(|variable| variable.ty.clone())
    }

    fn raise_temporary_space(&mut self, bytes: u64) {
        let function = self.current_mut();
        function.temporary_space = max(function.temporary_space, bytes);
    }

    fn validate_block(&mut self, block: &mut Block) {
        for stmt in block.iter_mut() {
            self.validate_stmt(stmt);
        }
    }

    fn validate_stmt(&mut self, stmt: &mut Stmt) {
        let position = stmt.position.clone();

        match &mut stmt.kind {
            StmtKind::Assignment { lhs, rhs } => {
                let lhs_ty = self.validate_expr(lhs);
                let rhs_ty = self.validate_expr(rhs);
                let (Some(lhs_ty), Some(rhs_ty)) = (lhs_ty, rhs_ty) else {
                    return;
                };

                if !lhs.is_addressable() || lhs_ty.is_array() {
                    self.errors
                        .error(ErrorImpl::NotAddressable, lhs.position.clone());
                    return;
                }

                if !lhs_ty.is_compatible_with(&rhs_ty) {
                    self.errors.error(
                        ErrorImpl::AssignmentTypeMismatch {
                            expected: lhs_ty.to_string(),
                            found: rhs_ty.to_string(),
                        },
                        position,
                    );
                    return;
                }

                self.raise_temporary_space(
                    SLOT_SIZE + max(lhs.temporary_space, rhs.temporary_space),
                );
            }
            StmtKind::Declaration(declaration) => {
                if !declaration.in_outer_block {
                    for name in &declaration.names {
                        self.errors.error(
                            ErrorImpl::DeclarationOutsideOuterBlock {
                                variable: name.name.clone(),
                            },
                            name.position.clone(),
                        );
                    }
                    return;
                }

                if !validate_type(&mut declaration.ty, self.symbols, self.errors) {
                    return;
                }

                for name in &declaration.names {
                    if self.symbols.get_variable(&name.name).is_some() {
                        self.errors.error(
                            ErrorImpl::VariableRedeclaration {
                                variable: name.name.clone(),
                            },
                            name.position.clone(),
                        );
                        continue;
                    }

                    let id =
                        self.add_variable(&name.name, declaration.ty.clone(), name.position.clone());
                    self.symbols.set_variable(name.name.clone(), id);
                }
            }
            StmtKind::Return(value) => {
                let found = match value {
                    Some(expr) => {
                        if let ExprKind::Call(call) = &expr.kind {
                            if call.symbol.qualified() == self.qualified_name
                                && self.current().is_tail_recursive
                            {
                                let id = call.id;
                                self.current_mut().tail_calls.insert(id);
                            }
                        }

                        match self.validate_expr(expr) {
                            Some(ty) => ty,
                            None => return,
                        }
                    }
                    None => Type::void(),
                };

                if !self.return_type.is_compatible_with(&found) {
                    self.errors.error(
                        ErrorImpl::ReturnTypeMismatch {
                            expected: self.return_type.to_string(),
                            found: found.to_string(),
                        },
                        position,
                    );
                }
            }
            StmtKind::Call(expr) => {
                self.validate_expr(expr);
            }
            StmtKind::If(if_stmt) => self.validate_if(if_stmt),
            StmtKind::While { predicate, block } => {
                self.validate_predicate(predicate);
                self.validate_block(block);
            }
            StmtKind::RangeFor {
                variable,
                start,
                end,
                block,
            } => {
                if let Some(ty) = self.validate_loop_variable(variable) {
                    if !ty.is_basic(BasicTypeId::Int64) {
                        self.errors.error(
                            ErrorImpl::InvalidLoopVariable {
                                message: format!("range loop variable must be int64, found {}", ty),
                            },
                            variable.position.clone(),
                        );
                    }
                }

                for bound in [start, end] {
                    if let Some(ty) = self.validate_expr(bound) {
                        if !ty.is_basic(BasicTypeId::Int64) {
                            self.errors.error(
                                ErrorImpl::PredicateTypeMismatch {
                                    expected: Type::int64().to_string(),
                                    found: ty.to_string(),
                                },
                                bound.position.clone(),
                            );
                        }
                    }
                }

                self.validate_block(block);
            }
            StmtKind::ArrayFor {
                variable,
                array,
                block,
                counter,
            } => {
                let variable_ty = self.validate_loop_variable(variable);

                if let Some(array_ty) = self.validate_expr(array) {
                    match (array_ty.element(), &variable_ty) {
                        (None, _) => self.errors.error(
                            ErrorImpl::NonArrayIndexed {
                                found: array_ty.to_string(),
                            },
                            array.position.clone(),
                        ),
                        (Some(element), Some(variable_ty))
                            if variable_ty.is_array() || !variable_ty.is_compatible_with(element) =>
                        {
                            self.errors.error(
                                ErrorImpl::InvalidLoopVariable {
                                    message: format!(
                                        "variable of type {} cannot hold elements of type {}",
                                        variable_ty, element
                                    ),
                                },
                                variable.position.clone(),
                            )
                        }
                        _ => {}
                    }
                }

                let name = format!("$counter{}", self.current().variables.len());
                *counter = Some(self.add_variable(&name, Type::int64(), position));

                self.validate_block(block);
            }
        }
    }

    fn validate_if(&mut self, if_stmt: &mut If) {
        if let Some(predicate) = &mut if_stmt.predicate {
            self.validate_predicate(predicate);
        }

        self.validate_block(&mut if_stmt.block);

        if let Some(else_clause) = &mut if_stmt.else_clause {
            self.validate_if(else_clause);
        }
    }

    fn validate_predicate(&mut self, predicate: &mut Expr) {
        if let Some(ty) = self.validate_expr(predicate) {
            if !ty.is_basic(BasicTypeId::Bool) {
                self.errors.error(
                    ErrorImpl::PredicateTypeMismatch {
                        expected: Type::bool().to_string(),
                        found: ty.to_string(),
                    },
                    predicate.position.clone(),
                );
            }
        }
    }

    fn validate_loop_variable(&mut self, variable: &mut Expr) -> Option<Type> {
        if !matches!(variable.kind, ExprKind::Variable(_)) {
            self.errors.error(
                ErrorImpl::InvalidLoopVariable {
                    message: String::from("loop variable must be a plain variable"),
                },
                variable.position.clone(),
            );
            return None;
        }

        self.validate_expr(variable)
    }

    /// Validates `expr`, records its type and temporary space, and raises the
    /// function's temporary high-water mark. `None` means an error was
    /// reported for this subtree.
    fn validate_expr(&mut self, expr: &mut Expr) -> Option<Type> {
        expr.ty = None;
        let position = expr.position.clone();

        let (ty, temporary_space) = match &mut expr.kind {
            ExprKind::Literal(literal) => {
                let ty = match literal {
                    Literal::Boolean(_) => Type::bool(),
                    Literal::Integer(_) => Type::int64(),
                    Literal::String { .. } => Type::string(),
                };
                (ty, 0)
            }
            ExprKind::Variable(reference) => {
                let Some(id) = self.symbols.get_variable(&reference.name) else {
                    self.errors.error(
                        ErrorImpl::UndefinedVariable {
                            variable: reference.name.clone(),
                        },
                        position,
                    );
                    return None;
                };
                reference.variable = Some(id);
                (self.variable_type(id)?, 0)
            }
            ExprKind::Call(call) => self.validate_call(call, position)?,
            ExprKind::Unary { operator, operand } => self.validate_unary(*operator, operand)?,
            ExprKind::ImplicitDeref(inner) => {
                let ty = self.validate_expr(inner)?;
                match ty.pointee() {
                    Some(pointee) => (pointee.clone(), inner.temporary_space),
                    None => {
                        self.operator_mismatch(UnaryOperator::Dereference.as_str(), &ty, position);
                        return None;
                    }
                }
            }
            ExprKind::Binary {
                operator: BinaryOperator::Index,
                lhs,
                rhs,
            } => self.validate_index(lhs, rhs)?,
            ExprKind::Binary { operator, lhs, rhs } => {
                self.validate_binary(*operator, lhs, rhs)?
            }
        };

        expr.ty = Some(ty.clone());
        expr.temporary_space = temporary_space;
        self.raise_temporary_space(temporary_space);

        Some(ty)
    }

    fn operator_mismatch(&mut self, operator: &str, found: &Type, position: Position) {
        self.errors.error(
            ErrorImpl::OperatorTypeMismatch {
                operator: operator.to_string(),
                found: found.to_string(),
            },
            position,
        );
    }

    fn validate_call(&mut self, call: &mut FunctionCall, position: Position) -> Option<(Type, u64)> {
        let qualified = call.symbol.qualified();

        let Some(callee_id) = self.symbols.get_function(&qualified) else {
            self.errors
                .error(ErrorImpl::UndefinedFunction { function: qualified }, position);
            return None;
        };

        let callee = &self.arena[callee_id];
        let parameters: Vec<Type> = callee
            .arguments
            .iter()
            .map(|argument| argument.ty.clone())
            .collect();
        let return_type = callee.return_type.clone();

        if parameters.len() != call.arguments.len() {
            self.errors.error(
                ErrorImpl::ArgumentCountMismatch {
                    function: qualified,
                    expected: parameters.len(),
                    received: call.arguments.len(),
                },
                position,
            );
            return None;
        }

        let mut argument_space = 0;
        for (argument, parameter) in call.arguments.iter_mut().zip(parameters.iter()) {
            let ty = self.validate_expr(argument)?;

            if ty.is_array() || !parameter.is_compatible_with(&ty) {
                self.errors.error(
                    ErrorImpl::ArgumentTypeMismatch {
                        function: qualified,
                        expected: parameter.to_string(),
                        found: ty.to_string(),
                    },
                    argument.position.clone(),
                );
                return None;
            }

            argument_space = max(argument_space, argument.temporary_space);
        }

        call.function = Some(callee_id);

        let is_self_call = qualified == self.qualified_name;
        let outgoing: u64 = parameters.iter().map(|parameter| parameter.size()).sum();

        let function = self.current_mut();
        if is_self_call && function.is_tail_recursive && !function.tail_calls.contains(&call.id) {
            function.is_tail_recursive = false;
        }
        function.stack_space_for_args = max(function.stack_space_for_args, outgoing);

        // Every argument is staged in its own slot before being copied out.
        let temporary_space = SLOT_SIZE * call.arguments.len() as u64 + argument_space;

        Some((return_type, temporary_space))
    }

    fn validate_unary(
        &mut self,
        operator: UnaryOperator,
        operand: &mut Expr,
    ) -> Option<(Type, u64)> {
        let ty = self.validate_expr(operand)?;

        let result = match operator {
            UnaryOperator::LogicalNot if ty.is_basic(BasicTypeId::Bool) => Type::bool(),
            UnaryOperator::Minus if ty.is_basic(BasicTypeId::Int64) => Type::int64(),
            UnaryOperator::AddressOf if operand.is_addressable() => Type::pointer_to(ty),
            UnaryOperator::AddressOf => {
                self.errors
                    .error(ErrorImpl::NotAddressable, operand.position.clone());
                return None;
            }
            UnaryOperator::Dereference => match ty.pointee() {
                Some(pointee) => pointee.clone(),
                None => {
                    self.operator_mismatch(operator.as_str(), &ty, operand.position.clone());
                    return None;
                }
            },
            _ => {
                self.operator_mismatch(operator.as_str(), &ty, operand.position.clone());
                return None;
            }
        };

        Some((result, operand.temporary_space))
    }

    fn validate_index(&mut self, lhs: &mut Expr, rhs: &mut Expr) -> Option<(Type, u64)> {
        let lhs_ty = self.validate_expr(lhs);
        let rhs_ty = self.validate_expr(rhs);
        let (mut lhs_ty, rhs_ty) = (lhs_ty?, rhs_ty?);

        // Indexing a pointer to an array goes through one implicit deref.
        let auto_deref = match &lhs_ty {
            Type::Pointer(pointee) if pointee.is_array() => Some((**pointee).clone()),
            _ => None,
        };
        if let Some(pointee) = auto_deref {
            let position = lhs.position.clone();
            let temporary_space = lhs.temporary_space;
            let pointer = mem::replace(lhs, Expr::integer(0, position.clone()));

            let mut deref = Expr::new(ExprKind::ImplicitDeref(Box::new(pointer)), position);
            deref.ty = Some(pointee.clone());
            deref.temporary_space = temporary_space;

            *lhs = deref;
            lhs_ty = pointee;
        }

        let Some(element) = lhs_ty.element() else {
            self.errors.error(
                ErrorImpl::NonArrayIndexed {
                    found: lhs_ty.to_string(),
                },
                lhs.position.clone(),
            );
            return None;
        };

        if !rhs_ty.is_basic(BasicTypeId::Int64) {
            self.operator_mismatch(
                BinaryOperator::Index.as_str(),
                &rhs_ty,
                rhs.position.clone(),
            );
            return None;
        }

        Some((
            element.clone(),
            SLOT_SIZE + lhs.temporary_space + rhs.temporary_space,
        ))
    }

    fn validate_binary(
        &mut self,
        operator: BinaryOperator,
        lhs: &mut Expr,
        rhs: &mut Expr,
    ) -> Option<(Type, u64)> {
        let lhs_ty = self.validate_expr(lhs);
        let rhs_ty = self.validate_expr(rhs);
        let (lhs_ty, rhs_ty) = (lhs_ty?, rhs_ty?);

        let required = if operator.is_logical() {
            Type::bool()
        } else {
            Type::int64()
        };

        for (ty, operand_position) in [(&lhs_ty, &lhs.position), (&rhs_ty, &rhs.position)] {
            if !ty.is_compatible_with(&required) {
                self.operator_mismatch(operator.as_str(), ty, operand_position.clone());
                return None;
            }
        }

        let result = if operator.is_logical() || operator.is_relational() {
            Type::bool()
        } else {
            Type::int64()
        };

        Some((result, SLOT_SIZE + lhs.temporary_space + rhs.temporary_space))
    }
}
