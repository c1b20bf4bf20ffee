use crate::{
    ast::{
        expressions::{BinaryOperator, Expr, ExprKind, FunctionCall, Literal, UnaryOperator},
        types::SLOT_SIZE,
    },
    errors::errors::Error,
    Position,
};

use super::compiler::{frame_address, resolved_type, Compiler, TAIL_ENTRY_LABEL};

/// Generates `expression` so that its result ends up in `rax`.
///
/// With `as_address` set the expression must be addressable and `rax`
/// receives the address of its storage instead of its value. Values of
/// array type always evaluate to their address. Scratch values are spilled
/// to temporary slots numbered from `depth` upwards.
pub fn gen_expression(
    compiler: &mut Compiler,
    expression: &Expr,
    depth: u64,
    as_address: bool,
) -> Result<(), Error> {
    let position = &expression.position;

    match &expression.kind {
        ExprKind::Literal(literal) => {
            if as_address {
                return Err(compiler.internal("literal has no address", position));
            }

            match literal {
                Literal::Boolean(value) => compiler.emit(format!("mov rax, {}", *value as i64)),
                Literal::Integer(value) => compiler.emit(format!("mov rax, {}", value)),
                Literal::String { index, .. } => {
                    let label = compiler.string_label(*index);
                    compiler.emit(format!("lea rax, [rel {}]", label));
                }
            }
        }
        ExprKind::Variable(reference) => {
            let variable = compiler.variable(reference, position)?;
            let slot = compiler.variable_slot(variable)?;

            if as_address || variable.ty.is_array() {
                compiler.emit(format!("lea rax, {}", slot));
            } else {
                compiler.emit(format!("mov rax, {}", slot));
            }
        }
        ExprKind::Call(call) => {
            if as_address {
                return Err(compiler.internal("call result has no address", position));
            }
            gen_call(compiler, call, depth, position)?;
        }
        ExprKind::ImplicitDeref(operand) => {
            gen_dereference(compiler, expression, operand, depth, as_address)?
        }
        ExprKind::Unary { operator, operand } => match operator {
            UnaryOperator::Dereference => {
                gen_dereference(compiler, expression, operand, depth, as_address)?
            }
            _ if as_address => {
                return Err(compiler.internal(
                    format!("operator {} has no address", operator.as_str()),
                    position,
                ))
            }
            UnaryOperator::AddressOf => gen_expression(compiler, operand, depth, true)?,
            UnaryOperator::Minus => {
                gen_expression(compiler, operand, depth, false)?;
                compiler.emit("neg rax");
            }
            UnaryOperator::LogicalNot => {
                gen_expression(compiler, operand, depth, false)?;
                compiler.emit("xor rax, 1");
            }
        },
        ExprKind::Binary {
            operator: BinaryOperator::Index,
            lhs,
            rhs,
        } => {
            let element = resolved_type(expression)?;
            let base = compiler.temp_slot(depth, position)?;

            gen_expression(compiler, lhs, depth, true)?;
            compiler.emit(format!("mov {}, rax", base));
            gen_expression(compiler, rhs, depth + 1, false)?;
            compiler.emit(format!("imul rax, {}", element.size()));
            compiler.emit(format!("add rax, {}", base));

            if !as_address && !element.is_array() {
                compiler.emit("mov rax, [rax]");
            }
        }
        ExprKind::Binary { operator, lhs, rhs } => {
            if as_address {
                return Err(compiler.internal(
                    format!("operator {} has no address", operator.as_str()),
                    position,
                ));
            }

            if operator.is_logical() {
                gen_logical(compiler, *operator, lhs, rhs, depth)?;
            } else {
                gen_binary(compiler, *operator, lhs, rhs, depth, position)?;
            }
        }
    }

    Ok(())
}

/// The address of a pointed-to location is the pointer value itself.
fn gen_dereference(
    compiler: &mut Compiler,
    expression: &Expr,
    pointer: &Expr,
    depth: u64,
    as_address: bool,
) -> Result<(), Error> {
    gen_expression(compiler, pointer, depth, false)?;

    if !as_address && !resolved_type(expression)?.is_array() {
        compiler.emit("mov rax, [rax]");
    }

    Ok(())
}

/// `&&` and `||`: the right operand only runs when the left one does not
/// already decide the result.
fn gen_logical(
    compiler: &mut Compiler,
    operator: BinaryOperator,
    lhs: &Expr,
    rhs: &Expr,
    depth: u64,
) -> Result<(), Error> {
    let skip = format!(".L{}", compiler.next_label());

    gen_expression(compiler, lhs, depth, false)?;
    compiler.emit("cmp rax, 0");
    if operator == BinaryOperator::LogicalAnd {
        compiler.emit(format!("je {}", skip));
    } else {
        compiler.emit(format!("jne {}", skip));
    }
    gen_expression(compiler, rhs, depth, false)?;
    compiler.emit_label(skip);

    Ok(())
}

fn gen_binary(
    compiler: &mut Compiler,
    operator: BinaryOperator,
    lhs: &Expr,
    rhs: &Expr,
    depth: u64,
    position: &Position,
) -> Result<(), Error> {
    let spilled = compiler.temp_slot(depth, position)?;

    gen_expression(compiler, lhs, depth, false)?;
    compiler.emit(format!("mov {}, rax", spilled));
    gen_expression(compiler, rhs, depth + 1, false)?;

    // rax holds the right operand, the spill slot the left one.
    match operator {
        BinaryOperator::Add => compiler.emit(format!("add rax, {}", spilled)),
        BinaryOperator::Mul => compiler.emit(format!("imul rax, {}", spilled)),
        BinaryOperator::Sub => {
            compiler.emit("mov rcx, rax");
            compiler.emit(format!("mov rax, {}", spilled));
            compiler.emit("sub rax, rcx");
        }
        BinaryOperator::Div | BinaryOperator::Mod => {
            compiler.emit("mov rcx, rax");
            compiler.emit(format!("mov rax, {}", spilled));
            compiler.emit("cqo");
            compiler.emit("idiv rcx");
            if operator == BinaryOperator::Mod {
                compiler.emit("mov rax, rdx");
            }
        }
        BinaryOperator::Equal
        | BinaryOperator::NotEqual
        | BinaryOperator::Greater
        | BinaryOperator::GreaterEq
        | BinaryOperator::Less
        | BinaryOperator::LessEq => {
            compiler.emit(format!("cmp {}, rax", spilled));
            compiler.emit("mov rax, 0");
            compiler.emit("mov rcx, 1");
            compiler.emit(format!("{} rax, rcx", conditional_move(operator)));
        }
        BinaryOperator::LogicalAnd | BinaryOperator::LogicalOr | BinaryOperator::Index => {
            return Err(compiler.internal(
                format!("operator {} is not arithmetic", operator.as_str()),
                position,
            ))
        }
    }

    Ok(())
}

fn conditional_move(operator: BinaryOperator) -> &'static str {
    match operator {
        BinaryOperator::Equal => "cmove",
        BinaryOperator::NotEqual => "cmovne",
        BinaryOperator::Greater => "cmovg",
        BinaryOperator::GreaterEq => "cmovge",
        BinaryOperator::Less => "cmovl",
        _ => "cmovle",
    }
}

/// Arguments are staged in temporary slots first and only then copied to
/// the outgoing (or, for an eliminated tail call, incoming) argument slots,
/// so nested calls cannot overwrite arguments already placed.
fn gen_call(
    compiler: &mut Compiler,
    call: &FunctionCall,
    depth: u64,
    position: &Position,
) -> Result<(), Error> {
    let arena = compiler.arena;
    let callee = call
        .function
        .and_then(|id| arena.get(id))
        .ok_or_else(|| compiler.internal(format!("unresolved call to {}", call.symbol), position))?;

    let count = call.arguments.len() as u64;
    let mut staged = Vec::with_capacity(call.arguments.len());
    for (index, argument) in call.arguments.iter().enumerate() {
        let slot = compiler.temp_slot(depth + index as u64, position)?;
        gen_expression(compiler, argument, depth + count, false)?;
        compiler.emit(format!("mov {}, rax", slot));
        staged.push(slot);
    }

    let current = compiler.current_function()?;
    let is_tail_call = compiler.eliminates_tail_calls(current)
        && current.tail_calls.contains(&call.id)
        && call.function == compiler.function;

    if is_tail_call {
        for (slot, argument) in staged.iter().zip(current.variables.iter()) {
            let offset = argument.stack_offset.ok_or_else(|| {
                compiler.internal(format!("no stack slot assigned to {}", argument.symbol), position)
            })?;
            compiler.emit(format!("mov rax, {}", slot));
            compiler.emit(format!("mov qword {}, rax", frame_address(offset)));
        }
        compiler.emit(format!("jmp {}", TAIL_ENTRY_LABEL));
    } else {
        for (index, slot) in staged.iter().enumerate() {
            compiler.emit(format!("mov rax, {}", slot));
            compiler.emit(format!("mov qword [rsp+{}], rax", SLOT_SIZE * index as u64));
        }
        let target = compiler.call_target(&callee.symbol);
        compiler.emit(format!("call {}", target));
    }

    Ok(())
}
