use crate::{
    ast::{
        expressions::{Expr, ExprKind},
        statements::{Block, If, Stmt, StmtKind},
        types::Type,
    },
    errors::errors::Error,
};

use super::{
    compiler::{resolved_type, Compiler, RETURN_LABEL},
    expr::gen_expression,
};

pub fn gen_block(compiler: &mut Compiler, block: &Block) -> Result<(), Error> {
    for stmt in block.iter() {
        gen_statement(compiler, stmt)?;
    }
    Ok(())
}

pub fn gen_statement(compiler: &mut Compiler, stmt: &Stmt) -> Result<(), Error> {
    match &stmt.kind {
        StmtKind::Assignment { lhs, rhs } => {
            let target = compiler.temp_slot(0, &stmt.position)?;

            gen_expression(compiler, lhs, 0, true)?;
            compiler.emit(format!("mov {}, rax", target));
            gen_expression(compiler, rhs, 1, false)?;
            compiler.emit(format!("mov rcx, {}", target));
            compiler.emit("mov qword [rcx], rax");
        }
        // Storage was laid out by the validator.
        StmtKind::Declaration(_) => {}
        StmtKind::Return(value) => {
            if let Some(value) = value {
                gen_expression(compiler, value, 0, false)?;
            }
            compiler.emit(format!("jmp {}", RETURN_LABEL));
        }
        StmtKind::Call(call) => gen_expression(compiler, call, 0, false)?,
        StmtKind::If(if_stmt) => {
            let end = format!(".L{}", compiler.next_label());
            gen_if(compiler, if_stmt, &end)?;
            compiler.emit_label(end);
        }
        StmtKind::While { predicate, block } => {
            let n = compiler.next_label();
            let (start, end) = (format!(".LOOP_START_{}", n), format!(".LOOP_END_{}", n));

            compiler.emit_label(&start);
            gen_condition(compiler, predicate, &end)?;
            gen_block(compiler, block)?;
            compiler.emit(format!("jmp {}", start));
            compiler.emit_label(end);
        }
        StmtKind::RangeFor {
            variable,
            start,
            end,
            block,
        } => {
            let slot = loop_variable_slot(compiler, variable)?;
            let n = compiler.next_label();
            let (loop_start, loop_end) = (format!(".LOOP_START_{}", n), format!(".LOOP_END_{}", n));

            gen_expression(compiler, start, 0, false)?;
            compiler.emit(format!("mov qword {}, rax", slot));

            compiler.emit_label(&loop_start);
            gen_expression(compiler, end, 0, false)?;
            compiler.emit(format!("cmp qword {}, rax", slot));
            compiler.emit(format!("jge {}", loop_end));

            gen_block(compiler, block)?;

            compiler.emit(format!("add qword {}, 1", slot));
            compiler.emit(format!("jmp {}", loop_start));
            compiler.emit_label(loop_end);
        }
        StmtKind::ArrayFor {
            variable,
            array,
            block,
            counter,
        } => {
            let slot = loop_variable_slot(compiler, variable)?;
            let function = compiler.current_function()?;
            let counter = counter
                .and_then(|id| function.variables.get(id.0))
                .ok_or_else(|| compiler.internal("array loop without a counter", &stmt.position))?;
            let counter_slot = compiler.variable_slot(counter)?;

            let array_ty = resolved_type(array)?;
            let (element_size, count) = match array_ty {
                Type::Array { element, count } => (element.size(), *count),
                _ => {
                    return Err(compiler.internal(
                        format!("array loop over non-array type {}", array_ty),
                        &array.position,
                    ))
                }
            };

            let n = compiler.next_label();
            let (loop_start, loop_end) = (format!(".LOOP_START_{}", n), format!(".LOOP_END_{}", n));

            compiler.emit(format!("mov qword {}, 0", counter_slot));
            compiler.emit_label(&loop_start);
            compiler.emit(format!("cmp qword {}, {}", counter_slot, count));
            compiler.emit(format!("jge {}", loop_end));

            gen_expression(compiler, array, 0, true)?;
            compiler.emit(format!("mov rcx, {}", counter_slot));
            compiler.emit(format!("imul rcx, {}", element_size));
            compiler.emit("add rax, rcx");
            compiler.emit("mov rax, [rax]");
            compiler.emit(format!("mov qword {}, rax", slot));

            gen_block(compiler, block)?;

            compiler.emit(format!("add qword {}, 1", counter_slot));
            compiler.emit(format!("jmp {}", loop_start));
            compiler.emit_label(loop_end);
        }
    }

    Ok(())
}

/// Emits one link of an if/else-if/else chain. Every taken branch jumps to
/// `end` once its block is done.
fn gen_if(compiler: &mut Compiler, if_stmt: &If, end: &str) -> Result<(), Error> {
    let Some(predicate) = &if_stmt.predicate else {
        return gen_block(compiler, &if_stmt.block);
    };

    let next = format!(".L{}", compiler.next_label());
    gen_condition(compiler, predicate, &next)?;
    gen_block(compiler, &if_stmt.block)?;

    if let Some(else_clause) = &if_stmt.else_clause {
        compiler.emit(format!("jmp {}", end));
        compiler.emit_label(next);
        gen_if(compiler, else_clause, end)?;
    } else {
        compiler.emit_label(next);
    }

    Ok(())
}

/// Evaluates a boolean predicate and jumps to `otherwise` when it is false.
fn gen_condition(compiler: &mut Compiler, predicate: &Expr, otherwise: &str) -> Result<(), Error> {
    gen_expression(compiler, predicate, 0, false)?;
    compiler.emit("cmp rax, 1");
    compiler.emit(format!("jne {}", otherwise));
    Ok(())
}

fn loop_variable_slot(compiler: &Compiler, variable: &Expr) -> Result<String, Error> {
    match &variable.kind {
        ExprKind::Variable(reference) => {
            let variable = compiler.variable(reference, &variable.position)?;
            compiler.variable_slot(variable)
        }
        _ => Err(compiler.internal("loop variable is not a plain variable", &variable.position)),
    }
}
