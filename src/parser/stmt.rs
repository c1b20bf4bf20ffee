use crate::{
    ast::{
        ast::{Function, Import, Module, Parameter, Symbol},
        expressions::{Expr, ExprKind},
        statements::{Block, Declaration, Identifier, If, Stmt, StmtKind},
    },
    errors::errors::Error,
    lexer::{lexer::unescape, tokens::TokenKind},
    parser::{expr::parse_expr, lookups::BindingPower},
};

use super::{
    parser::Parser,
    types::{parse_type, starts_declaration},
};

/// Parses one top-level item: an import, an `extern` declaration or a
/// function definition.
pub fn parse_top_level(
    parser: &mut Parser,
    module: &mut Module,
    functions: &mut Vec<Function>,
) -> Result<(), Error> {
    match parser.current_token_kind() {
        TokenKind::Import => {
            module.imports.push(parse_import(parser)?);
        }
        TokenKind::Extern => {
            parser.advance();
            let function = parse_function_header(parser)?;
            parser.expect(TokenKind::Semicolon)?;
            functions.push(function);
        }
        _ => {
            let mut function = parse_function_header(parser)?;
            function.block = Some(parse_block(parser)?);
            functions.push(function);
        }
    }

    Ok(())
}

fn parse_import(parser: &mut Parser) -> Result<Import, Error> {
    let position = parser.expect(TokenKind::Import)?.span.start;

    let is_assembly = parser.current_token_kind() == TokenKind::Asm;
    if is_assembly {
        parser.advance();
    }

    let error = parser.unexpected_detailed("expected import path string");
    let token = parser.expect_error(TokenKind::String, Some(error))?;
    let path = match unescape(&token.value) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => token.value,
    };
    parser.expect(TokenKind::Semicolon)?;

    Ok(Import {
        path,
        is_assembly,
        position,
    })
}

/// `Type name(Type a, Type b)`, leaving the body (or `;`) to the caller.
fn parse_function_header(parser: &mut Parser) -> Result<Function, Error> {
    let position = parser.get_position();
    let return_type = parse_type(parser, BindingPower::Default)?;

    let error = parser.unexpected_detailed("expected function name");
    let name = parser.expect_error(TokenKind::Identifier, Some(error))?;

    parser.expect(TokenKind::OpenParen)?;

    let mut arguments = vec![];
    while parser.current_token_kind() != TokenKind::CloseParen {
        let ty = parse_type(parser, BindingPower::Default)?;
        let error = parser.unexpected_detailed("expected argument name");
        let argument = parser.expect_error(TokenKind::Identifier, Some(error))?;

        arguments.push(Parameter {
            name: argument.value,
            ty,
            position: argument.span.start,
        });

        if parser.current_token_kind() != TokenKind::CloseParen {
            parser.expect(TokenKind::Comma)?;
        }
    }
    parser.expect(TokenKind::CloseParen)?;

    Ok(Function::new(
        Symbol::new(parser.module_name(), &name.value),
        arguments,
        return_type,
        None,
        position,
    ))
}

pub fn parse_block(parser: &mut Parser) -> Result<Block, Error> {
    let position = parser.expect(TokenKind::OpenCurly)?.span.start;

    let mut statements = vec![];
    while parser.current_token_kind() != TokenKind::CloseCurly {
        if !parser.has_tokens() {
            return Err(parser.unexpected_detailed("expected '}'"));
        }
        statements.push(parse_stmt(parser)?);
    }

    parser.expect(TokenKind::CloseCurly)?;

    Ok(Block {
        statements,
        position,
    })
}

pub fn parse_stmt(parser: &mut Parser) -> Result<Stmt, Error> {
    let kind = parser.current_token_kind();
    if let Some(handler) = parser.get_stmt_lookup().get(&kind).copied() {
        return handler(parser);
    }

    if starts_declaration(parser) {
        return parse_declaration_stmt(parser);
    }

    let position = parser.get_position();
    let expr = parse_expr(parser, BindingPower::Default)?;

    if parser.current_token_kind() == TokenKind::Assignment {
        parser.advance();
        let rhs = parse_expr(parser, BindingPower::Default)?;
        parser.expect(TokenKind::Semicolon)?;

        return Ok(Stmt::new(StmtKind::Assignment { lhs: expr, rhs }, position));
    }

    if matches!(expr.kind, ExprKind::Call(_)) {
        parser.expect(TokenKind::Semicolon)?;
        return Ok(Stmt::new(StmtKind::Call(expr), position));
    }

    Err(parser.unexpected_detailed("expected assignment or function call"))
}

fn parse_declaration_stmt(parser: &mut Parser) -> Result<Stmt, Error> {
    let position = parser.get_position();
    let ty = parse_type(parser, BindingPower::Default)?;

    let mut names = vec![];
    loop {
        let error = parser.unexpected_detailed("expected identifier during variable declaration");
        let name = parser.expect_error(TokenKind::Identifier, Some(error))?;
        names.push(Identifier {
            name: name.value,
            position: name.span.start,
        });

        if parser.current_token_kind() == TokenKind::Comma {
            parser.advance();
        } else {
            break;
        }
    }

    parser.expect(TokenKind::Semicolon)?;

    Ok(Stmt::new(
        StmtKind::Declaration(Declaration {
            ty,
            names,
            in_outer_block: false,
        }),
        position,
    ))
}

fn parse_condition(parser: &mut Parser) -> Result<Expr, Error> {
    parser.expect(TokenKind::OpenParen)?;
    let predicate = parse_expr(parser, BindingPower::Default)?;
    parser.expect(TokenKind::CloseParen)?;
    Ok(predicate)
}

fn parse_if_chain(parser: &mut Parser) -> Result<If, Error> {
    let position = parser.expect(TokenKind::If)?.span.start;
    let predicate = parse_condition(parser)?;
    let block = parse_block(parser)?;

    let else_clause = if parser.current_token_kind() == TokenKind::Else {
        let else_position = parser.advance().span.start;

        if parser.current_token_kind() == TokenKind::If {
            Some(Box::new(parse_if_chain(parser)?))
        } else {
            Some(Box::new(If {
                predicate: None,
                block: parse_block(parser)?,
                else_clause: None,
                position: else_position,
            }))
        }
    } else {
        None
    };

    Ok(If {
        predicate: Some(predicate),
        block,
        else_clause,
        position,
    })
}

pub fn parse_if_stmt(parser: &mut Parser) -> Result<Stmt, Error> {
    let if_stmt = parse_if_chain(parser)?;
    let position = if_stmt.position.clone();

    Ok(Stmt::new(StmtKind::If(if_stmt), position))
}

pub fn parse_while_stmt(parser: &mut Parser) -> Result<Stmt, Error> {
    let position = parser.expect(TokenKind::While)?.span.start;
    let predicate = parse_condition(parser)?;
    let block = parse_block(parser)?;

    Ok(Stmt::new(StmtKind::While { predicate, block }, position))
}

/// `for (v in start .. end) {}` or `for (v in array) {}`.
pub fn parse_for_stmt(parser: &mut Parser) -> Result<Stmt, Error> {
    let position = parser.expect(TokenKind::For)?.span.start;
    parser.expect(TokenKind::OpenParen)?;

    let variable = parse_expr(parser, BindingPower::Default)?;
    parser.expect(TokenKind::In)?;
    let first = parse_expr(parser, BindingPower::Default)?;

    let kind = if parser.current_token_kind() == TokenKind::DotDot {
        parser.advance();
        let end = parse_expr(parser, BindingPower::Default)?;
        parser.expect(TokenKind::CloseParen)?;

        StmtKind::RangeFor {
            variable,
            start: first,
            end,
            block: parse_block(parser)?,
        }
    } else {
        parser.expect(TokenKind::CloseParen)?;

        StmtKind::ArrayFor {
            variable,
            array: first,
            block: parse_block(parser)?,
            counter: None,
        }
    };

    Ok(Stmt::new(kind, position))
}

pub fn parse_return_stmt(parser: &mut Parser) -> Result<Stmt, Error> {
    let position = parser.expect(TokenKind::Return)?.span.start;

    if parser.current_token_kind() == TokenKind::Semicolon {
        parser.advance();
        return Ok(Stmt::new(StmtKind::Return(None), position));
    }

    let expr = parse_expr(parser, BindingPower::Default)?;
    parser.expect(TokenKind::Semicolon)?;

    Ok(Stmt::new(StmtKind::Return(Some(expr)), position))
}
