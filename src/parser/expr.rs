use std::rc::Rc;

use crate::{
    ast::{
        ast::Symbol,
        expressions::{BinaryOperator, Expr, ExprKind, FunctionCall, Literal, UnaryOperator},
    },
    errors::errors::{Error, ErrorImpl},
    lexer::{lexer::unescape, tokens::TokenKind},
    Position,
};

use super::{lookups::BindingPower, parser::Parser};

pub fn parse_expr(parser: &mut Parser, bp: BindingPower) -> Result<Expr, Error> {
    // First parse NUD
    let token_kind = parser.current_token_kind();
    let nud = match parser.get_nud_lookup().get(&token_kind) {
        Some(nud) => *nud,
        None => return Err(parser.unexpected()),
    };

    let mut left = nud(parser)?;

    // While LED and current BP is less than BP of current token, continue parsing lhs
    loop {
        let token_kind = parser.current_token_kind();
        let token_bp = *parser
            .get_bp_lookup()
            .get(&token_kind)
            .unwrap_or(&BindingPower::Default);

        if token_bp <= bp {
            break;
        }

        let led = match parser.get_led_lookup().get(&token_kind) {
            Some(led) => *led,
            None => return Err(parser.unexpected()),
        };

        left = led(parser, left, token_bp)?;
    }

    Ok(left)
}

pub fn parse_primary_expr(parser: &mut Parser) -> Result<Expr, Error> {
    match parser.current_token_kind() {
        TokenKind::Number => {
            let token = parser.advance();
            match token.value.parse::<i64>() {
                Ok(value) => Ok(Expr::integer(value, token.span.start)),
                Err(_) => Err(Error::new(
                    ErrorImpl::NumberParseError { token: token.value },
                    token.span.start,
                )),
            }
        }
        TokenKind::True | TokenKind::False => {
            let token = parser.advance();
            Ok(Expr::boolean(
                token.kind == TokenKind::True,
                token.span.start,
            ))
        }
        TokenKind::String => {
            let token = parser.advance();
            let value = unescape(&token.value).map_err(|escape| {
                Error::new(
                    ErrorImpl::UnrecognisedToken { token: escape },
                    token.span.start.clone(),
                )
            })?;
            let index = parser.intern_string(value.clone());
            Ok(Expr::new(
                ExprKind::Literal(Literal::String { value, index }),
                token.span.start,
            ))
        }
        TokenKind::Identifier => {
            // `module:name(...)` names a function of another module.
            if parser.peek_kind(1) == TokenKind::Colon
                && parser.peek_kind(2) == TokenKind::Identifier
                && parser.peek_kind(3) == TokenKind::OpenParen
            {
                let module = parser.advance();
                parser.advance();
                let name = parser.advance();
                let symbol = Symbol::new(Rc::new(module.value), &name.value);
                return parse_call_arguments(parser, symbol, module.span.start);
            }

            let token = parser.advance();
            if parser.current_token_kind() == TokenKind::OpenParen {
                let symbol = Symbol::new(parser.module_name(), &token.value);
                return parse_call_arguments(parser, symbol, token.span.start);
            }

            Ok(Expr::variable(&token.value, token.span.start))
        }
        _ => Err(parser.unexpected()),
    }
}

fn parse_call_arguments(
    parser: &mut Parser,
    symbol: Symbol,
    position: Position,
) -> Result<Expr, Error> {
    parser.expect(TokenKind::OpenParen)?;

    let mut arguments = vec![];

    while parser.current_token_kind() != TokenKind::CloseParen {
        arguments.push(parse_expr(parser, BindingPower::Default)?);

        if parser.current_token_kind() != TokenKind::CloseParen {
            parser.expect(TokenKind::Comma)?;
        }
    }

    parser.expect(TokenKind::CloseParen)?;

    let id = parser.advance_call_id();
    Ok(Expr::new(
        ExprKind::Call(FunctionCall {
            id,
            symbol,
            arguments,
            function: None,
        }),
        position,
    ))
}

pub fn parse_binary_expr(parser: &mut Parser, left: Expr, bp: BindingPower) -> Result<Expr, Error> {
    let operator_token = parser.advance();

    let operator = match operator_token.kind {
        TokenKind::Or => BinaryOperator::LogicalOr,
        TokenKind::And => BinaryOperator::LogicalAnd,
        TokenKind::Equals => BinaryOperator::Equal,
        TokenKind::NotEquals => BinaryOperator::NotEqual,
        TokenKind::Greater => BinaryOperator::Greater,
        TokenKind::GreaterEquals => BinaryOperator::GreaterEq,
        TokenKind::Less => BinaryOperator::Less,
        TokenKind::LessEquals => BinaryOperator::LessEq,
        TokenKind::Plus => BinaryOperator::Add,
        TokenKind::Dash => BinaryOperator::Sub,
        TokenKind::Slash => BinaryOperator::Div,
        TokenKind::Star => BinaryOperator::Mul,
        TokenKind::Percent => BinaryOperator::Mod,
        _ => {
            return Err(Error::new(
                ErrorImpl::UnexpectedToken {
                    token: operator_token.value,
                },
                operator_token.span.start,
            ))
        }
    };

    let right = parse_expr(parser, bp)?;

    Ok(Expr::binary(operator, left, right))
}

pub fn parse_index_expr(parser: &mut Parser, left: Expr, _bp: BindingPower) -> Result<Expr, Error> {
    parser.expect(TokenKind::OpenBracket)?;
    let index = parse_expr(parser, BindingPower::Default)?;
    parser.expect(TokenKind::CloseBracket)?;

    Ok(Expr::binary(BinaryOperator::Index, left, index))
}

pub fn parse_prefix_expr(parser: &mut Parser) -> Result<Expr, Error> {
    let operator_token = parser.advance();

    let operator = match operator_token.kind {
        TokenKind::Dash => UnaryOperator::Minus,
        TokenKind::Not => UnaryOperator::LogicalNot,
        TokenKind::Ampersand => UnaryOperator::AddressOf,
        TokenKind::Star => UnaryOperator::Dereference,
        _ => {
            return Err(Error::new(
                ErrorImpl::UnexpectedToken {
                    token: operator_token.value,
                },
                operator_token.span.start,
            ))
        }
    };

    let operand = parse_expr(parser, BindingPower::Unary)?;

    Ok(Expr::unary(operator, operand, operator_token.span.start))
}

pub fn parse_grouping_expr(parser: &mut Parser) -> Result<Expr, Error> {
    parser.expect(TokenKind::OpenParen)?;
    let expr = parse_expr(parser, BindingPower::Default)?;
    parser.expect(TokenKind::CloseParen)?;

    Ok(expr)
}
