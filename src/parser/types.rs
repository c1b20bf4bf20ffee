//! Type parsing implementation.
//!
//! A type is a name followed by any number of postfix suffixes, applied
//! left to right:
//!
//! - `[N]` wraps the type so far in an array of `N` elements
//! - `*` wraps the type so far in a pointer
//!
//! so `int64[5]*` is a pointer to an array of five `int64`. Like expression
//! parsing, it uses NUD/LED handlers with binding powers.

use std::collections::HashMap;

use crate::{
    ast::types::{Type, MAX_OBJECT_SIZE},
    errors::errors::{Error, ErrorImpl},
    lexer::tokens::TokenKind,
};

use super::{lookups::BindingPower, parser::Parser};

/// Type alias for type null denotation handler functions.
pub type TypeNUDHandler = fn(&mut Parser) -> Result<Type, Error>;

/// Type alias for type left denotation handler functions.
pub type TypeLEDHandler = fn(&mut Parser, Type, BindingPower) -> Result<Type, Error>;

/// Type alias for type NUD lookup table.
pub type TypeNUDLookup = HashMap<TokenKind, TypeNUDHandler>;

/// Type alias for type LED lookup table.
pub type TypeLEDLookup = HashMap<TokenKind, TypeLEDHandler>;

/// Type alias for type binding power lookup table.
pub type TypeBPLookup = HashMap<TokenKind, BindingPower>;

/// Initializes the type parsing lookup tables.
pub fn create_token_type_lookups(parser: &mut Parser) {
    parser.type_nud(TokenKind::Identifier, parse_symbol_type);
    parser.type_led(TokenKind::OpenBracket, BindingPower::Index, parse_array_type);
    parser.type_led(TokenKind::Star, BindingPower::Index, parse_pointer_type);
}

pub fn parse_symbol_type(parser: &mut Parser) -> Result<Type, Error> {
    let token = parser.expect(TokenKind::Identifier)?;
    Ok(Type::named(&token.value, token.span.start))
}

pub fn parse_array_type(parser: &mut Parser, left: Type, _bp: BindingPower) -> Result<Type, Error> {
    parser.expect(TokenKind::OpenBracket)?;

    let error = parser.unexpected_detailed("expected array length");
    let count = parser.expect_error(TokenKind::Number, Some(error))?;
    let position = count.span.start.clone();
    let count = count.value.parse::<u64>().map_err(|_| {
        Error::new(
            ErrorImpl::NumberParseError {
                token: count.value.clone(),
            },
            position.clone(),
        )
    })?;

    let fits = left
        .size()
        .checked_mul(count)
        .is_some_and(|size| size <= MAX_OBJECT_SIZE);
    if !fits {
        return Err(Error::new(
            ErrorImpl::ArrayTooLarge {
                type_: format!("{}[{}]", left, count),
            },
            position,
        ));
    }

    parser.expect(TokenKind::CloseBracket)?;

    Ok(Type::array_of(left, count))
}

pub fn parse_pointer_type(parser: &mut Parser, left: Type, _bp: BindingPower) -> Result<Type, Error> {
    parser.expect(TokenKind::Star)?;
    Ok(Type::pointer_to(left))
}

pub fn parse_type(parser: &mut Parser, bp: BindingPower) -> Result<Type, Error> {
    // First parse NUD
    let token_kind = parser.current_token_kind();
    let nud = match parser.get_type_nud_lookup().get(&token_kind) {
        Some(nud) => *nud,
        None => return Err(parser.unexpected_detailed("expected type")),
    };

    let mut left = nud(parser)?;

    // While LED and current BP is less than BP of current token, continue parsing lhs
    loop {
        let token_kind = parser.current_token_kind();
        let token_bp = *parser
            .get_type_bp_lookup()
            .get(&token_kind)
            .unwrap_or(&BindingPower::Default);

        if token_bp <= bp {
            break;
        }

        let led = match parser.get_type_led_lookup().get(&token_kind) {
            Some(led) => *led,
            None => return Err(parser.unexpected()),
        };

        left = led(parser, left, token_bp)?;
    }

    Ok(left)
}

/// Whether the tokens at the current position read `Type Identifier`,
/// i.e. start a declaration rather than an expression.
pub fn starts_declaration(parser: &Parser) -> bool {
    if parser.peek_kind(0) != TokenKind::Identifier {
        return false;
    }

    let mut n = 1;
    loop {
        match parser.peek_kind(n) {
            TokenKind::Star => n += 1,
            TokenKind::OpenBracket
                if parser.peek_kind(n + 1) == TokenKind::Number
                    && parser.peek_kind(n + 2) == TokenKind::CloseBracket =>
            {
                n += 3
            }
            TokenKind::Identifier => return true,
            _ => return false,
        }
    }
}
