// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2025 Tobias Sarnowski <tobias@sarnowski.cloud>

//! Recursive-descent parser turning a [`Lexer`]'s token stream
//! directly into heap cells — there is no separate untyped-AST stage,
//! matching `readparse.c::read_token`'s habit of consing cells as it
//! goes rather than building an intermediate tree.

use super::lexer::{Lexer, Token};
use super::ReadError;
use crate::cell::{self, Addr};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseError {
    UnexpectedEof,
    UnmatchedParen,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::UnexpectedEof => f.write_str("unexpected end of input"),
            ParseError::UnmatchedParen => f.write_str("unmatched closing paren"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Parses exactly one expression. Running out of input before any
/// token is seen is *not* an error: it yields the distinguished EOF
/// symbol (`super::EOF_SYMBOL`), matching `TOK_EOF`'s treatment as an
/// ordinary datum in `readparse.c::read_token`.
pub fn parse_expr<R: FnMut() -> Option<u8>>(
    heap: &mut crate::heap::Heap,
    lex: &mut Lexer<R>,
) -> Result<Addr, ReadError> {
    match lex.next_token().map_err(ReadError::Lex)? {
        None => cell::alloc_sym(heap, super::EOF_SYMBOL).map_err(ReadError::Heap),
        Some(Token::LParen) => parse_list(heap, lex),
        Some(Token::RParen) => Err(ReadError::Parse(ParseError::UnmatchedParen)),
        Some(Token::VecOpen) => parse_vector(heap, lex),
        Some(Token::Quote) => wrap(heap, lex, "quote"),
        Some(Token::Quasiquote) => wrap(heap, lex, "quasiquote"),
        Some(Token::Unquote) => wrap(heap, lex, "unquote"),
        Some(Token::UnquoteSplicing) => wrap(heap, lex, "unquote-splicing"),
        Some(Token::Int(n)) => cell::alloc_int(heap, n).map_err(ReadError::Heap),
        Some(Token::Str(bytes)) => cell::alloc_str(heap, &bytes).map_err(ReadError::Heap),
        Some(Token::Symbol(name)) => cell::alloc_sym(heap, &name).map_err(ReadError::Heap),
    }
}

fn wrap<R: FnMut() -> Option<u8>>(
    heap: &mut crate::heap::Heap,
    lex: &mut Lexer<R>,
    name: &str,
) -> Result<Addr, ReadError> {
    let inner = parse_expr(heap, lex)?;
    let sym = cell::alloc_sym(heap, name).map_err(ReadError::Heap)?;
    let tail = cell::cons(heap, inner, Addr::NIL).map_err(ReadError::Heap)?;
    cell::cons(heap, sym, tail).map_err(ReadError::Heap)
}

/// Parses the tail of a list after its opening `(` has been consumed,
/// including the dotted-pair form `(a b . c)` (the token `.` is just
/// an ordinary [`Token::Symbol`] whose text happens to be `"."`).
fn parse_list<R: FnMut() -> Option<u8>>(
    heap: &mut crate::heap::Heap,
    lex: &mut Lexer<R>,
) -> Result<Addr, ReadError> {
    let mut items = Vec::new();
    let mut tail = Addr::NIL;
    loop {
        match lex.peek_token().map_err(ReadError::Lex)? {
            None => return Err(ReadError::Parse(ParseError::UnexpectedEof)),
            Some(Token::RParen) => {
                lex.next_token().map_err(ReadError::Lex)?;
                break;
            }
            Some(Token::Symbol(s)) if s == "." => {
                lex.next_token().map_err(ReadError::Lex)?;
                tail = parse_expr(heap, lex)?;
                match lex.next_token().map_err(ReadError::Lex)? {
                    Some(Token::RParen) => break,
                    _ => return Err(ReadError::Parse(ParseError::UnmatchedParen)),
                }
            }
            _ => items.push(parse_expr(heap, lex)?),
        }
    }
    let mut list = tail;
    for item in items.into_iter().rev() {
        list = cell::cons(heap, item, list).map_err(ReadError::Heap)?;
    }
    Ok(list)
}

/// Parses the tail of a vector literal after `#(` has been consumed.
fn parse_vector<R: FnMut() -> Option<u8>>(
    heap: &mut crate::heap::Heap,
    lex: &mut Lexer<R>,
) -> Result<Addr, ReadError> {
    let mut elems = Vec::new();
    loop {
        match lex.peek_token().map_err(ReadError::Lex)? {
            None => return Err(ReadError::Parse(ParseError::UnexpectedEof)),
            Some(Token::RParen) => {
                lex.next_token().map_err(ReadError::Lex)?;
                break;
            }
            _ => elems.push(parse_expr(heap, lex)?),
        }
    }
    cell::alloc_vector(heap, &elems).map_err(ReadError::Heap)
}

#[cfg(test)]
#[path = "parser_test.rs"]
mod parser_test;
