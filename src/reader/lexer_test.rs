// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2025 Tobias Sarnowski <tobias@sarnowski.cloud>

use super::*;

fn lex_all(input: &str) -> Vec<Token> {
    let bytes = input.as_bytes();
    let mut pos = 0;
    let mut lex = Lexer::new(|| {
        let b = bytes.get(pos).copied();
        if b.is_some() {
            pos += 1;
        }
        b
    });
    let mut out = Vec::new();
    while let Some(t) = lex.next_token().unwrap() {
        out.push(t);
    }
    out
}

#[test]
fn tokenizes_parens_and_atoms() {
    assert_eq!(
        lex_all("(add 1 2)"),
        vec![
            Token::LParen,
            Token::Symbol("add".to_string()),
            Token::Int(1),
            Token::Int(2),
            Token::RParen,
        ]
    );
}

#[test]
fn negative_and_positive_integers() {
    assert_eq!(lex_all("-5 +5"), vec![Token::Int(-5), Token::Int(5)]);
}

#[test]
fn hash_prefixed_symbols_stay_symbols() {
    assert_eq!(lex_all("#t #f #eof"), vec![
        Token::Symbol("#t".to_string()),
        Token::Symbol("#f".to_string()),
        Token::Symbol("#eof".to_string()),
    ]);
}

#[test]
fn vector_open_token() {
    assert_eq!(lex_all("#(1 2)"), vec![Token::VecOpen, Token::Int(1), Token::Int(2), Token::RParen]);
}

#[test]
fn quote_family_tokens() {
    assert_eq!(lex_all("'a`b,c,@d"), vec![
        Token::Quote,
        Token::Symbol("a".to_string()),
        Token::Quasiquote,
        Token::Symbol("b".to_string()),
        Token::Unquote,
        Token::Symbol("c".to_string()),
        Token::UnquoteSplicing,
        Token::Symbol("d".to_string()),
    ]);
}

#[test]
fn comments_are_skipped() {
    assert_eq!(lex_all("1 ; this is a comment\n2"), vec![Token::Int(1), Token::Int(2)]);
}

#[test]
fn string_literal_with_escapes() {
    assert_eq!(lex_all(r#""a\nb\"c""#), vec![Token::Str(b"a\nb\"c".to_vec())]);
}

#[test]
fn string_hex_escape() {
    assert_eq!(lex_all(r#""\x41;""#), vec![Token::Str(b"A".to_vec())]);
}

#[test]
fn unterminated_string_is_an_error() {
    let bytes = b"\"abc";
    let mut pos = 0;
    let mut lex = Lexer::new(|| {
        let b = bytes.get(pos).copied();
        if b.is_some() {
            pos += 1;
        }
        b
    });
    assert_eq!(lex.next_token(), Err(LexError::UnterminatedString));
}

#[test]
fn peek_token_does_not_consume() {
    let bytes = b"1 2";
    let mut pos = 0;
    let mut lex = Lexer::new(|| {
        let b = bytes.get(pos).copied();
        if b.is_some() {
            pos += 1;
        }
        b
    });
    assert_eq!(lex.peek_token().unwrap(), Some(Token::Int(1)));
    assert_eq!(lex.peek_token().unwrap(), Some(Token::Int(1)));
    assert_eq!(lex.next_token().unwrap(), Some(Token::Int(1)));
    assert_eq!(lex.next_token().unwrap(), Some(Token::Int(2)));
}

#[test]
fn wrapping_overflow_integer_does_not_panic() {
    let huge = "99999999999999999999999999999999";
    match &lex_all(huge)[..] {
        [Token::Int(_)] => {}
        other => panic!("expected a single wrapped Int token, got {other:?}"),
    }
}
