// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2025 Tobias Sarnowski <tobias@sarnowski.cloud>

//! Byte-level tokenizer, pulled one byte at a time from a caller-
//! supplied source (a string slice for top-level `read_str`, or a
//! port's bytes for `READ`). Grounded in `original_source/readparse.c`
//! (`lexnext`/`issymbc`/`not_symbol_chars`/`lexstring`).

#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    LParen,
    RParen,
    VecOpen,
    Quote,
    Quasiquote,
    Unquote,
    UnquoteSplicing,
    Int(i64),
    Str(Vec<u8>),
    Symbol(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LexError {
    UnterminatedString,
    InvalidEscape,
    InvalidHexEscape,
}

impl std::fmt::Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LexError::UnterminatedString => f.write_str("unterminated string literal"),
            LexError::InvalidEscape => f.write_str("invalid string escape"),
            LexError::InvalidHexEscape => f.write_str("invalid \\xNN; escape"),
        }
    }
}

impl std::error::Error for LexError {}

/// A character a bare symbol token must not contain
/// (`readparse.c`'s `not_symbol_chars`), plus ASCII control codes.
fn breaks_symbol(b: u8) -> bool {
    b < 0x20 || matches!(b, b' ' | b'(' | b')' | b';' | b'"' | b'\'' | b'`' | b',')
}

/// Pulls tokens from a byte source `next` one call at a time, with a
/// single token of lookahead. `next` returning `None` is EOF.
pub struct Lexer<R: FnMut() -> Option<u8>> {
    next: R,
    peeked_byte: Option<u8>,
    pending: Option<Option<Token>>,
}

impl<R: FnMut() -> Option<u8>> Lexer<R> {
    pub fn new(next: R) -> Self {
        Lexer {
            next,
            peeked_byte: None,
            pending: None,
        }
    }

    fn peek_byte(&mut self) -> Option<u8> {
        if self.peeked_byte.is_none() {
            self.peeked_byte = (self.next)();
        }
        self.peeked_byte
    }

    fn advance_byte(&mut self) -> Option<u8> {
        self.peeked_byte.take().or_else(|| (self.next)())
    }

    /// Non-consuming lookahead: the next [`Token`], cached until the
    /// following [`Lexer::next_token`] call.
    pub fn peek_token(&mut self) -> Result<Option<Token>, LexError> {
        if self.pending.is_none() {
            self.pending = Some(self.scan_token()?);
        }
        Ok(self.pending.clone().unwrap())
    }

    pub fn next_token(&mut self) -> Result<Option<Token>, LexError> {
        if let Some(t) = self.pending.take() {
            return Ok(t);
        }
        self.scan_token()
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek_byte() {
                Some(b) if b.is_ascii_whitespace() => {
                    self.advance_byte();
                }
                Some(b';') => {
                    while !matches!(self.peek_byte(), Some(b'\n') | None) {
                        self.advance_byte();
                    }
                }
                _ => break,
            }
        }
    }

    fn scan_token(&mut self) -> Result<Option<Token>, LexError> {
        self.skip_whitespace_and_comments();
        let Some(b) = self.peek_byte() else {
            return Ok(None);
        };
        match b {
            b'(' => {
                self.advance_byte();
                Ok(Some(Token::LParen))
            }
            b')' => {
                self.advance_byte();
                Ok(Some(Token::RParen))
            }
            b'\'' => {
                self.advance_byte();
                Ok(Some(Token::Quote))
            }
            b'`' => {
                self.advance_byte();
                Ok(Some(Token::Quasiquote))
            }
            b',' => {
                self.advance_byte();
                if self.peek_byte() == Some(b'@') {
                    self.advance_byte();
                    Ok(Some(Token::UnquoteSplicing))
                } else {
                    Ok(Some(Token::Unquote))
                }
            }
            b'"' => self.scan_string().map(Some),
            b'#' => {
                self.advance_byte();
                if self.peek_byte() == Some(b'(') {
                    self.advance_byte();
                    Ok(Some(Token::VecOpen))
                } else {
                    Ok(Some(self.scan_symbol_tail("#")))
                }
            }
            _ => Ok(Some(self.scan_symbol_tail(""))),
        }
    }

    fn scan_string(&mut self) -> Result<Token, LexError> {
        self.advance_byte(); // opening quote
        let mut bytes = Vec::new();
        loop {
            match self.advance_byte() {
                None => return Err(LexError::UnterminatedString),
                Some(b'"') => break,
                Some(b'\\') => bytes.extend(self.scan_escape()?),
                Some(b) => bytes.push(b),
            }
        }
        Ok(Token::Str(bytes))
    }

    fn scan_escape(&mut self) -> Result<Vec<u8>, LexError> {
        match self.advance_byte() {
            Some(b'a') => Ok(vec![0x07]),
            Some(b'b') => Ok(vec![0x08]),
            Some(b't') => Ok(vec![b'\t']),
            Some(b'n') => Ok(vec![b'\n']),
            Some(b'\\') => Ok(vec![b'\\']),
            Some(b'"') => Ok(vec![b'"']),
            Some(b'x') => self.scan_hex_escape(),
            _ => Err(LexError::InvalidEscape),
        }
    }

    fn scan_hex_escape(&mut self) -> Result<Vec<u8>, LexError> {
        let mut digits = String::new();
        while let Some(b) = self.peek_byte() {
            if b.is_ascii_hexdigit() {
                digits.push(b as char);
                self.advance_byte();
            } else {
                break;
            }
        }
        if self.advance_byte() != Some(b';') || digits.is_empty() {
            return Err(LexError::InvalidHexEscape);
        }
        let code = u32::from_str_radix(&digits, 16).map_err(|_| LexError::InvalidHexEscape)?;
        let ch = char::from_u32(code).ok_or(LexError::InvalidHexEscape)?;
        let mut buf = [0u8; 4];
        Ok(ch.encode_utf8(&mut buf).as_bytes().to_vec())
    }

    /// Scans a run of non-breaking bytes, with `prefix` (already
    /// consumed, e.g. a lone `#`) prepended, then classifies the
    /// result as an [`Token::Int`] or [`Token::Symbol`].
    fn scan_symbol_tail(&mut self, prefix: &str) -> Token {
        let mut bytes = prefix.as_bytes().to_vec();
        while let Some(b) = self.peek_byte() {
            if breaks_symbol(b) {
                break;
            }
            bytes.push(b);
            self.advance_byte();
        }
        let text = String::from_utf8_lossy(&bytes).into_owned();
        match parse_int(&text) {
            Some(n) => Token::Int(n),
            None => Token::Symbol(text),
        }
    }
}

/// Parses a run of ASCII digits with an optional leading sign,
/// wrapping on overflow rather than failing (spec §4.E: integers wrap,
/// they never trap).
fn parse_int(token: &str) -> Option<i64> {
    let (neg, digits) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token.strip_prefix('+').unwrap_or(token)),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let mut value: i64 = 0;
    for b in digits.bytes() {
        value = value.wrapping_mul(10).wrapping_add(i64::from(b - b'0'));
    }
    Some(if neg { value.wrapping_neg() } else { value })
}

#[cfg(test)]
#[path = "lexer_test.rs"]
mod lexer_test;
