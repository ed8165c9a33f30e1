// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2025 Tobias Sarnowski <tobias@sarnowski.cloud>

//! The s-expression reader: lexer plus recursive-descent parser,
//! reading directly into heap cells (spec's "external collaborator"
//! framing; `SPEC_FULL.md` §F; grounded in `original_source/readparse.c`).

mod lexer;
mod parser;

pub use lexer::{LexError, Token};
pub use parser::ParseError;

use crate::cell::{Addr, Cell};
use crate::heap::{Heap, HeapError};
use crate::port::PortState;

/// The symbol a read that runs out of input produces, rather than an
/// error (`readparse.c::read_token`'s `TOK_EOF` branch).
pub const EOF_SYMBOL: &str = "#eof";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadError {
    Lex(LexError),
    Parse(ParseError),
    Heap(HeapError),
}

impl std::fmt::Display for ReadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadError::Lex(e) => write!(f, "{e}"),
            ReadError::Parse(e) => write!(f, "{e}"),
            ReadError::Heap(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ReadError {}

impl From<HeapError> for ReadError {
    fn from(e: HeapError) -> Self {
        ReadError::Heap(e)
    }
}

/// Reads exactly one expression from a string (the REPL's non-port
/// entry point, and the natural choice for test fixtures).
pub fn read_str(heap: &mut Heap, input: &str) -> Result<Addr, ReadError> {
    let bytes = input.as_bytes();
    let mut pos = 0;
    let mut lex = lexer::Lexer::new(|| {
        let b = bytes.get(pos).copied();
        if b.is_some() {
            pos += 1;
        }
        b
    });
    parser::parse_expr(heap, &mut lex)
}

/// Reads exactly one expression from an open input port (the `READ`
/// opcode's collaborator; spec §6's "input port"). Drains every byte
/// currently available from the port up front, parses one expression
/// from that snapshot, then pushes whatever the parse didn't consume
/// back onto the port's cursor — a string port's `offset` rewinds, a
/// file port seeks backward — so a second `READ` picks up exactly
/// where this one left off.
pub fn read_from_port(heap: &mut Heap, port: Addr) -> Result<Addr, ReadError> {
    let buf = drain_port(heap, port);
    let mut pos = 0usize;
    let mut lex = lexer::Lexer::new(|| {
        let b = buf.get(pos).copied();
        if b.is_some() {
            pos += 1;
        }
        b
    });
    let result = parser::parse_expr(heap, &mut lex);
    let consumed = pos;
    unread_port(heap, port, &buf[consumed..]);
    result
}

fn drain_port(heap: &mut Heap, port: Addr) -> Vec<u8> {
    let mut buf = Vec::new();
    loop {
        let is_str = matches!(heap.get(port), Cell::Port(PortState::Str { .. }));
        let is_file = matches!(heap.get(port), Cell::Port(PortState::File { .. }));
        if is_str {
            let target = match heap.get(port) {
                Cell::Port(PortState::Str { target, .. }) => *target,
                _ => unreachable!(),
            };
            let b = crate::port::read_str_byte(heap, target);
            if b == crate::port::EOF {
                break;
            }
            buf.push(b as u8);
        } else if is_file {
            let byte = match heap.get_mut(port) {
                Cell::Port(state) => state.read_file_byte(),
                _ => unreachable!(),
            };
            match byte {
                Ok(b) if b != crate::port::EOF => buf.push(b as u8),
                _ => break,
            }
        } else {
            break;
        }
    }
    buf
}

fn unread_port(heap: &mut Heap, port: Addr, leftover: &[u8]) {
    if leftover.is_empty() {
        return;
    }
    let is_str = matches!(heap.get(port), Cell::Port(PortState::Str { .. }));
    if is_str {
        let target = match heap.get(port) {
            Cell::Port(PortState::Str { target, .. }) => *target,
            _ => unreachable!(),
        };
        let (_, offset) = heap.str_parts(target);
        heap.set_str_offset(target, offset - leftover.len());
    } else if let Cell::Port(PortState::File { file, .. }) = heap.get_mut(port) {
        use std::io::{Seek, SeekFrom};
        let _ = file.seek(SeekFrom::Current(-(leftover.len() as i64)));
    }
}
