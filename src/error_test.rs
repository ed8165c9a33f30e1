// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2025 Tobias Sarnowski <tobias@sarnowski.cloud>

use super::*;
use crate::heap::HeapError;
use crate::reader::{LexError, ParseError};

#[test]
fn from_read_error_wraps_lex_error() {
    let e: SecdError = ReadError::Lex(LexError::UnterminatedString).into();
    assert!(matches!(e, SecdError::Read(ReadError::Lex(LexError::UnterminatedString))));
}

#[test]
fn from_read_error_wraps_parse_error() {
    let e: SecdError = ReadError::Parse(ParseError::UnmatchedParen).into();
    assert!(matches!(e, SecdError::Read(ReadError::Parse(ParseError::UnmatchedParen))));
}

#[test]
fn from_compile_error() {
    let e: SecdError = CompileError::UnknownOpcode.into();
    assert!(matches!(e, SecdError::Compile(CompileError::UnknownOpcode)));
}

#[test]
fn from_runtime_error() {
    let e: SecdError = RuntimeError::DivisionByZero.into();
    assert!(matches!(e, SecdError::Runtime(RuntimeError::DivisionByZero)));
}

#[test]
fn from_heap_error() {
    let e: SecdError = HeapError::OutOfMemory.into();
    assert!(matches!(e, SecdError::Heap(HeapError::OutOfMemory)));
}

#[test]
fn display_prefixes_each_layer() {
    let e: SecdError = RuntimeError::UnboundSymbol.into();
    assert_eq!(e.to_string(), "runtime error: unbound symbol");

    let e: SecdError = HeapError::OutOfMemory.into();
    assert_eq!(e.to_string(), "heap exhausted");
}
