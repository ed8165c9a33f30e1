// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2025 Tobias Sarnowski <tobias@sarnowski.cloud>

//! Top-level error aggregation for callers (the REPL binary, tests)
//! that want one type spanning every layer, composed via `From` the
//! way the teacher's `reader::ReadError` composes `LexError`/
//! `ParseError` (`SPEC_FULL.md` §K).

use crate::compiler::CompileError;
use crate::heap::HeapError;
use crate::reader::ReadError;
use crate::vm::RuntimeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecdError {
    Read(ReadError),
    Compile(CompileError),
    Runtime(RuntimeError),
    Heap(HeapError),
}

impl std::fmt::Display for SecdError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecdError::Read(e) => write!(f, "read error: {e}"),
            SecdError::Compile(e) => write!(f, "compile error: {e}"),
            SecdError::Runtime(e) => write!(f, "runtime error: {e}"),
            SecdError::Heap(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for SecdError {}

impl From<ReadError> for SecdError {
    fn from(e: ReadError) -> Self {
        SecdError::Read(e)
    }
}

impl From<CompileError> for SecdError {
    fn from(e: CompileError) -> Self {
        SecdError::Compile(e)
    }
}

impl From<RuntimeError> for SecdError {
    fn from(e: RuntimeError) -> Self {
        SecdError::Runtime(e)
    }
}

impl From<HeapError> for SecdError {
    fn from(e: HeapError) -> Self {
        SecdError::Heap(e)
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod error_test;
