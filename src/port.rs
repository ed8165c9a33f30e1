// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2025 Tobias Sarnowski <tobias@sarnowski.cloud>

//! I/O ports: file handles and string-buffer views (spec §5, §6;
//! `SPEC_FULL.md` §I; grounded in `original_source/posix-io.c`).

use std::fs::File;
use std::io::{Read as _, Write as _};

use crate::cell::Addr;
use crate::heap::{Heap, HeapError};

/// Value returned at end-of-stream by both port kinds, mirroring the
/// original's `SECD_EOF` sentinel (the original's string-port branch
/// inconsistently used libc's `EOF` instead; normalized here to one
/// constant for both).
pub const EOF: i32 = -1;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Direction {
    Input,
    Output,
    InputOutput,
}

impl Direction {
    #[must_use]
    pub const fn can_read(self) -> bool {
        matches!(self, Direction::Input | Direction::InputOutput)
    }

    #[must_use]
    pub const fn can_write(self) -> bool {
        matches!(self, Direction::Output | Direction::InputOutput)
    }
}

/// The backing medium of a port. A string port names the `Cell::Str`
/// it reads/writes through by address; that cell's own `offset` field
/// is the read/write cursor (spec §3: "the offset field is used by
/// string ports"), exactly as the original's `port->as.port.as.str`
/// is itself a `CELL_STR` pointer whose `offset` is mutated directly.
#[derive(Debug)]
pub enum PortState {
    Closed,
    File { direction: Direction, file: File },
    Str { direction: Direction, target: Addr },
}

impl PortState {
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, PortState::Closed)
    }

    #[must_use]
    pub const fn direction(&self) -> Option<Direction> {
        match self {
            PortState::Closed => None,
            PortState::File { direction, .. } | PortState::Str { direction, .. } => {
                Some(*direction)
            }
        }
    }

    /// Idempotent close (spec §5: "closing is idempotent"), diverging
    /// deliberately from the original's assert-on-double-close (see
    /// `DESIGN.md`, Open Question 4). Returns the `Str` target
    /// address, if any, so the caller can drop its heap reference.
    pub fn close(&mut self) -> Option<Addr> {
        match std::mem::replace(self, PortState::Closed) {
            PortState::Closed | PortState::File { .. } => None,
            PortState::Str { target, .. } => Some(target),
        }
    }

    /// Reads one byte from a file port. String ports are read via
    /// [`read_str_byte`], which needs heap access.
    pub fn read_file_byte(&mut self) -> std::io::Result<i32> {
        match self {
            PortState::File { direction, file } if direction.can_read() => {
                let mut buf = [0u8; 1];
                let n = file.read(&mut buf)?;
                Ok(if n == 0 { EOF } else { i32::from(buf[0]) })
            }
            _ => Ok(EOF),
        }
    }

    /// Writes to a file port. String ports are written via
    /// [`write_str_bytes`], which needs heap access.
    pub fn write_file_bytes(&mut self, bytes: &[u8]) -> std::io::Result<usize> {
        match self {
            PortState::File { direction, file } if direction.can_write() => {
                file.write_all(bytes)?;
                Ok(bytes.len())
            }
            _ => Ok(0),
        }
    }
}

/// Reads the next byte from a string port's backing `Cell::Str`,
/// advancing its offset. Grounded in
/// `original_source/posix-io.c::secd_getc`'s string-port branch.
pub fn read_str_byte(heap: &mut Heap, target: Addr) -> i32 {
    let (data, offset) = heap.str_parts(target);
    let bytes = heap.array_bytes(data);
    if offset >= bytes.len() {
        return EOF;
    }
    let byte = bytes[offset];
    heap.set_str_offset(target, offset + 1);
    i32::from(byte)
}

/// Writes `bytes` at a string port's current offset, growing the
/// backing array chunk in place if it would overrun (spec §9 "Port
/// resize", resolved in `SPEC_FULL.md` §I). Returns the number of
/// bytes written (always `bytes.len()` on success) or propagates the
/// heap's `OutOfMemory` if growing the backing chunk failed.
pub fn write_str_bytes(heap: &mut Heap, target: Addr, bytes: &[u8]) -> Result<usize, HeapError> {
    let (data, offset) = heap.str_parts(target);
    let new_data = heap.write_array_bytes_grow(data, offset, bytes)?;
    if new_data != data {
        heap.set_str_data(target, new_data);
    }
    heap.set_str_offset(target, offset + bytes.len());
    Ok(bytes.len())
}

#[cfg(test)]
#[path = "port_test.rs"]
mod port_test;
