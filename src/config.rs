// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2025 Tobias Sarnowski <tobias@sarnowski.cloud>

//! Machine construction knobs (`SPEC_FULL.md` §L). A plain
//! builder-style struct rather than a file-based config layer,
//! matching the teacher's own `Process`/`Heap` constructors taking
//! explicit size constants.

/// The default region size: generous enough for the interactive
/// scenarios in `tests/integration_test.rs` without needing to think
/// about the fixed/array split.
pub const DEFAULT_HEAP_CELLS: usize = 1 << 16;

pub const DEFAULT_EOF_SYMBOL: &str = "#eof";

#[derive(Debug, Clone)]
pub struct MachineConfig {
    /// Total contiguous region size, in cells, shared by the fixed and
    /// array allocators (`heap::Heap::new`'s `capacity`).
    pub heap_cells: usize,
    /// Whether `AP`/`RAP` reuse the top dump frame instead of growing
    /// it when the call is in tail position (spec §8 "Tail-call
    /// bound"). Disabling this is mostly useful for exercising the
    /// non-tail code path in tests.
    pub tail_call_elimination: bool,
    /// The symbol name the reader produces on running out of input.
    pub eof_symbol: String,
}

impl Default for MachineConfig {
    fn default() -> Self {
        MachineConfig {
            heap_cells: DEFAULT_HEAP_CELLS,
            tail_call_elimination: true,
            eof_symbol: DEFAULT_EOF_SYMBOL.to_string(),
        }
    }
}

impl MachineConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn heap_cells(mut self, n: usize) -> Self {
        self.heap_cells = n;
        self
    }

    #[must_use]
    pub const fn tail_call_elimination(mut self, on: bool) -> Self {
        self.tail_call_elimination = on;
        self
    }

    #[must_use]
    pub fn eof_symbol(mut self, name: impl Into<String>) -> Self {
        self.eof_symbol = name.into();
        self
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
