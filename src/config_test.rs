// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2025 Tobias Sarnowski <tobias@sarnowski.cloud>

use super::*;

#[test]
fn default_config_matches_documented_defaults() {
    let cfg = MachineConfig::default();
    assert_eq!(cfg.heap_cells, DEFAULT_HEAP_CELLS);
    assert!(cfg.tail_call_elimination);
    assert_eq!(cfg.eof_symbol, DEFAULT_EOF_SYMBOL);
}

#[test]
fn new_is_an_alias_for_default() {
    let a = MachineConfig::new();
    let b = MachineConfig::default();
    assert_eq!(a.heap_cells, b.heap_cells);
    assert_eq!(a.tail_call_elimination, b.tail_call_elimination);
    assert_eq!(a.eof_symbol, b.eof_symbol);
}

#[test]
fn builder_methods_override_one_field_at_a_time() {
    let cfg = MachineConfig::new().heap_cells(4096);
    assert_eq!(cfg.heap_cells, 4096);
    assert!(cfg.tail_call_elimination, "untouched field keeps its default");

    let cfg = MachineConfig::new().tail_call_elimination(false);
    assert!(!cfg.tail_call_elimination);
    assert_eq!(cfg.heap_cells, DEFAULT_HEAP_CELLS);

    let cfg = MachineConfig::new().eof_symbol("#<eof>");
    assert_eq!(cfg.eof_symbol, "#<eof>");
}

#[test]
fn builder_methods_chain() {
    let cfg = MachineConfig::new()
        .heap_cells(1024)
        .tail_call_elimination(false)
        .eof_symbol("done");
    assert_eq!(cfg.heap_cells, 1024);
    assert!(!cfg.tail_call_elimination);
    assert_eq!(cfg.eof_symbol, "done");
}
