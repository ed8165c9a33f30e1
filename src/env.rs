// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2025 Tobias Sarnowski <tobias@sarnowski.cloud>

//! Lexical environment frames and symbol lookup (spec §4.D).
//! Grounded in `original_source/interp.c::secd_dum`/`secd_rap` and
//! the frame-walking convention implicit in `memory.c`'s `new_frame`.

use crate::cell::{Addr, Cell};
use crate::heap::{Heap, HeapError};
use crate::refcount::drop;

// Every `new_*`/`push_*` constructor in this crate *consumes* the
// `Addr`s passed to it (stores them without incrementing their
// refcount), mirroring Rust's own move semantics: a caller that still
// needs its own usable copy must `share` it first. This is a
// deliberate simplification of the original's "constructors share
// internally, callers drop their old slot" convention (see
// `DESIGN.md`) — both satisfy the same invariant, but this one reads
// closer to ordinary Rust ownership.

/// Builds a fresh `(syms . vals)` frame cell. Consumes `syms`/`vals`.
pub fn new_frame(heap: &mut Heap, syms: Addr, vals: Addr) -> Result<Addr, HeapError> {
    let addr = heap.pop_free()?;
    *heap.get_mut(addr) = Cell::Frame { syms, vals };
    heap.set_nref(addr, 1);
    Ok(addr)
}

/// Conses a new environment list node whose frame is `(NIL . NIL)`
/// onto `env`, the placeholder `RAP` later patches in place to close
/// a `letrec`-style recursive binding (`secd_dum`). Consumes `env`.
pub fn push_dummy_frame(heap: &mut Heap, env: Addr) -> Result<Addr, HeapError> {
    let dummy = new_frame(heap, Addr::NIL, Addr::NIL)?;
    let node = heap.pop_free()?;
    *heap.get_mut(node) = Cell::Cons { car: dummy, cdr: env };
    heap.set_nref(node, 1);
    Ok(node)
}

/// Patches the dummy frame at the head of `env` (an environment list
/// node produced by [`push_dummy_frame`]) with the real bindings,
/// closing the recursive-binding cycle in place (`secd_rap`). The
/// caller's `syms`/`vals` references are consumed (transferred into
/// the frame); any previous `(NIL . NIL)` contents are dropped first.
pub fn patch_dummy_frame(heap: &mut Heap, env: Addr, syms: Addr, vals: Addr) {
    let frame = match heap.get(env) {
        Cell::Cons { car, .. } => *car,
        _ => unreachable!("patch_dummy_frame on a non-list env node"),
    };
    let (old_syms, old_vals) = match heap.get(frame) {
        Cell::Frame { syms, vals } => (*syms, *vals),
        _ => unreachable!("patch_dummy_frame target is not a Frame"),
    };
    drop(heap, old_syms);
    drop(heap, old_vals);
    *heap.get_mut(frame) = Cell::Frame { syms, vals };
}

/// Scans frames outer-to-inner (`env` is innermost-first, matching
/// the convention that `(frame . outer)` prepends the newest scope),
/// returning the bound value for `name`, compared case-insensitively.
/// `None` on an unbound symbol — the caller turns this into an
/// `Error` cell (spec §4.D: "failure is surfaced as an error cell,
/// not silently NIL").
#[must_use]
pub fn lookup_env(heap: &Heap, env: Addr, name: &str) -> Option<Addr> {
    let mut frame_list = env;
    while frame_list.not_nil() {
        let frame = match heap.get(frame_list) {
            Cell::Cons { car, .. } => *car,
            _ => unreachable!("lookup_env on a malformed environment list"),
        };
        if let Cell::Frame { syms, vals } = heap.get(frame) {
            let (mut syms, mut vals) = (*syms, *vals);
            while syms.not_nil() {
                let (sym_head, sym_tail) = match heap.get(syms) {
                    Cell::Cons { car, cdr } => (*car, *cdr),
                    _ => break,
                };
                let (val_head, val_tail) = match heap.get(vals) {
                    Cell::Cons { car, cdr } => (*car, *cdr),
                    _ => break,
                };
                if let Cell::Sym { name: sym_name } = heap.get(sym_head) {
                    if sym_name.eq_ignore_ascii_case(name) {
                        return Some(val_head);
                    }
                }
                syms = sym_tail;
                vals = val_tail;
            }
        }
        frame_list = match heap.get(frame_list) {
            Cell::Cons { cdr, .. } => *cdr,
            _ => Addr::NIL,
        };
    }
    None
}

#[cfg(test)]
#[path = "env_test.rs"]
mod env_test;
