// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2025 Tobias Sarnowski <tobias@sarnowski.cloud>

//! `share`/`drop` and cascading dependency release (spec §4.C).
//! Grounded in `original_source/memory.c::share_cell`, `drop_cell`,
//! `drop_dependencies`.

use crate::cell::{Addr, Cell, PINNED};
use crate::heap::Heap;

/// Increments `c`'s reference count, saturating at [`PINNED`]. A
/// no-op on NIL.
pub fn share(heap: &mut Heap, c: Addr) {
    if c.is_nil() {
        return;
    }
    let n = heap.nref(c);
    if n != PINNED {
        heap.set_nref(c, n + 1);
    }
}

/// Decrements `c`'s reference count; once it reaches zero, drops
/// every dependency and returns the cell's storage to the allocator.
/// A no-op on NIL or a pinned cell.
pub fn drop(heap: &mut Heap, c: Addr) {
    if c.is_nil() {
        return;
    }
    let n = heap.nref(c);
    if n == PINNED {
        return;
    }
    debug_assert!(n > 0, "dropping a cell with nref == 0");
    let n = n - 1;
    heap.set_nref(c, n);
    if n == 0 {
        drop_dependencies(heap, c);
        reclaim(heap, c);
    }
}

/// Releases everything `c` owns, without touching `c`'s own storage.
/// Dispatches on variant (`original_source/memory.c::drop_dependencies`).
fn drop_dependencies(heap: &mut Heap, c: Addr) {
    match heap.get(c) {
        Cell::Cons { car, cdr } | Cell::Frame { syms: car, vals: cdr } => {
            let (car, cdr) = (*car, *cdr);
            drop(heap, car);
            drop(heap, cdr);
        }
        Cell::Ref(target) => {
            let target = *target;
            drop(heap, target);
        }
        Cell::Array { data } => {
            let data = *data;
            drop_array(heap, data);
        }
        Cell::Str { data, .. } => {
            let data = *data;
            drop_str(heap, data);
        }
        Cell::Port(state) => {
            if let crate::port::PortState::Str { target, .. } = state {
                let target = *target;
                drop(heap, target);
            }
        }
        Cell::Sym { .. }
        | Cell::Int(_)
        | Cell::Op(_)
        | Cell::NativeFn(_)
        | Cell::Error { .. }
        | Cell::Undef
        | Cell::Free { .. }
        | Cell::ArrMeta { .. } => {}
    }
}

fn chunk_nref(heap: &Heap, data: Addr) -> u32 {
    // The chunk header sits one cell before its payload; its own
    // refcount lives in the same `refs` table as every other cell.
    heap.nref(Addr::new(data.index() - 1))
}

fn set_chunk_nref(heap: &mut Heap, data: Addr, n: u32) {
    heap.set_nref(Addr::new(data.index() - 1), n);
}

fn drop_array(heap: &mut Heap, data: Addr) {
    let n = chunk_nref(heap, data) - 1;
    set_chunk_nref(heap, data, n);
    if n != 0 {
        return;
    }
    if heap.array_holds_cells(data) {
        for i in 0..heap.array_len(data) {
            let target = heap.get_array_elem(data, i);
            if target.not_nil() {
                drop(heap, target);
            }
        }
    }
    heap.free_array(data);
}

fn drop_str(heap: &mut Heap, data: Addr) {
    let n = chunk_nref(heap, data) - 1;
    set_chunk_nref(heap, data, n);
    if n == 0 {
        heap.free_array(data);
    }
}

/// Returns `c`'s own storage to the allocator once its refcount has
/// reached zero (a fixed cell goes back to the free list; `Str`/
/// `Array` handle cells are themselves ordinary fixed cells — only
/// the array region they point at is chunk-managed).
fn reclaim(heap: &mut Heap, c: Addr) {
    heap.push_free(c);
}

/// Tears a `Cons`/`Frame` cell apart, transferring ownership of both
/// fields to the caller and reclaiming the cell's own slot — the
/// "linear-if-unique" optimization every register pop (`S`/`E`/`C`/`D`)
/// and every closure/frame unpacking in `vm.rs` shares.
///
/// If `addr` is solely owned (`nref == 1`), both edges move out for
/// free and the node itself is recycled directly, without touching
/// its former children's counts (`drop_dependencies` is *not* called
/// here — that would wrongly drop the very fields we just took).
/// Otherwise the node survives for its other owners, so the two
/// fields the caller is about to hold each need their own `share`,
/// and the node's count merely decrements by one.
#[must_use]
pub fn decons(heap: &mut Heap, addr: Addr) -> (Addr, Addr) {
    let (car, cdr) = match heap.get(addr) {
        Cell::Cons { car, cdr } | Cell::Frame { syms: car, vals: cdr } => (*car, *cdr),
        other => unreachable!("decons on a non-cons/frame cell: {other:?}"),
    };
    let n = heap.nref(addr);
    debug_assert!(n > 0 && n != PINNED, "decons on a free or pinned cell");
    if n == 1 {
        heap.set_nref(addr, 0);
        heap.push_free(addr);
    } else {
        share(heap, car);
        share(heap, cdr);
        drop(heap, addr);
    }
    (car, cdr)
}

#[cfg(test)]
#[path = "refcount_test.rs"]
mod refcount_test;
