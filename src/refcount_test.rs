// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2025 Tobias Sarnowski <tobias@sarnowski.cloud>

use super::*;
use crate::cell;
use crate::heap::Heap;

fn heap() -> Heap {
    Heap::new(64)
}

#[test]
fn share_increments_nref() {
    let mut h = heap();
    let a = cell::alloc_int(&mut h, 1).unwrap();
    share(&mut h, a);
    assert_eq!(h.nref(a), 2);
}

#[test]
fn share_is_a_no_op_on_nil() {
    share(&mut heap(), Addr::NIL);
}

#[test]
fn share_saturates_at_pinned() {
    let mut h = heap();
    let a = cell::alloc_int(&mut h, 1).unwrap();
    cell::pin(&mut h, a);
    share(&mut h, a);
    assert_eq!(h.nref(a), PINNED);
}

#[test]
fn drop_to_zero_reclaims_the_cell() {
    let mut h = heap();
    let a = cell::alloc_int(&mut h, 1).unwrap();
    drop(&mut h, a);
    assert_eq!(h.free_cells(), 1);
}

#[test]
fn drop_cascades_into_children() {
    let mut h = heap();
    let car = cell::alloc_int(&mut h, 1).unwrap();
    let cdr = cell::alloc_int(&mut h, 2).unwrap();
    let pair = cell::cons(&mut h, car, cdr).unwrap();
    drop(&mut h, pair);
    assert_eq!(h.free_cells(), 3, "pair and both children all reclaimed");
}

#[test]
fn drop_on_a_pinned_cell_is_a_no_op() {
    let mut h = heap();
    let a = cell::alloc_int(&mut h, 1).unwrap();
    cell::pin(&mut h, a);
    drop(&mut h, a);
    assert_eq!(h.nref(a), PINNED);
}

#[test]
fn decons_on_unique_cons_recycles_the_node_without_sharing() {
    let mut h = heap();
    let car = cell::alloc_int(&mut h, 1).unwrap();
    let cdr = cell::alloc_int(&mut h, 2).unwrap();
    let pair = cell::cons(&mut h, car, cdr).unwrap();

    let (got_car, got_cdr) = decons(&mut h, pair);
    assert_eq!(got_car, car);
    assert_eq!(got_cdr, cdr);
    assert_eq!(h.nref(car), 1, "ownership moved out, not shared");
    assert_eq!(h.nref(cdr), 1);
    assert_eq!(h.free_cells(), 1, "the cons node itself went back to the free list");
}

#[test]
fn decons_on_shared_cons_shares_both_fields() {
    let mut h = heap();
    let car = cell::alloc_int(&mut h, 1).unwrap();
    let cdr = cell::alloc_int(&mut h, 2).unwrap();
    let pair = cell::cons(&mut h, car, cdr).unwrap();
    share(&mut h, pair);

    let (got_car, got_cdr) = decons(&mut h, pair);
    assert_eq!(got_car, car);
    assert_eq!(got_cdr, cdr);
    assert_eq!(h.nref(car), 2, "caller's copy plus the surviving node's own reference");
    assert_eq!(h.nref(cdr), 2);
    assert_eq!(h.nref(pair), 1, "node survived for its other owner");
}

#[test]
#[should_panic(expected = "decons on a non-cons/frame cell")]
fn decons_panics_on_a_non_compound_cell() {
    let mut h = heap();
    let a = cell::alloc_int(&mut h, 1).unwrap();
    let _ = decons(&mut h, a);
}
