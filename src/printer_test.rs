// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2025 Tobias Sarnowski <tobias@sarnowski.cloud>

use super::*;
use crate::heap::Heap;
use crate::opcode::Opcode;

#[test]
fn prints_nil_as_empty_list() {
    let h = Heap::new(32);
    assert_eq!(print(&h, Addr::NIL), "()");
}

#[test]
fn prints_integers_and_symbols() {
    let mut h = Heap::new(32);
    let n = cell::alloc_int(&mut h, -7).unwrap();
    let s = cell::alloc_sym(&mut h, "foo").unwrap();
    assert_eq!(print(&h, n), "-7");
    assert_eq!(print(&h, s), "foo");
}

#[test]
fn prints_a_proper_list_without_trailing_space() {
    let mut h = Heap::new(32);
    let a = cell::alloc_int(&mut h, 1).unwrap();
    let b = cell::alloc_int(&mut h, 2).unwrap();
    let tail = cell::cons(&mut h, b, Addr::NIL).unwrap();
    let list = cell::cons(&mut h, a, tail).unwrap();
    assert_eq!(print(&h, list), "(1 2)");
}

#[test]
fn prints_a_dotted_pair() {
    let mut h = Heap::new(32);
    let a = cell::alloc_int(&mut h, 1).unwrap();
    let b = cell::alloc_int(&mut h, 2).unwrap();
    let pair = cell::cons(&mut h, a, b).unwrap();
    assert_eq!(print(&h, pair), "(1 . 2)");
}

#[test]
fn prints_a_vector() {
    let mut h = Heap::new(32);
    let a = cell::alloc_int(&mut h, 1).unwrap();
    let b = cell::alloc_int(&mut h, 2).unwrap();
    let vec = cell::alloc_vector(&mut h, &[a, b]).unwrap();
    assert_eq!(print(&h, vec), "#(1 2)");
}

#[test]
fn prints_a_string_with_escapes() {
    let mut h = Heap::new(32);
    let s = cell::alloc_str(&mut h, b"a\"b").unwrap();
    assert_eq!(print(&h, s), "\"a\\\"b\"");
}

#[test]
fn prints_an_error_cell() {
    let mut h = Heap::new(32);
    let e = cell::alloc_error(&mut h, "boom").unwrap();
    assert_eq!(print(&h, e), "#!\"boom\"");
}

#[test]
fn prints_opcode_and_native_handles() {
    let mut h = Heap::new(32);
    let op = cell::alloc_op(&mut h, Opcode::Add).unwrap();
    assert_eq!(print(&h, op), "#<opcode ADD>");
    let native = cell::alloc_native(&mut h, 0).unwrap();
    assert_eq!(print(&h, native), format!("#<native {}>", intrinsics::name_of(0)));
}
