// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2025 Tobias Sarnowski <tobias@sarnowski.cloud>

//! Renders cells back to surface syntax (spec §6 diagnostic output;
//! `SPEC_FULL.md` §G; grounded in `original_source/readparse.c`'s
//! `sexp_print*` family). This crate does not reproduce the original's
//! trailing space before a list's closing paren — a cosmetic
//! divergence noted in `DESIGN.md`.

use crate::cell::{Addr, Cell};
use crate::heap::Heap;
use crate::{intrinsics, opcode};

/// Renders `addr` to a fresh `String`.
#[must_use]
pub fn print(heap: &Heap, addr: Addr) -> String {
    let mut out = String::new();
    write_cell(heap, addr, &mut out);
    out
}

fn write_cell(heap: &Heap, addr: Addr, out: &mut String) {
    if addr.is_nil() {
        out.push_str("()");
        return;
    }
    match heap.get(addr) {
        Cell::Int(n) => out.push_str(&n.to_string()),
        Cell::Sym { name } => out.push_str(name),
        Cell::Cons { .. } => write_list(heap, addr, out),
        Cell::Array { data } => write_vector(heap, *data, out),
        Cell::Str { data, .. } => write_string(heap, *data, out),
        Cell::Error { msg } => {
            out.push_str("#!\"");
            escape_into(msg, out);
            out.push('"');
        }
        Cell::Frame { .. } => out.push_str("#<frame>"),
        Cell::Op(op) => {
            out.push_str("#<opcode ");
            out.push_str(opcode::name(*op));
            out.push('>');
        }
        Cell::NativeFn(id) => {
            out.push_str("#<native ");
            out.push_str(intrinsics::name_of(*id));
            out.push('>');
        }
        Cell::Port(state) => {
            out.push_str(if state.is_closed() {
                "#<port closed>"
            } else {
                "#<port>"
            });
        }
        Cell::Ref(target) => write_cell(heap, *target, out),
        Cell::Undef => out.push_str("#<undefined>"),
        Cell::Free { .. } | Cell::ArrMeta { .. } => out.push_str("#<internal>"),
    }
}

fn write_list(heap: &Heap, addr: Addr, out: &mut String) {
    out.push('(');
    let mut cur = addr;
    let mut first = true;
    loop {
        let Cell::Cons { car, cdr } = heap.get(cur) else {
            break;
        };
        if !first {
            out.push(' ');
        }
        first = false;
        write_cell(heap, *car, out);
        if cdr.is_nil() {
            break;
        }
        if matches!(heap.get(*cdr), Cell::Cons { .. }) {
            cur = *cdr;
        } else {
            out.push_str(" . ");
            write_cell(heap, *cdr, out);
            break;
        }
    }
    out.push(')');
}

fn write_vector(heap: &Heap, data: Addr, out: &mut String) {
    out.push_str("#(");
    for i in 0..heap.array_len(data) {
        if i > 0 {
            out.push(' ');
        }
        write_cell(heap, heap.get_array_elem(data, i), out);
    }
    out.push(')');
}

fn write_string(heap: &Heap, data: Addr, out: &mut String) {
    out.push('"');
    let bytes = heap.array_bytes(data);
    escape_into(&String::from_utf8_lossy(&bytes), out);
    out.push('"');
}

fn escape_into(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            _ => out.push(ch),
        }
    }
}

#[cfg(test)]
#[path = "printer_test.rs"]
mod printer_test;
