// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2025 Tobias Sarnowski <tobias@sarnowski.cloud>

use super::*;
use crate::heap::Heap;

fn heap() -> Heap {
    Heap::new(64)
}

#[test]
fn nil_is_distinct_and_total() {
    assert!(Addr::NIL.is_nil());
    assert!(!Addr::NIL.not_nil());
}

#[test]
fn cons_sets_nref_one() {
    let mut h = heap();
    let a = alloc_int(&mut h, 1).unwrap();
    let b = alloc_int(&mut h, 2).unwrap();
    let pair = cons(&mut h, a, b).unwrap();
    assert_eq!(h.nref(pair), 1);
    assert!(matches!(h.get(pair), Cell::Cons { .. }));
}

#[test]
fn alloc_sym_lowercases() {
    let mut h = heap();
    let sym = alloc_sym(&mut h, "CAR").unwrap();
    match h.get(sym) {
        Cell::Sym { name } => assert_eq!(name.as_ref(), "car"),
        other => panic!("expected symbol, got {other:?}"),
    }
}

#[test]
fn atom_eq_symbols_case_insensitive() {
    let a = Cell::Sym { name: "foo".into() };
    let b = Cell::Sym { name: "FOO".into() };
    assert!(atom_eq(&a, &b));
}

#[test]
fn atom_eq_distinguishes_variants() {
    let i = Cell::Int(1);
    let s = Cell::Sym { name: "1".into() };
    assert!(!atom_eq(&i, &s));
}

#[test]
fn pin_saturates_nref() {
    let mut h = heap();
    let a = alloc_int(&mut h, 7).unwrap();
    pin(&mut h, a);
    assert_eq!(h.nref(a), PINNED);
    crate::refcount::drop(&mut h, a);
    assert_eq!(h.nref(a), PINNED, "pinned cells never drop");
}

#[test]
fn pin_on_nil_is_a_no_op() {
    pin(&mut heap(), Addr::NIL);
}

#[test]
fn alloc_vector_shares_each_element() {
    let mut h = heap();
    let a = alloc_int(&mut h, 1).unwrap();
    let vec = alloc_vector(&mut h, &[a]).unwrap();
    assert_eq!(h.nref(a), 2, "element shared once into the chunk");
    match h.get(vec) {
        Cell::Array { data } => assert_eq!(h.array_len(*data), 1),
        other => panic!("expected vector, got {other:?}"),
    }
}

#[test]
fn type_name_covers_every_variant() {
    assert_eq!(Cell::Int(0).type_name(), "integer");
    assert_eq!(Cell::Undef.type_name(), "undefined");
}

/// spec §8 "Equality symmetry and reflexivity": `atom_eq` is reflexive
/// and symmetric for integers and (case-folded) symbols over any
/// input proptest throws at it, not just the handful of fixed cases
/// above.
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn int_atom_eq_is_reflexive(n: i64) {
            let c = Cell::Int(n);
            prop_assert!(atom_eq(&c, &c));
        }

        #[test]
        fn int_atom_eq_is_symmetric(a: i64, b: i64) {
            let x = Cell::Int(a);
            let y = Cell::Int(b);
            prop_assert_eq!(atom_eq(&x, &y), atom_eq(&y, &x));
        }

        #[test]
        fn sym_atom_eq_is_reflexive(name in "[a-zA-Z][a-zA-Z0-9?!*+-]{0,15}") {
            let c = Cell::Sym { name: name.into_boxed_str() };
            prop_assert!(atom_eq(&c, &c));
        }

        #[test]
        fn sym_atom_eq_is_symmetric(a in "[a-zA-Z][a-zA-Z0-9?!*+-]{0,15}", b in "[a-zA-Z][a-zA-Z0-9?!*+-]{0,15}") {
            let x = Cell::Sym { name: a.into_boxed_str() };
            let y = Cell::Sym { name: b.into_boxed_str() };
            prop_assert_eq!(atom_eq(&x, &y), atom_eq(&y, &x));
        }

        #[test]
        fn sym_atom_eq_ignores_ascii_case(name in "[a-zA-Z][a-zA-Z0-9]{0,15}") {
            let lower = Cell::Sym { name: name.to_ascii_lowercase().into_boxed_str() };
            let upper = Cell::Sym { name: name.to_ascii_uppercase().into_boxed_str() };
            prop_assert!(atom_eq(&lower, &upper));
        }
    }
}
