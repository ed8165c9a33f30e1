// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2025 Tobias Sarnowski <tobias@sarnowski.cloud>

//! The native-function registry: a fixed table of Rust-implemented
//! primitives callable from compiled control lists, plus the global
//! frame's initial bindings (spec §6 "Native functions"; `SPEC_FULL.md`
//! §H; grounded in `original_source/native.c`).

use crate::cell::{self, Addr, Cell};
use crate::heap::{Heap, HeapError};
use crate::refcount::{drop, share};

/// Index into [`TABLE`]. The original resolves primitives by linear
/// scan of a name table at bind time and stores the resolved integer
/// in the cell from then on (`native.c::native_functions[]`); this
/// crate does the same, just with `u16` instead of a bare `int`.
pub type NativeId = u16;

/// The id bound to the `secd` diagnostic builtin (`SPEC_FULL.md` §H).
/// Deliberately outside [`TABLE`]'s range: it needs the machine's
/// current environment and tick counter, not just the heap, so
/// `vm::Machine` recognizes this id and dispatches to [`diagnostic`]
/// directly instead of calling [`dispatch`].
pub const SECD_DIAGNOSTIC_ID: NativeId = NativeId::MAX;

/// One native primitive: a name for the installer to bind and a
/// function pointer taking the machine's heap and an already-collected
/// argument vector (spec §6: "the primitive takes the machine and an
/// argument list and returns a result cell").
struct Native {
    name: &'static str,
    func: fn(&mut Heap, &[Addr]) -> Result<Addr, HeapError>,
}

const TABLE: &[Native] = &[
    Native { name: "null?", func: native_null_p },
    Native { name: "list", func: native_list },
    Native { name: "list-copy", func: native_list_copy },
    Native { name: "append", func: native_append },
    Native { name: "number?", func: native_number_p },
    Native { name: "symbol?", func: native_symbol_p },
    Native { name: "eof-object?", func: native_eof_object_p },
    Native { name: "vector?", func: native_vector_p },
    Native { name: "make-vector", func: native_make_vector },
    Native { name: "vector-ref", func: native_vector_ref },
    Native { name: "vector-set!", func: native_vector_set },
    Native { name: "list->vector", func: native_list_to_vector },
    Native { name: "string?", func: native_string_p },
    Native { name: "string-length", func: native_string_length },
    Native {
        name: "interaction-environment",
        func: native_interaction_environment,
    },
    Native { name: "secd-bind!", func: native_secd_bind },
];

/// Resolves a bound native's id back to its dispatch function and
/// calls it. `id` is trusted: it only ever reaches here via a
/// `Cell::NativeFn` a prior [`install_natives`] call produced.
pub fn dispatch(heap: &mut Heap, id: NativeId, args: &[Addr]) -> Result<Addr, HeapError> {
    (TABLE[id as usize].func)(heap, args)
}

#[must_use]
pub fn name_of(id: NativeId) -> &'static str {
    TABLE[id as usize].name
}

/// `to_bool`'s convention: true is the `#t` symbol, false is literal
/// `NIL` (`SPEC_FULL.md` §A), so a predicate's result slots directly
/// into `SEL`'s `cond.is_nil()` test.
fn bool_sym(heap: &mut Heap, truthy: bool) -> Result<Addr, HeapError> {
    if truthy {
        cell::alloc_sym(heap, "#t")
    } else {
        Ok(Addr::NIL)
    }
}

fn native_null_p(heap: &mut Heap, args: &[Addr]) -> Result<Addr, HeapError> {
    bool_sym(heap, args.first().is_some_and(|a| a.is_nil()))
}

/// `(list a b c)` conses its arguments into a fresh proper list,
/// sharing each element (the caller's own copies are untouched).
fn native_list(heap: &mut Heap, args: &[Addr]) -> Result<Addr, HeapError> {
    let mut list = Addr::NIL;
    for &arg in args.iter().rev() {
        share(heap, arg);
        list = cell::cons(heap, arg, list)?;
    }
    Ok(list)
}

/// Shallow-copies a proper list: fresh cons spine, shared elements.
fn native_list_copy(heap: &mut Heap, args: &[Addr]) -> Result<Addr, HeapError> {
    let Some(&src) = args.first() else {
        return Ok(Addr::NIL);
    };
    let elems = collect_list(heap, src);
    native_list(heap, &elems)
}

/// `(append a b)`: a fresh spine over `a`'s elements ending in `b`
/// (shared, not copied).
fn native_append(heap: &mut Heap, args: &[Addr]) -> Result<Addr, HeapError> {
    let a = args.first().copied().unwrap_or(Addr::NIL);
    let b = args.get(1).copied().unwrap_or(Addr::NIL);
    let elems = collect_list(heap, a);
    share(heap, b);
    let mut list = b;
    for elem in elems.into_iter().rev() {
        share(heap, elem);
        list = cell::cons(heap, elem, list)?;
    }
    Ok(list)
}

pub(crate) fn collect_list(heap: &Heap, mut list: Addr) -> Vec<Addr> {
    let mut out = Vec::new();
    while list.not_nil() {
        match heap.get(list) {
            Cell::Cons { car, cdr } => {
                out.push(*car);
                list = *cdr;
            }
            _ => break,
        }
    }
    out
}

fn native_number_p(heap: &mut Heap, args: &[Addr]) -> Result<Addr, HeapError> {
    let truthy = args
        .first()
        .is_some_and(|&a| a.not_nil() && heap.get(a).is_int());
    bool_sym(heap, truthy)
}

fn native_symbol_p(heap: &mut Heap, args: &[Addr]) -> Result<Addr, HeapError> {
    let truthy = args
        .first()
        .is_some_and(|&a| a.not_nil() && heap.get(a).is_sym());
    bool_sym(heap, truthy)
}

fn native_eof_object_p(heap: &mut Heap, args: &[Addr]) -> Result<Addr, HeapError> {
    let truthy = args.first().is_some_and(|&a| {
        a.not_nil()
            && matches!(heap.get(a), Cell::Sym { name } if name.as_ref() == crate::reader::EOF_SYMBOL)
    });
    bool_sym(heap, truthy)
}

fn native_vector_p(heap: &mut Heap, args: &[Addr]) -> Result<Addr, HeapError> {
    let truthy = args
        .first()
        .is_some_and(|&a| a.not_nil() && matches!(heap.get(a), Cell::Array { .. }));
    bool_sym(heap, truthy)
}

/// `(make-vector n [fill])`, defaulting `fill` to NIL.
fn native_make_vector(heap: &mut Heap, args: &[Addr]) -> Result<Addr, HeapError> {
    let n = match args.first().map(|&a| heap.get(a)) {
        Some(Cell::Int(n)) if *n >= 0 => *n as usize,
        _ => 0,
    };
    let fill = args.get(1).copied().unwrap_or(Addr::NIL);
    let elems = vec![fill; n];
    cell::alloc_vector(heap, &elems)
}

fn native_vector_ref(heap: &mut Heap, args: &[Addr]) -> Result<Addr, HeapError> {
    let vec = args.first().copied().unwrap_or(Addr::NIL);
    let idx = match args.get(1).map(|&a| heap.get(a)) {
        Some(Cell::Int(n)) if *n >= 0 => *n as usize,
        _ => return cell::alloc_error(heap, "vector-ref: index out of range"),
    };
    let data = match heap.get(vec) {
        Cell::Array { data } => *data,
        _ => return cell::alloc_error(heap, "vector-ref: not a vector"),
    };
    if idx >= heap.array_len(data) {
        return cell::alloc_error(heap, "vector-ref: index out of range");
    }
    let elem = heap.get_array_elem(data, idx);
    share(heap, elem);
    Ok(elem)
}

/// `(vector-set! v i x)` returns NIL, matching the reference's
/// mutate-for-effect convention (`native.c::secdf_vecset`).
fn native_vector_set(heap: &mut Heap, args: &[Addr]) -> Result<Addr, HeapError> {
    let vec = args.first().copied().unwrap_or(Addr::NIL);
    let idx = match args.get(1).map(|&a| heap.get(a)) {
        Some(Cell::Int(n)) if *n >= 0 => *n as usize,
        _ => return cell::alloc_error(heap, "vector-set!: index out of range"),
    };
    let value = args.get(2).copied().unwrap_or(Addr::NIL);
    let data = match heap.get(vec) {
        Cell::Array { data } => *data,
        _ => return cell::alloc_error(heap, "vector-set!: not a vector"),
    };
    if idx >= heap.array_len(data) {
        return cell::alloc_error(heap, "vector-set!: index out of range");
    }
    let old = heap.get_array_elem(data, idx);
    share(heap, value);
    heap.set_array_elem(data, idx, value);
    drop(heap, old);
    Ok(Addr::NIL)
}

fn native_list_to_vector(heap: &mut Heap, args: &[Addr]) -> Result<Addr, HeapError> {
    let list = args.first().copied().unwrap_or(Addr::NIL);
    let elems = collect_list(heap, list);
    cell::alloc_vector(heap, &elems)
}

fn native_string_p(heap: &mut Heap, args: &[Addr]) -> Result<Addr, HeapError> {
    let truthy = args
        .first()
        .is_some_and(|&a| a.not_nil() && matches!(heap.get(a), Cell::Str { .. }));
    bool_sym(heap, truthy)
}

fn native_string_length(heap: &mut Heap, args: &[Addr]) -> Result<Addr, HeapError> {
    let Some(&s) = args.first() else {
        return cell::alloc_error(heap, "string-length: not a string");
    };
    let Cell::Str { data, .. } = heap.get(s) else {
        return cell::alloc_error(heap, "string-length: not a string");
    };
    let len = heap.array_len(*data) as i64;
    cell::alloc_int(heap, len)
}

/// Returns NIL: this crate has no user-visible environment-table
/// object to hand back, unlike the original's namespace handle
/// (`native.c::secdf_ie`); `secd 'env` is the diagnostic equivalent.
fn native_interaction_environment(heap: &mut Heap, _args: &[Addr]) -> Result<Addr, HeapError> {
    let _ = heap;
    Ok(Addr::NIL)
}

/// Prepends `(sym . val)` to `frame`'s bindings with no shadow-check
/// (`SPEC_FULL.md` §H; `native.c::secdf_bind`). Consumes neither `sym`
/// nor `val`'s caller-held reference; both are shared into the frame.
pub fn bind(heap: &mut Heap, frame: Addr, sym: Addr, val: Addr) -> Result<(), HeapError> {
    let (old_syms, old_vals) = match heap.get(frame) {
        Cell::Frame { syms, vals } => (*syms, *vals),
        _ => unreachable!("intrinsics::bind on a non-Frame cell"),
    };
    share(heap, sym);
    share(heap, val);
    let new_syms = cell::cons(heap, sym, old_syms)?;
    let new_vals = cell::cons(heap, val, old_vals)?;
    *heap.get_mut(frame) = Cell::Frame {
        syms: new_syms,
        vals: new_vals,
    };
    Ok(())
}

/// `(secd-bind! frame sym val)`: exposes [`bind`] to compiled control
/// lists, so a running program can extend one of its own frames the
/// same way [`install_natives`] seeds the global one. Returns NIL,
/// matching `vector-set!`'s mutate-for-effect convention.
fn native_secd_bind(heap: &mut Heap, args: &[Addr]) -> Result<Addr, HeapError> {
    let frame = args.first().copied().unwrap_or(Addr::NIL);
    if !matches!(heap.get(frame), Cell::Frame { .. }) {
        return cell::alloc_error(heap, "secd-bind!: not a frame");
    }
    let sym = args.get(1).copied().unwrap_or(Addr::NIL);
    let val = args.get(2).copied().unwrap_or(Addr::NIL);
    bind(heap, frame, sym, val)?;
    Ok(Addr::NIL)
}

/// Seeds `frame` with every native in [`TABLE`], plus the sentinel
/// symbols `err_oom`/`err_nil_sym`/`err_sym`/`nil`, the self-bound
/// `#t`, and `#f` bound to NIL (spec.md §6; `SPEC_FULL.md` §H). Every
/// symbol and native cell installed this way is pinned: these
/// bindings are immortal for the life of the machine.
pub fn install_natives(
    heap: &mut Heap,
    frame: Addr,
    oom: Addr,
    nil_failure: Addr,
    failure: Addr,
) -> Result<(), HeapError> {
    for (id, native) in TABLE.iter().enumerate() {
        let sym = cell::alloc_sym(heap, native.name)?;
        cell::pin(heap, sym);
        let func = cell::alloc_native(heap, id as NativeId)?;
        cell::pin(heap, func);
        bind(heap, frame, sym, func)?;
    }

    let nil_sym = cell::alloc_sym(heap, "nil")?;
    cell::pin(heap, nil_sym);
    bind(heap, frame, nil_sym, Addr::NIL)?;

    let secd_sym = cell::alloc_sym(heap, "secd")?;
    cell::pin(heap, secd_sym);
    let secd_func = cell::alloc_native(heap, SECD_DIAGNOSTIC_ID)?;
    cell::pin(heap, secd_func);
    bind(heap, frame, secd_sym, secd_func)?;

    for (name, target) in [
        ("err_oom", oom),
        ("err_nil_sym", nil_failure),
        ("err_sym", failure),
    ] {
        let sym = cell::alloc_sym(heap, name)?;
        cell::pin(heap, sym);
        share(heap, target);
        bind(heap, frame, sym, target)?;
    }

    let true_sym = cell::alloc_sym(heap, "#t")?;
    cell::pin(heap, true_sym);
    share(heap, true_sym);
    bind(heap, frame, true_sym, true_sym)?;

    // `#f` is bound to NIL, not to a symbol of its own: `to_bool`'s
    // false value is always literal NIL (`SPEC_FULL.md` §A), so a
    // source-literal `#f` must resolve to the same thing a computed
    // false does or `SEL` would treat it as truthy.
    let false_sym = cell::alloc_sym(heap, "#f")?;
    cell::pin(heap, false_sym);
    bind(heap, frame, false_sym, Addr::NIL)?;

    Ok(())
}

/// `(secd 'free | 'heap | 'env | 'tick)`: the four-way diagnostic
/// builtin (`SPEC_FULL.md` §H; `native.c::secdf_ctl`). Not a
/// [`TABLE`] entry since it needs the machine's environment and tick
/// counter, not just the heap; `vm::Machine` dispatches it directly
/// from `AP` alongside the `TABLE` natives.
pub fn diagnostic(
    heap: &mut Heap,
    which: &str,
    env: Addr,
    tick: u64,
) -> Result<Addr, HeapError> {
    match which {
        "free" => {
            let msg = format!(
                "fixedptr={} arrayptr={} free_cells={}",
                heap.fixedptr(),
                heap.arrayptr(),
                heap.free_cells()
            );
            cell::alloc_str(heap, msg.as_bytes())
        }
        "heap" => {
            let msg = format!(
                "remaining={} arrayptr={}",
                heap.remaining(),
                heap.arrayptr()
            );
            cell::alloc_str(heap, msg.as_bytes())
        }
        "env" => {
            share(heap, env);
            Ok(env)
        }
        "tick" => cell::alloc_int(heap, tick as i64),
        _ => cell::alloc_error(heap, "secd: unknown diagnostic selector"),
    }
}
