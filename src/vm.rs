// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2025 Tobias Sarnowski <tobias@sarnowski.cloud>

//! The SECD interpreter loop: `Machine::run` walks a compiled control
//! list, driving the four registers `S`/`E`/`C`/`D` exactly as
//! `SPEC_FULL.md` §E describes, using [`crate::refcount::decons`] for
//! every register pop and closure/frame teardown (spec §4.E; grounded
//! in `original_source/interp.c::run`).

use crate::cell::{self, Addr, Cell};
use crate::compiler::{self, CompileError};
use crate::env;
use crate::heap::{Heap, HeapError};
use crate::intrinsics::{self, NativeId};
use crate::opcode::Opcode;
use crate::refcount::{decons, drop, share};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeError {
    TypeMismatch,
    UnboundSymbol,
    DivisionByZero,
    StackUnderflow,
    Compile(CompileError),
    Heap(HeapError),
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeError::TypeMismatch => f.write_str("type mismatch"),
            RuntimeError::UnboundSymbol => f.write_str("unbound symbol"),
            RuntimeError::DivisionByZero => f.write_str("division by zero"),
            RuntimeError::StackUnderflow => f.write_str("stack underflow"),
            RuntimeError::Compile(e) => write!(f, "{e}"),
            RuntimeError::Heap(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for RuntimeError {}

impl From<HeapError> for RuntimeError {
    fn from(e: HeapError) -> Self {
        RuntimeError::Heap(e)
    }
}

impl From<CompileError> for RuntimeError {
    fn from(e: CompileError) -> Self {
        RuntimeError::Compile(e)
    }
}

/// `true` iff control list `c` (the instructions still to run *after*
/// the call currently being dispatched) would do nothing but unwind
/// the frame a plain `RTN` would reach anyway — resolves the Open
/// Question in spec.md §9 (`SPEC_FULL.md` §E).
#[must_use]
pub fn is_tail_position(heap: &Heap, c: Addr) -> bool {
    if c.is_nil() {
        return true;
    }
    match heap.get(c) {
        Cell::Cons { car, .. } => {
            matches!(heap.get(*car), Cell::Op(Opcode::Rtn) | Cell::Op(Opcode::Join))
        }
        _ => false,
    }
}

/// The SECD machine: a heap plus the handful of pinned cells every run
/// needs (the compiled-control sentinel) and a step counter the
/// `secd 'tick` diagnostic reads.
pub struct Machine {
    heap: Heap,
    global_env: Addr,
    sentinel: Addr,
    tick: u64,
    tail_call_elimination: bool,
    eof_symbol: String,
}

impl Machine {
    /// Builds the heap, seeds the global frame via
    /// [`intrinsics::install_natives`], and allocates the pinned
    /// sentinels (`SPEC_FULL.md` §L).
    pub fn new(config: crate::config::MachineConfig) -> Result<Self, HeapError> {
        let mut heap = Heap::new(config.heap_cells);

        let sentinel = cell::alloc_sym(&mut heap, "#compiled")?;
        cell::pin(&mut heap, sentinel);

        let oom = cell::alloc_error(&mut heap, "out of memory")?;
        cell::pin(&mut heap, oom);
        let nil_failure = cell::alloc_error(&mut heap, "nil failure")?;
        cell::pin(&mut heap, nil_failure);
        let failure = cell::alloc_error(&mut heap, "failure")?;
        cell::pin(&mut heap, failure);

        let global_frame = env::new_frame(&mut heap, Addr::NIL, Addr::NIL)?;
        cell::pin(&mut heap, global_frame);
        intrinsics::install_natives(&mut heap, global_frame, oom, nil_failure, failure)?;
        let global_env = cell::cons(&mut heap, global_frame, Addr::NIL)?;
        cell::pin(&mut heap, global_env);

        Ok(Machine {
            heap,
            global_env,
            sentinel,
            tick: 0,
            tail_call_elimination: config.tail_call_elimination,
            eof_symbol: config.eof_symbol,
        })
    }

    #[must_use]
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    #[must_use]
    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    #[must_use]
    pub const fn global_env(&self) -> Addr {
        self.global_env
    }

    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    #[must_use]
    pub fn eof_symbol(&self) -> &str {
        &self.eof_symbol
    }

    /// Reads one expression from `source`, compiles it, and runs it to
    /// completion against the global environment — the REPL's one
    /// call per top-level form.
    pub fn eval_str(&mut self, source: &str) -> Result<Addr, crate::error::SecdError> {
        let expr = crate::reader::read_str(&mut self.heap, source)?;
        let control = compiler::compile_control_path(&mut self.heap, expr, self.sentinel)?;
        self.run(control).map_err(Into::into)
    }

    /// Runs a compiled control list to completion, returning the value
    /// left on top of `S` (NIL if the machine halted with an empty
    /// stack). Only fatal heap exhaustion returns `Err`; every domain
    /// failure (unbound symbol, division by zero, wrong-typed operand,
    /// ...) surfaces as an `Error` cell pushed onto `S` and execution
    /// continues (spec §7).
    pub fn run(&mut self, control: Addr) -> Result<Addr, RuntimeError> {
        let span = tracing::debug_span!("secd_run");
        let _enter = span.enter();

        let mut s = Addr::NIL;
        share(&mut self.heap, self.global_env);
        let mut e = self.global_env;
        let mut c = self.entry_point(control);
        let mut d = Addr::NIL;

        loop {
            self.tick += 1;
            if c.is_nil() {
                return self.halt(s, e, d);
            }
            let (op_cell, rest) = decons(&mut self.heap, c);
            let op = match self.heap.get(op_cell) {
                Cell::Op(op) => *op,
                _ => {
                    drop(&mut self.heap, op_cell);
                    s = self.domain_error(s, RuntimeError::TypeMismatch)?;
                    c = rest;
                    continue;
                }
            };
            drop(&mut self.heap, op_cell);
            tracing::trace!(?op, tick = self.tick, "dispatch");

            match op {
                Opcode::Nil => {
                    s = cell::cons(&mut self.heap, Addr::NIL, s)?;
                    c = rest;
                }
                Opcode::Ldc => {
                    let (lit, c1) = decons(&mut self.heap, rest);
                    s = cell::cons(&mut self.heap, lit, s)?;
                    c = c1;
                }
                Opcode::Ld => {
                    let (name_cell, c1) = decons(&mut self.heap, rest);
                    let name = if name_cell.is_nil() {
                        None
                    } else {
                        match self.heap.get(name_cell) {
                            Cell::Sym { name } => Some(name.clone()),
                            _ => None,
                        }
                    };
                    drop(&mut self.heap, name_cell);
                    s = match name.and_then(|n| env::lookup_env(&self.heap, e, &n)) {
                        Some(value) => {
                            share(&mut self.heap, value);
                            cell::cons(&mut self.heap, value, s)?
                        }
                        None => self.domain_error(s, RuntimeError::UnboundSymbol)?,
                    };
                    c = c1;
                }
                Opcode::Car => {
                    if s.is_nil() {
                        s = self.domain_error(s, RuntimeError::StackUnderflow)?;
                    } else {
                        let (v, s1) = decons(&mut self.heap, s);
                        s = self.take_pair_field(v, s1, true)?;
                    }
                    c = rest;
                }
                Opcode::Cdr => {
                    if s.is_nil() {
                        s = self.domain_error(s, RuntimeError::StackUnderflow)?;
                    } else {
                        let (v, s1) = decons(&mut self.heap, s);
                        s = self.take_pair_field(v, s1, false)?;
                    }
                    c = rest;
                }
                Opcode::Atom => {
                    if s.is_nil() {
                        s = self.domain_error(s, RuntimeError::StackUnderflow)?;
                    } else {
                        let (v, s1) = decons(&mut self.heap, s);
                        let is_atom = v.is_nil() || !matches!(self.heap.get(v), Cell::Cons { .. });
                        drop(&mut self.heap, v);
                        s = self.push_bool(s1, is_atom)?;
                    }
                    c = rest;
                }
                Opcode::Cons => {
                    if s.is_nil() {
                        s = self.domain_error(s, RuntimeError::StackUnderflow)?;
                    } else {
                        let (car, s1) = decons(&mut self.heap, s);
                        if s1.is_nil() {
                            drop(&mut self.heap, car);
                            s = self.domain_error(s1, RuntimeError::StackUnderflow)?;
                        } else {
                            let (cdr, s2) = decons(&mut self.heap, s1);
                            let pair = cell::cons(&mut self.heap, car, cdr)?;
                            s = cell::cons(&mut self.heap, pair, s2)?;
                        }
                    }
                    c = rest;
                }
                Opcode::Eq => {
                    s = self.op_eq(s)?;
                    c = rest;
                }
                Opcode::Add => {
                    s = self.arith_op(s, |a, b| Some(a.wrapping_add(b)))?;
                    c = rest;
                }
                Opcode::Sub => {
                    s = self.arith_op(s, |a, b| Some(a.wrapping_sub(b)))?;
                    c = rest;
                }
                Opcode::Mul => {
                    s = self.arith_op(s, |a, b| Some(a.wrapping_mul(b)))?;
                    c = rest;
                }
                Opcode::Div => {
                    s = self.arith_op(s, |a, b| if b == 0 { None } else { Some(a.wrapping_div(b)) })?;
                    c = rest;
                }
                Opcode::Rem => {
                    s = self.arith_op(s, |a, b| if b == 0 { None } else { Some(a.wrapping_rem(b)) })?;
                    c = rest;
                }
                Opcode::Leq => {
                    s = self.op_leq(s)?;
                    c = rest;
                }
                Opcode::Sel => {
                    let (then_branch, c1) = decons(&mut self.heap, rest);
                    let (else_branch, c2) = decons(&mut self.heap, c1);
                    if s.is_nil() {
                        drop(&mut self.heap, then_branch);
                        drop(&mut self.heap, else_branch);
                        s = self.domain_error(s, RuntimeError::StackUnderflow)?;
                        c = c2;
                    } else {
                        let (cond, s1) = decons(&mut self.heap, s);
                        let chosen = if cond.is_nil() {
                            drop(&mut self.heap, then_branch);
                            else_branch
                        } else {
                            drop(&mut self.heap, else_branch);
                            then_branch
                        };
                        drop(&mut self.heap, cond);
                        d = cell::cons(&mut self.heap, c2, d)?;
                        s = s1;
                        c = chosen;
                    }
                }
                Opcode::Join => {
                    drop(&mut self.heap, rest);
                    if d.is_nil() {
                        c = Addr::NIL;
                    } else {
                        let (saved_c, d1) = decons(&mut self.heap, d);
                        c = saved_c;
                        d = d1;
                    }
                }
                Opcode::Ldf => {
                    // spec.md §4.E: "if `body` is not yet compiled,
                    // compile it in place and rewrite the pair to point
                    // at the compiled list" — done here, at load time,
                    // not deferred to the first `AP`/`RAP` against this
                    // closure. `ensure_compiled` mutates `body`'s own
                    // cell, so `funcspec`'s `cdr` still points at the
                    // (now compiled) body afterwards; no recons needed.
                    let (funcspec, c1) = decons(&mut self.heap, rest);
                    let body = match self.heap.get(funcspec) {
                        Cell::Cons { cdr, .. } => Some(*cdr),
                        _ => None,
                    };
                    if let Some(body) = body {
                        match self.ensure_compiled(body) {
                            Ok(_) => {}
                            Err(RuntimeError::Compile(err)) => {
                                drop(&mut self.heap, funcspec);
                                s = self.domain_error(s, RuntimeError::Compile(err))?;
                                c = c1;
                                continue;
                            }
                            Err(other) => return Err(other),
                        }
                    }
                    share(&mut self.heap, e);
                    let closure = cell::cons(&mut self.heap, funcspec, e)?;
                    s = cell::cons(&mut self.heap, closure, s)?;
                    c = c1;
                }
                Opcode::Ap => {
                    let (c1, splice_n) = self.pop_optional_int(rest);
                    if s.is_nil() {
                        s = self.domain_error(s, RuntimeError::StackUnderflow)?;
                        c = c1;
                        continue;
                    }
                    let (closure, s1) = decons(&mut self.heap, s);
                    let (args, s2) = self.take_args(s1, splice_n);
                    let (new_s, new_e, new_c, new_d) = self.apply(closure, args, e, s2, c1, d)?;
                    s = new_s;
                    e = new_e;
                    c = new_c;
                    d = new_d;
                }
                Opcode::Rap => {
                    let (c1, splice_n) = self.pop_optional_int(rest);
                    if s.is_nil() {
                        s = self.domain_error(s, RuntimeError::StackUnderflow)?;
                        c = c1;
                        continue;
                    }
                    let (closure, s1) = decons(&mut self.heap, s);
                    let (args, s2) = self.take_args(s1, splice_n);
                    let (new_s, new_e, new_c, new_d) =
                        self.apply_recursive(closure, args, e, s2, c1, d)?;
                    s = new_s;
                    e = new_e;
                    c = new_c;
                    d = new_d;
                }
                Opcode::Rtn => {
                    drop(&mut self.heap, rest);
                    let (retval, s_junk) = if s.is_nil() {
                        (Addr::NIL, Addr::NIL)
                    } else {
                        decons(&mut self.heap, s)
                    };
                    drop(&mut self.heap, s_junk);
                    if d.is_nil() {
                        drop(&mut self.heap, e);
                        return Ok(retval);
                    }
                    let (prev_c, d1) = decons(&mut self.heap, d);
                    let (prev_e, d2) = decons(&mut self.heap, d1);
                    let (prev_s, d3) = decons(&mut self.heap, d2);
                    drop(&mut self.heap, e);
                    s = cell::cons(&mut self.heap, retval, prev_s)?;
                    e = prev_e;
                    c = prev_c;
                    d = d3;
                }
                Opcode::Dum => {
                    e = env::push_dummy_frame(&mut self.heap, e)?;
                    c = rest;
                }
                Opcode::Read => {
                    if s.is_nil() {
                        s = self.domain_error(s, RuntimeError::StackUnderflow)?;
                    } else {
                        let (port, s1) = decons(&mut self.heap, s);
                        let value = match crate::reader::read_from_port(&mut self.heap, port) {
                            Ok(v) => v,
                            Err(_) => cell::alloc_error(&mut self.heap, "read: malformed input")?,
                        };
                        drop(&mut self.heap, port);
                        s = cell::cons(&mut self.heap, value, s1)?;
                    }
                    c = rest;
                }
                Opcode::Print => {
                    if s.is_nil() {
                        s = self.domain_error(s, RuntimeError::StackUnderflow)?;
                    } else {
                        let (value, s1) = decons(&mut self.heap, s);
                        if s1.is_nil() {
                            drop(&mut self.heap, value);
                            s = self.domain_error(s1, RuntimeError::StackUnderflow)?;
                        } else {
                            let (port, s2) = decons(&mut self.heap, s1);
                            let text = crate::printer::print(&self.heap, value);
                            self.write_port(port, text.as_bytes())?;
                            drop(&mut self.heap, value);
                            drop(&mut self.heap, port);
                            s = cell::cons(&mut self.heap, Addr::NIL, s2)?;
                        }
                    }
                    c = rest;
                }
                Opcode::Stop => {
                    drop(&mut self.heap, rest);
                    return self.halt(s, e, d);
                }
            }
        }
    }

    /// Common shutdown for every path that ends the run with `S`/`E`/`D`
    /// still live registers rather than an already-isolated return
    /// value (plain fallthrough off the end of `C`, and `STOP`):
    /// releases `E` and `D`, and returns whatever sits on top of `S`.
    fn halt(&mut self, s: Addr, e: Addr, d: Addr) -> Result<Addr, RuntimeError> {
        drop(&mut self.heap, e);
        drop(&mut self.heap, d);
        if s.is_nil() {
            return Ok(Addr::NIL);
        }
        let (top, rest) = decons(&mut self.heap, s);
        drop(&mut self.heap, rest);
        Ok(top)
    }

    fn domain_error(&mut self, s: Addr, err: RuntimeError) -> Result<Addr, RuntimeError> {
        tracing::warn!(?err, "domain error");
        let cell = cell::alloc_error(&mut self.heap, err.to_string())?;
        Ok(cell::cons(&mut self.heap, cell, s)?)
    }

    /// `to_bool`'s convention: true is the `#t` symbol, false is
    /// literal `NIL` — not a `#f` cell — so the result slots directly
    /// into `SEL`'s `cond.is_nil()` test (`SPEC_FULL.md` §A).
    fn push_bool(&mut self, s: Addr, truthy: bool) -> Result<Addr, RuntimeError> {
        if !truthy {
            return Ok(cell::cons(&mut self.heap, Addr::NIL, s)?);
        }
        let sym = cell::alloc_sym(&mut self.heap, "#t")?;
        Ok(cell::cons(&mut self.heap, sym, s)?)
    }

    /// `CAR`/`CDR`: takes ownership of the popped pair `v` (already
    /// disconnected from `S` by the caller's `decons`) and the
    /// remaining stack `s1`, pushing the requested field or a
    /// `TypeMismatch` error.
    fn take_pair_field(&mut self, v: Addr, s1: Addr, want_car: bool) -> Result<Addr, RuntimeError> {
        if v.is_nil() {
            return self.domain_error(s1, RuntimeError::TypeMismatch);
        }
        match self.heap.get(v) {
            Cell::Cons { car, cdr } => {
                let field = if want_car { *car } else { *cdr };
                share(&mut self.heap, field);
                drop(&mut self.heap, v);
                Ok(cell::cons(&mut self.heap, field, s1)?)
            }
            _ => {
                drop(&mut self.heap, v);
                self.domain_error(s1, RuntimeError::TypeMismatch)
            }
        }
    }

    /// `EQ`: pointer identity for compound values, atom-value equality
    /// otherwise (mirrors `original_source/interp.c::secd_eq`).
    fn op_eq(&mut self, s: Addr) -> Result<Addr, RuntimeError> {
        if s.is_nil() {
            return self.domain_error(s, RuntimeError::StackUnderflow);
        }
        let (a, s1) = decons(&mut self.heap, s);
        if s1.is_nil() {
            drop(&mut self.heap, a);
            return self.domain_error(s1, RuntimeError::StackUnderflow);
        }
        let (b, s2) = decons(&mut self.heap, s1);
        let truthy = secd_eq(&self.heap, a, b);
        drop(&mut self.heap, a);
        drop(&mut self.heap, b);
        self.push_bool(s2, truthy)
    }

    /// `LEQ`: numeric `<=`, `TypeMismatch` if either operand is not an
    /// integer.
    fn op_leq(&mut self, s: Addr) -> Result<Addr, RuntimeError> {
        if s.is_nil() {
            return self.domain_error(s, RuntimeError::StackUnderflow);
        }
        let (a, s1) = decons(&mut self.heap, s);
        if s1.is_nil() {
            drop(&mut self.heap, a);
            return self.domain_error(s1, RuntimeError::StackUnderflow);
        }
        let (b, s2) = decons(&mut self.heap, s1);
        let ints = self.read_int_pair(a, b);
        drop(&mut self.heap, a);
        drop(&mut self.heap, b);
        match ints {
            Some((x, y)) => self.push_bool(s2, x <= y),
            None => self.domain_error(s2, RuntimeError::TypeMismatch),
        }
    }

    fn arith_op(&mut self, s: Addr, f: impl Fn(i64, i64) -> Option<i64>) -> Result<Addr, RuntimeError> {
        if s.is_nil() {
            return self.domain_error(s, RuntimeError::StackUnderflow);
        }
        let (a, s1) = decons(&mut self.heap, s);
        if s1.is_nil() {
            drop(&mut self.heap, a);
            return self.domain_error(s1, RuntimeError::StackUnderflow);
        }
        let (b, s2) = decons(&mut self.heap, s1);
        let ints = self.read_int_pair(a, b);
        drop(&mut self.heap, a);
        drop(&mut self.heap, b);
        match ints {
            None => self.domain_error(s2, RuntimeError::TypeMismatch),
            Some((x, y)) => match f(x, y) {
                None => self.domain_error(s2, RuntimeError::DivisionByZero),
                Some(result) => {
                    let n = cell::alloc_int(&mut self.heap, result)?;
                    Ok(cell::cons(&mut self.heap, n, s2)?)
                }
            },
        }
    }

    /// Reads both operands as `Int`s without dereferencing a NIL
    /// address (either operand may legitimately be `()` if a program
    /// hands a non-numeric value to an arithmetic opcode).
    fn read_int_pair(&self, a: Addr, b: Addr) -> Option<(i64, i64)> {
        if a.is_nil() || b.is_nil() {
            return None;
        }
        match (self.heap.get(a), self.heap.get(b)) {
            (Cell::Int(x), Cell::Int(y)) => Some((*x, *y)),
            _ => None,
        }
    }

    /// Peeks one cell past `c`'s head: if it is a literal integer, the
    /// next `AP`/`RAP` reads it as a hand-assembled argument count
    /// instead of expecting a pre-built argument list (`SPEC_FULL.md`
    /// §E; the compiler itself never emits this, since
    /// `opcode::inline_arg_count(Ap) == 0`).
    fn pop_optional_int(&mut self, c: Addr) -> (Addr, Option<i64>) {
        if c.is_nil() {
            return (c, None);
        }
        let is_int = match self.heap.get(c) {
            Cell::Cons { car, .. } => matches!(self.heap.get(*car), Cell::Int(_)),
            _ => false,
        };
        if !is_int {
            return (c, None);
        }
        let (n_cell, rest) = decons(&mut self.heap, c);
        let n = match self.heap.get(n_cell) {
            Cell::Int(n) => *n,
            _ => unreachable!(),
        };
        drop(&mut self.heap, n_cell);
        (rest, Some(n))
    }

    /// Resolves `AP`/`RAP`'s argument value from the stack left after
    /// the closure was popped: a spliced flat count when `splice_n` is
    /// `Some`, otherwise a classic pre-built list popped as the new top
    /// of stack.
    fn take_args(&mut self, s1: Addr, splice_n: Option<i64>) -> (Addr, Addr) {
        match splice_n {
            Some(n) => self.splice_args(s1, n),
            None => {
                if s1.is_nil() {
                    (Addr::NIL, Addr::NIL)
                } else {
                    decons(&mut self.heap, s1)
                }
            }
        }
    }

    /// Rewires the `n`th cons cell of `s` to end there, with zero
    /// allocation and zero refcount traffic: the truncated head becomes
    /// the argument list, and the severed tail — whose ownership simply
    /// moves from the cut cell's `cdr` slot to this function's return
    /// value — becomes the new stack (`SPEC_FULL.md` §E).
    fn splice_args(&mut self, s: Addr, n: i64) -> (Addr, Addr) {
        if n <= 0 || s.is_nil() {
            return (Addr::NIL, s);
        }
        let mut cur = s;
        for _ in 0..(n - 1) {
            match self.heap.get(cur) {
                Cell::Cons { cdr, .. } if cdr.not_nil() => cur = *cdr,
                _ => break,
            }
        }
        let rest = match self.heap.get(cur) {
            Cell::Cons { cdr, .. } => *cdr,
            _ => Addr::NIL,
        };
        if let Cell::Cons { cdr, .. } = self.heap.get_mut(cur) {
            *cdr = Addr::NIL;
        }
        (s, rest)
    }

    /// Strips the compile-sentinel a compiled control path is prefixed
    /// with, so `C` starts directly at the first real opcode instead
    /// of re-checking for the sentinel on every step. A no-op on a raw
    /// (never-compiled) opcode list, which hand-assembled control
    /// paths in tests may pass directly (`SPEC_FULL.md` §E).
    fn entry_point(&mut self, control: Addr) -> Addr {
        if !compiler::is_control_compiled(&self.heap, control, self.sentinel) || control.is_nil() {
            return control;
        }
        let (head, ops) = decons(&mut self.heap, control);
        drop(&mut self.heap, head);
        ops
    }

    /// Compiles `body` in place if it is not already compiled, splicing
    /// the compiled structure directly into `body`'s own cell so every
    /// other holder of that address — every closure built from repeated
    /// evaluation of the same `LDF` — observes the compiled form from
    /// then on (`SPEC_FULL.md` §E, "compile once, every closure
    /// reuses").
    fn ensure_compiled(&mut self, body: Addr) -> Result<Addr, RuntimeError> {
        if body.is_nil() || compiler::is_control_compiled(&self.heap, body, self.sentinel) {
            return Ok(body);
        }
        let compiled = compiler::compile_control_path(&mut self.heap, body, self.sentinel)?;
        if compiled == body {
            return Ok(body);
        }
        let (new_car, new_cdr) = decons(&mut self.heap, compiled);
        let (old_car, old_cdr) = match self.heap.get(body) {
            Cell::Cons { car, cdr } => (*car, *cdr),
            _ => return Err(RuntimeError::TypeMismatch),
        };
        drop(&mut self.heap, old_car);
        drop(&mut self.heap, old_cdr);
        *self.heap.get_mut(body) = Cell::Cons {
            car: new_car,
            cdr: new_cdr,
        };
        Ok(body)
    }

    fn as_native(&self, closure: Addr) -> Option<NativeId> {
        if closure.is_nil() {
            return None;
        }
        match self.heap.get(closure) {
            Cell::NativeFn(id) => Some(*id),
            _ => None,
        }
    }

    /// Applies `closure` to `args`, binding them in a fresh frame consed
    /// onto the closure's captured environment (`AP`).
    fn apply(
        &mut self,
        closure: Addr,
        args: Addr,
        e: Addr,
        s2: Addr,
        c_after: Addr,
        d: Addr,
    ) -> Result<(Addr, Addr, Addr, Addr), RuntimeError> {
        if let Some(id) = self.as_native(closure) {
            let (s, c) = self.call_native(id, closure, args, e, s2, c_after)?;
            return Ok((s, e, c, d));
        }
        if closure.is_nil() || !matches!(self.heap.get(closure), Cell::Cons { .. }) {
            drop(&mut self.heap, closure);
            drop(&mut self.heap, args);
            let s = self.domain_error(s2, RuntimeError::TypeMismatch)?;
            return Ok((s, e, c_after, d));
        }
        let (funcspec, cenv) = decons(&mut self.heap, closure);
        if !matches!(self.heap.get(funcspec), Cell::Cons { .. }) {
            drop(&mut self.heap, funcspec);
            drop(&mut self.heap, cenv);
            drop(&mut self.heap, args);
            let s = self.domain_error(s2, RuntimeError::TypeMismatch)?;
            return Ok((s, e, c_after, d));
        }
        let (params, body) = decons(&mut self.heap, funcspec);
        let body = match self.ensure_compiled(body) {
            Ok(b) => b,
            Err(RuntimeError::Compile(err)) => {
                drop(&mut self.heap, params);
                drop(&mut self.heap, body);
                drop(&mut self.heap, cenv);
                drop(&mut self.heap, args);
                let s = self.domain_error(s2, RuntimeError::Compile(err))?;
                return Ok((s, e, c_after, d));
            }
            Err(other) => return Err(other),
        };
        let entry = self.entry_point(body);
        let frame = env::new_frame(&mut self.heap, params, args)?;
        let new_env = cell::cons(&mut self.heap, frame, cenv)?;
        self.enter_call(entry, new_env, c_after, s2, e, d)
    }

    /// Like [`Self::apply`], but binds into the dummy frame already at
    /// the head of the current environment instead of consing a fresh
    /// one (`RAP`; spec §4.D's `letrec`-style recursive binding).
    fn apply_recursive(
        &mut self,
        closure: Addr,
        args: Addr,
        e: Addr,
        s2: Addr,
        c_after: Addr,
        d: Addr,
    ) -> Result<(Addr, Addr, Addr, Addr), RuntimeError> {
        if let Some(id) = self.as_native(closure) {
            let (s, c) = self.call_native(id, closure, args, e, s2, c_after)?;
            return Ok((s, e, c, d));
        }
        if closure.is_nil() || !matches!(self.heap.get(closure), Cell::Cons { .. }) {
            drop(&mut self.heap, closure);
            drop(&mut self.heap, args);
            let s = self.domain_error(s2, RuntimeError::TypeMismatch)?;
            return Ok((s, e, c_after, d));
        }
        let (funcspec, cenv) = decons(&mut self.heap, closure);
        if !matches!(self.heap.get(funcspec), Cell::Cons { .. }) {
            drop(&mut self.heap, funcspec);
            drop(&mut self.heap, cenv);
            drop(&mut self.heap, args);
            drop(&mut self.heap, e);
            let s = self.domain_error(s2, RuntimeError::TypeMismatch)?;
            return Ok((s, Addr::NIL, c_after, d));
        }
        let (params, body) = decons(&mut self.heap, funcspec);
        let body = match self.ensure_compiled(body) {
            Ok(b) => b,
            Err(RuntimeError::Compile(err)) => {
                drop(&mut self.heap, params);
                drop(&mut self.heap, body);
                drop(&mut self.heap, cenv);
                drop(&mut self.heap, args);
                drop(&mut self.heap, e);
                let s = self.domain_error(s2, RuntimeError::Compile(err))?;
                return Ok((s, Addr::NIL, c_after, d));
            }
            Err(other) => return Err(other),
        };
        let entry = self.entry_point(body);
        env::patch_dummy_frame(&mut self.heap, cenv, params, args);
        drop(&mut self.heap, e);
        self.enter_call(entry, cenv, c_after, s2, Addr::NIL, d)
    }

    /// Calls a native primitive directly, bypassing the dump/frame
    /// machinery entirely (spec §3: "the primitive takes the machine
    /// and an argument list and returns a result cell").
    fn call_native(
        &mut self,
        id: NativeId,
        closure: Addr,
        args: Addr,
        e: Addr,
        s2: Addr,
        c_after: Addr,
    ) -> Result<(Addr, Addr), RuntimeError> {
        drop(&mut self.heap, closure);
        let arg_values = intrinsics::collect_list(&self.heap, args);
        let result = if id == intrinsics::SECD_DIAGNOSTIC_ID {
            let which = arg_values
                .first()
                .and_then(|&a| match self.heap.get(a) {
                    Cell::Sym { name } => Some(name.to_string()),
                    _ => None,
                })
                .unwrap_or_default();
            intrinsics::diagnostic(&mut self.heap, &which, e, self.tick)
        } else {
            intrinsics::dispatch(&mut self.heap, id, &arg_values)
        };
        drop(&mut self.heap, args);
        let s = cell::cons(&mut self.heap, result?, s2)?;
        Ok((s, c_after))
    }

    /// Shared tail of `AP`/`RAP`: pushes a fresh three-slot dump frame,
    /// unless `c_after` is tail-eligible, in which case the existing top
    /// dump frame is reused instead of grown (spec §8 "Tail-call bound";
    /// `SPEC_FULL.md` §E).
    fn enter_call(
        &mut self,
        body: Addr,
        new_env: Addr,
        c_after: Addr,
        s2: Addr,
        old_e: Addr,
        d: Addr,
    ) -> Result<(Addr, Addr, Addr, Addr), RuntimeError> {
        if self.tail_call_elimination && is_tail_position(&self.heap, c_after) {
            drop(&mut self.heap, c_after);
            drop(&mut self.heap, s2);
            drop(&mut self.heap, old_e);
            Ok((Addr::NIL, new_env, body, d))
        } else {
            let d1 = cell::cons(&mut self.heap, s2, d)?;
            let d2 = cell::cons(&mut self.heap, old_e, d1)?;
            let d3 = cell::cons(&mut self.heap, c_after, d2)?;
            Ok((Addr::NIL, new_env, body, d3))
        }
    }

    fn write_port(&mut self, port: Addr, bytes: &[u8]) -> Result<(), HeapError> {
        if port.is_nil() {
            return Ok(());
        }
        let str_target = match self.heap.get(port) {
            Cell::Port(crate::port::PortState::Str { target, .. }) => Some(*target),
            _ => None,
        };
        if let Some(target) = str_target {
            crate::port::write_str_bytes(&mut self.heap, target, bytes)?;
        } else if let Cell::Port(state) = self.heap.get_mut(port) {
            let _ = state.write_file_bytes(bytes);
        }
        Ok(())
    }
}

/// Pointer identity for compound values, atom-value equality otherwise
/// — mirrors `original_source/interp.c::secd_eq`, which falls back to
/// `atom_eq` only once a raw pointer comparison fails.
#[must_use]
fn secd_eq(heap: &Heap, a: Addr, b: Addr) -> bool {
    if a == b {
        return true;
    }
    if a.is_nil() || b.is_nil() {
        return false;
    }
    cell::atom_eq(heap.get(a), heap.get(b))
}

#[cfg(test)]
#[path = "vm_test.rs"]
mod vm_test;
