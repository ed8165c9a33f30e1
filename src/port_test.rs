// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2025 Tobias Sarnowski <tobias@sarnowski.cloud>

use super::*;
use crate::cell;
use crate::heap::Heap;

#[test]
fn direction_can_read_write() {
    assert!(Direction::Input.can_read());
    assert!(!Direction::Input.can_write());
    assert!(Direction::Output.can_write());
    assert!(!Direction::Output.can_read());
    assert!(Direction::InputOutput.can_read());
    assert!(Direction::InputOutput.can_write());
}

#[test]
fn close_is_idempotent() {
    let mut state = PortState::Closed;
    assert!(state.is_closed());
    assert_eq!(state.close(), None);
    assert!(state.is_closed());
}

#[test]
fn close_on_str_port_returns_its_target_once() {
    let mut h = Heap::new(32);
    let data = h.alloc_bytes(b"hi").unwrap();
    let target = cell::alloc_ref(&mut h, data).unwrap();
    let mut state = PortState::Str {
        direction: Direction::Input,
        target,
    };
    assert_eq!(state.close(), Some(target));
    assert!(state.is_closed());
    assert_eq!(state.close(), None, "closing twice never returns the target twice");
}

#[test]
fn read_str_byte_advances_offset_then_hits_eof() {
    let mut h = Heap::new(32);
    let data = h.alloc_bytes(b"ab").unwrap();
    let target = cell::alloc_str(&mut h, b"").unwrap();
    h.set_str_data(target, data);
    h.set_str_offset(target, 0);

    assert_eq!(read_str_byte(&mut h, target), i32::from(b'a'));
    assert_eq!(read_str_byte(&mut h, target), i32::from(b'b'));
    assert_eq!(read_str_byte(&mut h, target), EOF);
}

#[test]
fn write_str_bytes_grows_the_backing_chunk() {
    let mut h = Heap::new(64);
    let target = cell::alloc_str(&mut h, b"").unwrap();
    let n = write_str_bytes(&mut h, target, b"hello").unwrap();
    assert_eq!(n, 5);
    let (data, offset) = h.str_parts(target);
    assert_eq!(offset, 5);
    assert_eq!(h.array_bytes(data), b"hello");
}

#[test]
fn write_str_bytes_continues_from_current_offset() {
    let mut h = Heap::new(64);
    let target = cell::alloc_str(&mut h, b"").unwrap();
    write_str_bytes(&mut h, target, b"ab").unwrap();
    write_str_bytes(&mut h, target, b"cd").unwrap();
    let (data, _) = h.str_parts(target);
    assert_eq!(h.array_bytes(data), b"abcd");
}
