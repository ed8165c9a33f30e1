// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2025 Tobias Sarnowski <tobias@sarnowski.cloud>

//! A minimal read-eval-print loop over [`secd_vm::Machine`]: reads one
//! expression at a time from stdin, compiles and runs it against a
//! persistent global environment, and prints the result or the error
//! it surfaced.

use std::io::Write as _;

use secd_vm::{Machine, MachineConfig};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut machine = match Machine::new(MachineConfig::new()) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("secd-repl: failed to start: {e}");
            std::process::exit(1);
        }
    };

    let stdin = std::io::stdin();
    let mut line = String::new();
    loop {
        print!("secd> ");
        let _ = std::io::stdout().flush();
        line.clear();
        match stdin.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                eprintln!("secd-repl: read error: {e}");
                break;
            }
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match machine.eval_str(trimmed) {
            Ok(value) => println!("{}", secd_vm::printer::print(machine.heap(), value)),
            Err(e) => println!("error: {e}"),
        }
    }
}
