//! Fuzz target: `LineAssembler::push` and the relay line parsers
//!
//! Drives arbitrary board output through the line assembler and checks
//! that completed lines stay within `MAX_LINE`, never carry a terminator,
//! and that `is_ack` / `parse_command` accept anything without panicking.
//!
//! cargo fuzz run fuzz_line_assembler

#![no_main]

use libfuzzer_sys::fuzz_target;
use logsplitter::pins::MAX_RELAYS;
use logsplitter::relay::protocol::{LineAssembler, MAX_LINE, is_ack, parse_command};

fuzz_target!(|data: &[u8]| {
    let mut rx = LineAssembler::new();

    for &byte in data {
        if let Some(line) = rx.push(byte) {
            assert!(line.len() <= MAX_LINE, "line exceeds MAX_LINE");
            assert!(!line.contains(['\r', '\n']), "terminator leaked into line");
            let _ = is_ack(line);
            if let Some((relay, _)) = parse_command(line) {
                assert!((1..=MAX_RELAYS).contains(&relay));
            }
        }
    }

    // After a clear nothing partial may remain.
    rx.clear();
    assert!(!rx.pending());
});
