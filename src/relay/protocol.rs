//! Relay board wire format.
//!
//! ```text
//!   controller ──▶ "R<n> ON\n" | "R<n> OFF\n"      n ∈ 1..=9
//!   board      ──▶ "OK\n"                          (case-insensitive, \r tolerated)
//! ```
//!
//! Anything else the board sends is echo/diagnostic chatter.

use core::fmt::Write as _;

use heapless::String;

use crate::pins::MAX_RELAYS;

/// Longest inbound line kept; the rest of an over-long line is dropped.
pub const MAX_LINE: usize = 64;

/// Outbound frame buffer: `R9 OFF\n` is the longest frame.
pub type Frame = String<12>;

/// Build the newline-terminated command frame for relay `n`.
pub fn encode(relay: u8, on: bool) -> Frame {
    let mut f = Frame::new();
    // Capacity covers every relay number the board accepts.
    let _ = writeln!(f, "R{} {}", relay, if on { "ON" } else { "OFF" });
    f
}

/// True when `line` (terminator and `\r` already stripped) is exactly
/// `OK`, in any case. Padded lines are chatter, not acks.
pub fn is_ack(line: &str) -> bool {
    line.eq_ignore_ascii_case("OK")
}

/// Parse an operator relay command such as `r1 on` or `R9 OFF`.
pub fn parse_command(text: &str) -> Option<(u8, bool)> {
    let mut parts = text.split_ascii_whitespace();
    let relay = parts.next()?;
    let state = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    let num = relay.strip_prefix(['R', 'r'])?;
    let n: u8 = num.parse().ok()?;
    if !(1..=MAX_RELAYS).contains(&n) {
        return None;
    }

    let on = if state.eq_ignore_ascii_case("ON") {
        true
    } else if state.eq_ignore_ascii_case("OFF") {
        false
    } else {
        return None;
    };
    Some((n, on))
}

/// Accumulates inbound bytes into complete lines.
#[derive(Debug, Default)]
pub struct LineAssembler {
    buf: String<MAX_LINE>,
    complete: bool,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one byte. Returns the completed line on `\n`.
    ///
    /// `\r` is ignored and non-ASCII bytes become `?`. Bytes past
    /// [`MAX_LINE`] are dropped, so an over-long line arrives truncated.
    pub fn push(&mut self, byte: u8) -> Option<&str> {
        if self.complete {
            self.buf.clear();
            self.complete = false;
        }
        match byte {
            b'\n' => {
                self.complete = true;
                Some(self.buf.as_str())
            }
            b'\r' => None,
            _ => {
                let ch = if byte.is_ascii() { byte as char } else { '?' };
                let _ = self.buf.push(ch);
                None
            }
        }
    }

    /// Drop any partial line.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.complete = false;
    }

    /// A partial line is buffered.
    pub fn pending(&self) -> bool {
        !self.complete && !self.buf.is_empty()
    }
}
