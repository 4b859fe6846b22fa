//! Mock hardware adapters for integration tests.
//!
//! Everything the controller touches on the device has a host-side
//! stand-in here: a simulated clock that only moves when told to (or when
//! the code under test delays), a scripted relay board, an engine-stop pin,
//! raw input lines with a pressure source, and a recording event sink.

#![allow(dead_code)]

use std::cell::Cell;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, OutputPin};

use logsplitter::app::events::{AppEvent, SequenceEvent};
use logsplitter::app::ports::{Clock, EventSink, InputPort, PressurePort, RelayTransport};
use logsplitter::config::SystemConfig;
use logsplitter::error::TransportError;
use logsplitter::pins::{self, WATCH_CHANNELS, WATCH_COUNT};

// ── SimClock ──────────────────────────────────────────────────

/// Microsecond clock shared between the test and the controller.
#[derive(Clone, Default)]
pub struct SimClock {
    us: Rc<Cell<u64>>,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance_ms(&self, ms: u64) {
        self.us.set(self.us.get() + ms * 1_000);
    }

    pub fn set_ms(&self, ms: u64) {
        self.us.set(ms * 1_000);
    }
}

impl Clock for SimClock {
    fn now_ms(&self) -> u64 {
        self.us.get() / 1_000
    }
}

impl DelayNs for SimClock {
    fn delay_ns(&mut self, ns: u32) {
        self.us.set(self.us.get() + u64::from(ns).div_ceil(1_000));
    }
}

// ── ScriptedBoard ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardMode {
    /// Acknowledge every frame with `OK`.
    Ack,
    /// Accept frames, never answer.
    Silent,
    /// Reject every write at the driver level.
    WriteFails,
}

/// Relay board that answers according to its [`BoardMode`].
pub struct ScriptedBoard {
    pub mode: BoardMode,
    /// Sent back for every acknowledged frame.
    pub reply: String,
    /// Frames to swallow before acknowledging again.
    pub drop_next: u32,
    pub written: Vec<String>,
    rx: VecDeque<u8>,
}

impl ScriptedBoard {
    pub fn new(mode: BoardMode) -> Self {
        Self {
            mode,
            reply: "OK\r\n".to_string(),
            drop_next: 0,
            written: Vec::new(),
            rx: VecDeque::new(),
        }
    }

    /// Queue unsolicited board output.
    pub fn inject(&mut self, text: &str) {
        self.rx.extend(text.bytes());
    }

    /// Frames written for `relay`, terminator stripped.
    pub fn frames_for(&self, relay: u8) -> Vec<&str> {
        let prefix = format!("R{relay} ");
        self.written
            .iter()
            .map(|f| f.trim_end())
            .filter(|f| f.starts_with(&prefix))
            .collect()
    }
}

impl RelayTransport for ScriptedBoard {
    fn write_line(&mut self, line: &str) -> Result<(), TransportError> {
        if self.mode == BoardMode::WriteFails {
            return Err(TransportError::WriteFailed);
        }
        self.written.push(line.to_string());
        if self.mode != BoardMode::Ack {
            return Ok(());
        }
        if self.drop_next > 0 {
            self.drop_next -= 1;
        } else {
            self.rx.extend(self.reply.bytes());
        }
        Ok(())
    }

    fn read_byte(&mut self) -> Option<u8> {
        self.rx.pop_front()
    }
}

// ── MockPin ───────────────────────────────────────────────────

#[derive(Default)]
pub struct MockPin {
    pub high: bool,
    pub writes: u32,
}

impl ErrorType for MockPin {
    type Error = Infallible;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.high = false;
        self.writes += 1;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.high = true;
        self.writes += 1;
        Ok(())
    }
}

// ── MockInputs ────────────────────────────────────────────────

/// Raw line levels plus a pressure reading.
pub struct MockInputs {
    levels: [bool; WATCH_COUNT],
    config: SystemConfig,
    pub pressure_psi: f32,
}

impl MockInputs {
    /// Every channel at its inactive level for `config`'s polarity.
    pub fn idle(config: &SystemConfig) -> Self {
        let mut m = Self {
            levels: [false; WATCH_COUNT],
            config: config.clone(),
            pressure_psi: 0.0,
        };
        for &ch in &WATCH_CHANNELS {
            m.set_active(ch, false);
        }
        m
    }

    /// Drive the raw level that reads as `active` for this channel.
    pub fn set_active(&mut self, channel: u8, active: bool) {
        let i = pins::watch_index(channel).expect("watched channel");
        let nc = self.config.is_normally_closed(channel);
        self.levels[i] = if nc { active } else { !active };
    }

    pub fn press_start(&mut self) {
        self.set_active(pins::INPUT_START_A, true);
        self.set_active(pins::INPUT_START_B, true);
    }

    pub fn release_start(&mut self) {
        self.set_active(pins::INPUT_START_A, false);
        self.set_active(pins::INPUT_START_B, false);
    }
}

impl InputPort for MockInputs {
    fn sample(&mut self, channel: u8) -> bool {
        pins::watch_index(channel).is_some_and(|i| self.levels[i])
    }
}

impl PressurePort for MockInputs {
    fn pressure_psi(&mut self) -> f32 {
        self.pressure_psi
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sequence_events(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|e| match e {
                AppEvent::Sequence(s) => Some(s.to_string()),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    pub fn aborted_with(&self, reason: &str) -> bool {
        self.events.iter().any(|e| {
            matches!(e, AppEvent::Sequence(SequenceEvent::Aborted(r)) if r.as_str() == reason)
        })
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}
