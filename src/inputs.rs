//! Digital input debounce for the watched operator and limit-switch lines.
//!
//! ## Algorithm
//!
//! Each poll converts the raw line level to a logical "active" value using
//! the channel polarity, then:
//!
//! 1. if the logical value differs from the last raw sample, restart the
//!    agreement timer and remember the new sample;
//! 2. independently, once the last sample has held for the channel window
//!    and differs from the committed stable state, commit it and emit a
//!    [`ChangeEvent`].
//!
//! A stable state therefore never changes before `window` ms of continuous
//! agreement, and changes at most once per such run.
//!
//! | Channel class   | Window                       |
//! |-----------------|------------------------------|
//! | Limit switches  | preset: 2 / 5 / 10 ms        |
//! | Everything else | `input_debounce_ms` (20 ms)  |

use crate::config::SystemConfig;
use crate::pins::{self, WATCH_CHANNELS, WATCH_COUNT};

/// Electrical wiring of an input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    /// Contact closed at rest; the line reads high when the input is active.
    NormallyClosed,
    /// Open contact to ground with pull-up; the line reads low when active.
    NormallyOpen,
}

impl Polarity {
    /// Logical state for a raw line level.
    pub const fn is_active(self, level_high: bool) -> bool {
        match self {
            Self::NormallyClosed => level_high,
            Self::NormallyOpen => !level_high,
        }
    }
}

/// Stable state of every watched channel, one bit per entry of
/// [`WATCH_CHANNELS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputStates(u8);

impl InputStates {
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Stable state of `channel`; unwatched channels read inactive.
    pub fn get(self, channel: u8) -> bool {
        pins::watch_index(channel).is_some_and(|i| self.0 & (1 << i) != 0)
    }

    pub fn set(&mut self, channel: u8, active: bool) {
        if let Some(i) = pins::watch_index(channel) {
            if active {
                self.0 |= 1 << i;
            } else {
                self.0 &= !(1 << i);
            }
        }
    }

    /// Both start buttons held.
    pub fn start_interlock(self) -> bool {
        pins::START_PAIR.iter().all(|&ch| self.get(ch))
    }
}

/// A confirmed stable transition on one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEvent {
    pub channel: u8,
    pub active: bool,
    /// Snapshot of every channel after this transition was committed.
    pub all: InputStates,
}

#[derive(Debug, Clone, Copy)]
struct DigitalChannel {
    polarity: Polarity,
    window_ms: u32,
    raw_last: bool,
    stable: bool,
    last_raw_change_ms: u64,
}

impl DigitalChannel {
    const fn new(polarity: Polarity, window_ms: u32) -> Self {
        Self {
            polarity,
            window_ms,
            raw_last: false,
            stable: false,
            last_raw_change_ms: 0,
        }
    }
}

/// Per-channel raw-to-stable filter for every entry of [`WATCH_CHANNELS`].
pub struct Debouncer {
    channels: [DigitalChannel; WATCH_COUNT],
}

impl Debouncer {
    /// Channels configured from `config` (polarity bitmap and windows).
    pub fn new(config: &SystemConfig) -> Self {
        let mut d = Self {
            channels: [DigitalChannel::new(Polarity::NormallyOpen, 0); WATCH_COUNT],
        };
        d.apply_config(config);
        d
    }

    /// Re-read polarity and windows from `config`. Stable states are kept.
    pub fn apply_config(&mut self, config: &SystemConfig) {
        for &ch in &WATCH_CHANNELS {
            let polarity = if config.is_normally_closed(ch) {
                Polarity::NormallyClosed
            } else {
                Polarity::NormallyOpen
            };
            self.configure(ch, polarity, config.debounce_window_ms(ch));
        }
    }

    pub fn configure(&mut self, channel: u8, polarity: Polarity, window_ms: u32) {
        if let Some(c) = self.channel_mut(channel) {
            c.polarity = polarity;
            c.window_ms = window_ms;
        }
    }

    /// Seed a channel from its boot-time level without emitting an event.
    pub fn prime(&mut self, channel: u8, level_high: bool, now_ms: u64) {
        if let Some(c) = self.channel_mut(channel) {
            let active = c.polarity.is_active(level_high);
            c.raw_last = active;
            c.stable = active;
            c.last_raw_change_ms = now_ms;
        }
    }

    /// Feed one raw sample. Returns an event only on a committed transition.
    pub fn poll(&mut self, channel: u8, level_high: bool, now_ms: u64) -> Option<ChangeEvent> {
        let c = self.channel_mut(channel)?;
        let sample = c.polarity.is_active(level_high);

        if sample != c.raw_last {
            c.raw_last = sample;
            c.last_raw_change_ms = now_ms;
        }

        let held = now_ms.saturating_sub(c.last_raw_change_ms);
        if held < u64::from(c.window_ms) || c.raw_last == c.stable {
            return None;
        }

        c.stable = c.raw_last;
        let active = c.stable;
        log::debug!("input {channel} -> {}", if active { "active" } else { "inactive" });

        Some(ChangeEvent {
            channel,
            active,
            all: self.states(),
        })
    }

    /// Committed stable state of `channel`.
    pub fn state(&self, channel: u8) -> bool {
        match pins::watch_index(channel) {
            Some(i) => self.channels[i].stable,
            None => {
                debug_assert!(false, "unknown input channel {channel}");
                false
            }
        }
    }

    pub fn states(&self) -> InputStates {
        let mut bits = 0u8;
        for (i, c) in self.channels.iter().enumerate() {
            if c.stable {
                bits |= 1 << i;
            }
        }
        InputStates(bits)
    }

    pub fn window_ms(&self, channel: u8) -> Option<u32> {
        pins::watch_index(channel).map(|i| self.channels[i].window_ms)
    }

    fn channel_mut(&mut self, channel: u8) -> Option<&mut DigitalChannel> {
        if let Some(i) = pins::watch_index(channel) {
            Some(&mut self.channels[i])
        } else {
            debug_assert!(false, "unknown input channel {channel}");
            None
        }
    }
}
