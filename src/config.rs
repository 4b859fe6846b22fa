//! System configuration parameters
//!
//! All tunable parameters for the log-splitter controller. Values are loaded
//! once at boot through a [`ConfigPort`](crate::app::ports::ConfigPort) and
//! may be replaced at runtime by an operator command.

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::pins;

/// Debounce window presets for the two limit-switch channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DebouncePreset {
    /// 2 ms: very clean switches on a fast cylinder.
    Fast,
    /// 5 ms.
    #[default]
    Medium,
    /// 10 ms: noisy or worn switches.
    Slow,
}

impl DebouncePreset {
    pub const fn window_ms(self) -> u32 {
        match self {
            Self::Fast => 2,
            Self::Medium => 5,
            Self::Slow => 10,
        }
    }
}

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Sequence ---
    /// Time a limit condition must hold before the stage advances (ms)
    pub sequence_stable_ms: u32,
    /// Time the start interlock must hold before the cylinder moves (ms)
    pub sequence_start_stable_ms: u32,
    /// Maximum time spent in one stage before the sequence aborts (ms)
    pub sequence_timeout_ms: u32,
    /// Pressure that counts as "extend limit reached" (PSI)
    pub extend_pressure_limit_psi: f32,
    /// Pressure that counts as "retract limit reached" (PSI)
    pub retract_pressure_limit_psi: f32,

    // --- Inputs ---
    /// Debounce preset for the two limit-switch channels
    pub limit_debounce: DebouncePreset,
    /// Debounce window for every other watched channel (ms)
    pub input_debounce_ms: u32,
    /// Bit `i` set = `WATCH_CHANNELS[i]` is normally-closed (active-high)
    pub pin_polarity_bitmap: u8,

    // --- Safety ---
    /// Pressure at or above which the safety interlock engages (PSI)
    pub safety_threshold_psi: f32,
    /// Pressure must fall below `threshold - hysteresis` to clear (PSI)
    pub safety_hysteresis_psi: f32,

    // --- Relay board ---
    /// Time to wait for an `OK` after each command frame (ms)
    pub relay_response_timeout_ms: u32,
    /// Additional attempts after the first unacknowledged frame
    pub relay_max_retries: u8,
    /// Settle time after powering the relay board (ms)
    pub relay_power_settle_ms: u32,

    // --- Timing ---
    /// Control loop interval (ms)
    pub control_loop_interval_ms: u32,
    /// Sequence status publish interval (ms)
    pub status_interval_ms: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // Sequence
            sequence_stable_ms: 15,
            sequence_start_stable_ms: 100,
            sequence_timeout_ms: 30_000,
            extend_pressure_limit_psi: 2300.0,
            retract_pressure_limit_psi: 2300.0,

            // Inputs: both limit switches normally-closed
            limit_debounce: DebouncePreset::Medium,
            input_debounce_ms: 20,
            pin_polarity_bitmap: 0b0011_0000,

            // Safety
            safety_threshold_psi: 2500.0,
            safety_hysteresis_psi: 10.0,

            // Relay board
            relay_response_timeout_ms: 100,
            relay_max_retries: 2,
            relay_power_settle_ms: 50,

            // Timing
            control_loop_interval_ms: 10, // 100 Hz
            status_interval_ms: 1000,
        }
    }
}

impl SystemConfig {
    /// Range-check every field. Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sequence_stable_ms > 10_000 {
            return Err(ConfigError::ValidationFailed("sequence_stable_ms > 10000"));
        }
        if self.sequence_start_stable_ms > 10_000 {
            return Err(ConfigError::ValidationFailed(
                "sequence_start_stable_ms > 10000",
            ));
        }
        if !(1_000..=600_000).contains(&self.sequence_timeout_ms) {
            return Err(ConfigError::ValidationFailed(
                "sequence_timeout_ms outside 1000..=600000",
            ));
        }
        if !self.safety_threshold_psi.is_finite() || self.safety_threshold_psi <= 0.0 {
            return Err(ConfigError::ValidationFailed("safety_threshold_psi"));
        }
        if !self.safety_hysteresis_psi.is_finite()
            || self.safety_hysteresis_psi <= 0.0
            || self.safety_hysteresis_psi >= self.safety_threshold_psi
        {
            return Err(ConfigError::ValidationFailed(
                "safety_hysteresis_psi must be in (0, threshold)",
            ));
        }
        for limit in [self.extend_pressure_limit_psi, self.retract_pressure_limit_psi] {
            if !limit.is_finite() || limit <= 0.0 {
                return Err(ConfigError::ValidationFailed("pressure limit"));
            }
        }
        if self.input_debounce_ms == 0 || self.input_debounce_ms > 1000 {
            return Err(ConfigError::ValidationFailed("input_debounce_ms"));
        }
        if self.relay_response_timeout_ms == 0 || self.relay_response_timeout_ms > 5000 {
            return Err(ConfigError::ValidationFailed("relay_response_timeout_ms"));
        }
        if self.relay_max_retries > 10 {
            return Err(ConfigError::ValidationFailed("relay_max_retries > 10"));
        }
        if self.control_loop_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed("control_loop_interval_ms"));
        }
        Ok(())
    }

    /// Whether `channel` is wired normally-closed (active when the line is high).
    pub fn is_normally_closed(&self, channel: u8) -> bool {
        pins::watch_index(channel)
            .is_some_and(|i| self.pin_polarity_bitmap & (1 << i) != 0)
    }

    /// Debounce window for `channel`: preset for limit switches, fixed otherwise.
    pub fn debounce_window_ms(&self, channel: u8) -> u32 {
        if pins::is_limit_switch(channel) {
            self.limit_debounce.window_ms()
        } else {
            self.input_debounce_ms
        }
    }

    /// Worst-case time a single `set_relay` call can block (ms).
    pub fn relay_worst_case_block_ms(&self) -> u32 {
        self.relay_response_timeout_ms * (1 + u32::from(self.relay_max_retries))
    }
}
