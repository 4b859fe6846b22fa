//! System error register and runtime diagnostics.
//!
//! [`FaultRegister`] is a latched bitmask of [`SystemError`]s with operator
//! acknowledgment. [`Diagnostics`] wraps it and is the error and diagnostic
//! sink handed to the relay controller: hardware faults set a bit and are
//! queued for telemetry, board echo lines are counted and logged.
//!
//! A panic hook drives the engine-stop line before the runtime aborts.

use core::fmt;

use heapless::Deque;
use log::{debug, error, info};

use crate::app::ports::{DiagnosticSink, ErrorSink};
use crate::error::RelayFault;

// ───────────────────────────────────────────────────────────────
// System errors
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SystemError {
    /// Stored configuration failed its integrity check.
    ConfigCorrupted = 0x01,
    /// No stored configuration, defaults in use.
    ConfigMissing = 0x02,
    /// Pressure reading unavailable or not finite.
    PressureSensor = 0x04,
    /// The relay board stopped acknowledging commands.
    HardwareFault = 0x08,
}

impl SystemError {
    pub const ALL: [Self; 4] = [
        Self::ConfigCorrupted,
        Self::ConfigMissing,
        Self::PressureSensor,
        Self::HardwareFault,
    ];

    pub const fn mask(self) -> u8 {
        self as u8
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::ConfigCorrupted => "stored config corrupted",
            Self::ConfigMissing => "no stored config, using defaults",
            Self::PressureSensor => "pressure sensor fault",
            Self::HardwareFault => "relay board not responding",
        }
    }

    /// Errors that make the machine unsafe to keep running unattended.
    pub const fn is_critical(self) -> bool {
        matches!(self, Self::ConfigCorrupted | Self::HardwareFault)
    }
}

impl fmt::Display for SystemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Latched error bitmask with acknowledgment.
#[derive(Debug, Clone, Default)]
pub struct FaultRegister {
    active: u8,
    acknowledged: u8,
    /// Times any error was raised, repeats included.
    raised: u32,
}

impl FaultRegister {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, err: SystemError) {
        if self.active & err.mask() == 0 {
            error!("SYSTEM ERROR 0x{:02X}: {err}", err.mask());
        }
        self.active |= err.mask();
        // A repeat needs acknowledging again.
        self.acknowledged &= !err.mask();
        self.raised = self.raised.saturating_add(1);
    }

    pub fn clear(&mut self, err: SystemError) {
        if self.active & err.mask() != 0 {
            info!("system error cleared: {err}");
        }
        self.active &= !err.mask();
        self.acknowledged &= !err.mask();
    }

    pub fn acknowledge(&mut self, err: SystemError) {
        if self.active & err.mask() != 0 {
            self.acknowledged |= err.mask();
        }
    }

    pub fn acknowledge_all(&mut self) {
        self.acknowledged = self.active;
    }

    pub fn clear_all(&mut self) {
        self.active = 0;
        self.acknowledged = 0;
    }

    pub fn is_set(&self, err: SystemError) -> bool {
        self.active & err.mask() != 0
    }

    pub fn flags(&self) -> u8 {
        self.active
    }

    pub fn has_errors(&self) -> bool {
        self.active != 0
    }

    pub fn has_unacknowledged(&self) -> bool {
        self.active & !self.acknowledged != 0
    }

    pub fn has_critical(&self) -> bool {
        SystemError::ALL
            .iter()
            .any(|e| e.is_critical() && self.is_set(*e))
    }

    pub fn raised_count(&self) -> u32 {
        self.raised
    }
}

// ───────────────────────────────────────────────────────────────
// Relay controller sinks
// ───────────────────────────────────────────────────────────────

const PENDING_FAULTS: usize = 8;

/// Error and diagnostic sink for the relay controller.
#[derive(Debug, Default)]
pub struct Diagnostics {
    faults: FaultRegister,
    pending: Deque<(u8, RelayFault), PENDING_FAULTS>,
    relay_timeouts: u32,
    echo_lines: u32,
    last_echo: heapless::String<64>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn faults(&self) -> &FaultRegister {
        &self.faults
    }

    pub fn faults_mut(&mut self) -> &mut FaultRegister {
        &mut self.faults
    }

    /// Next relay fault not yet published to telemetry.
    pub fn take_relay_fault(&mut self) -> Option<(u8, RelayFault)> {
        self.pending.pop_front()
    }

    pub fn relay_timeouts(&self) -> u32 {
        self.relay_timeouts
    }

    pub fn echo_lines(&self) -> u32 {
        self.echo_lines
    }

    pub fn last_echo(&self) -> &str {
        &self.last_echo
    }
}

impl ErrorSink for Diagnostics {
    fn hardware_fault(&mut self, relay: u8, fault: RelayFault) {
        error!("hardware fault: R{relay} {fault}");
        self.faults.set(SystemError::HardwareFault);
        self.relay_timeouts = self.relay_timeouts.saturating_add(1);
        if self.pending.is_full() {
            // Telemetry is behind; the oldest report is the least useful.
            let _ = self.pending.pop_front();
        }
        let _ = self.pending.push_back((relay, fault));
    }
}

impl DiagnosticSink for Diagnostics {
    fn echo_line(&mut self, line: &str) {
        debug!("relay board: {line}");
        self.echo_lines = self.echo_lines.saturating_add(1);
        self.last_echo.clear();
        for ch in line.chars() {
            if self.last_echo.push(ch).is_err() {
                break;
            }
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Runtime metrics
// ───────────────────────────────────────────────────────────────

/// Runtime diagnostics snapshot collected on demand.
#[derive(Debug, Clone)]
pub struct RuntimeMetrics {
    pub uptime_ms: u64,
    pub control_cycles: u64,
    pub relay_timeouts: u32,
    pub echo_lines: u32,
    pub error_flags: u8,
    pub heap_free: u32,
    pub heap_min_free: u32,
}

impl RuntimeMetrics {
    pub fn collect(uptime_ms: u64, control_cycles: u64, diag: &Diagnostics) -> Self {
        let (heap_free, heap_min_free) = Self::heap();
        Self {
            uptime_ms,
            control_cycles,
            relay_timeouts: diag.relay_timeouts(),
            echo_lines: diag.echo_lines(),
            error_flags: diag.faults().flags(),
            heap_free,
            heap_min_free,
        }
    }

    #[cfg(target_os = "espidf")]
    fn heap() -> (u32, u32) {
        use esp_idf_svc::sys::{esp_get_free_heap_size, esp_get_minimum_free_heap_size};
        // SAFETY: plain counter reads with no preconditions.
        unsafe { (esp_get_free_heap_size(), esp_get_minimum_free_heap_size()) }
    }

    #[cfg(not(target_os = "espidf"))]
    fn heap() -> (u32, u32) {
        (0, 0)
    }
}

// ───────────────────────────────────────────────────────────────
// Panic hook
// ───────────────────────────────────────────────────────────────

/// Install a panic hook that stops the engine before the runtime aborts.
///
/// Call once during init, after the engine-stop GPIO is configured.
pub fn install_panic_handler() {
    std::panic::set_hook(Box::new(|info| {
        let reason = if let Some(msg) = info.payload().downcast_ref::<&str>() {
            *msg
        } else if let Some(msg) = info.payload().downcast_ref::<String>() {
            msg.as_str()
        } else {
            "unknown panic"
        };

        log::error!("PANIC: {reason}");

        #[cfg(target_os = "espidf")]
        {
            // Direct register write: the controller that owns the pin is
            // unreachable from panic context.
            crate::drivers::hw_init::gpio_write(crate::pins::ENGINE_STOP_GPIO, true);
            log::error!("engine stopped by panic handler");
        }
    }));
}
