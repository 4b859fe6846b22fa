//! Acknowledged command protocol for the serial relay board.
//!
//! ## Command path
//!
//! ```text
//!   set_relay(n, on, manual)
//!     ├─ n ∉ 1..=9                         → InvalidChannel
//!     ├─ already commanded to `on`         → Ok, nothing sent
//!     ├─ lockout && on && n≠9 && !manual   → Blocked, nothing sent
//!     ├─ board unpowered                   → "R9 OFF" + settle delay
//!     └─ "R<n> ON|OFF" ─▶ wait ≤ timeout for "OK"
//!           ├─ ack          → commit state, Ok
//!           └─ no ack       → retry (max_retries more), then
//!                             report hardware fault once, Timeout
//! ```
//!
//! The commanded state of a relay only ever holds the last acknowledged
//! value. The power relay is inverted on this board: `R9 OFF` powers it up.
//!
//! Between transactions the board's echo stream is drained line by line and
//! forwarded to the diagnostic sink, so stale chatter can never be taken for
//! an acknowledgment.

pub mod protocol;

use core::fmt::Write as _;

use embedded_hal::delay::DelayNs;
use log::{debug, info, warn};

use crate::app::ports::{Clock, DiagnosticSink, ErrorSink, RelayTransport};
use crate::config::SystemConfig;
use crate::error::RelayFault;
use crate::pins::{MAX_RELAYS, RELAY_POWER};
use protocol::LineAssembler;

/// Sleep between receive polls while waiting for an acknowledgment.
const ACK_POLL_US: u32 = 500;

/// Command capability handed to the sequence controller and the safety
/// interlock. They never see the relay table itself.
pub trait RelayPort {
    /// Command relay `relay` (1..=9). `manual` marks operator-initiated
    /// commands, which bypass the safety lockout.
    fn set_relay(&mut self, relay: u8, on: bool, manual: bool) -> Result<(), RelayFault>;

    /// Last acknowledged state of `relay`.
    fn relay_state(&self, relay: u8) -> bool;

    /// Command every functional relay (1..=8) off. The power relay is
    /// untouched. Every relay is attempted; the first failure is returned.
    fn all_relays_off(&mut self) -> Result<(), RelayFault> {
        let mut result = Ok(());
        for relay in 1..RELAY_POWER {
            if let Err(e) = self.set_relay(relay, false, false) {
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }

    /// Engage the lockout and force all functional relays off.
    fn enable_safety(&mut self) -> Result<(), RelayFault>;

    /// Release the lockout. Nothing is re-energised.
    fn disable_safety(&mut self);

    fn safety_active(&self) -> bool;
}

/// Acknowledgment timing, taken from [`SystemConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayTiming {
    pub response_timeout_ms: u32,
    pub max_retries: u8,
    pub power_settle_ms: u32,
}

impl From<&SystemConfig> for RelayTiming {
    fn from(c: &SystemConfig) -> Self {
        Self {
            response_timeout_ms: c.relay_response_timeout_ms,
            max_retries: c.relay_max_retries,
            power_settle_ms: c.relay_power_settle_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct RelayChannel {
    commanded: bool,
    last_command_ms: u64,
}

/// Owner of the relay table and the serial link to the board.
pub struct RelayController<T, C, S> {
    transport: T,
    clock: C,
    sink: S,
    timing: RelayTiming,
    channels: [RelayChannel; MAX_RELAYS as usize],
    safety_active: bool,
    board_powered: bool,
    rx: LineAssembler,
}

impl<T, C, S> RelayController<T, C, S>
where
    T: RelayTransport,
    C: Clock + DelayNs,
    S: ErrorSink + DiagnosticSink,
{
    pub fn new(transport: T, clock: C, sink: S, timing: RelayTiming) -> Self {
        Self {
            transport,
            clock,
            sink,
            timing,
            channels: [RelayChannel::default(); MAX_RELAYS as usize],
            safety_active: false,
            board_powered: false,
            rx: LineAssembler::new(),
        }
    }

    /// Power the board at start-up.
    pub fn begin(&mut self) -> Result<(), RelayFault> {
        self.power_on()?;
        info!("relay board ready ({} channels)", MAX_RELAYS);
        Ok(())
    }

    /// `R9 OFF` then wait for the board supply to settle.
    pub fn power_on(&mut self) -> Result<(), RelayFault> {
        self.transact(RELAY_POWER, false)?;
        self.board_powered = true;
        self.clock.delay_ms(self.timing.power_settle_ms);
        Ok(())
    }

    /// Functional relays off, then `R9 ON` to cut board power.
    pub fn power_off(&mut self) -> Result<(), RelayFault> {
        let off = self.all_relays_off();
        self.transact(RELAY_POWER, true)?;
        self.board_powered = false;
        off
    }

    pub fn board_powered(&self) -> bool {
        self.board_powered
    }

    pub fn set_timing(&mut self, timing: RelayTiming) {
        self.timing = timing;
    }

    pub fn timing(&self) -> RelayTiming {
        self.timing
    }

    /// Time of the last acknowledged command on `relay`.
    pub fn last_command_ms(&self, relay: u8) -> Option<u64> {
        Self::index(relay).map(|i| self.channels[i].last_command_ms)
    }

    /// Drain unsolicited board output into the diagnostic sink.
    pub fn poll_echo(&mut self) {
        while let Some(byte) = self.transport.read_byte() {
            if let Some(line) = self.rx.push(byte) {
                if !line.is_empty() {
                    debug!("relay echo: {line}");
                    self.sink.echo_line(line);
                }
            }
        }
    }

    /// `relays: R1=ON R2=OFF ... safety=ACTIVE|OFF`
    pub fn status_line(&self) -> heapless::String<128> {
        let mut s = heapless::String::new();
        let _ = s.push_str("relays:");
        for (i, ch) in self.channels.iter().enumerate() {
            let _ = write!(s, " R{}={}", i + 1, if ch.commanded { "ON" } else { "OFF" });
        }
        let _ = write!(
            s,
            " safety={}",
            if self.safety_active { "ACTIVE" } else { "OFF" }
        );
        s
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    fn index(relay: u8) -> Option<usize> {
        (1..=MAX_RELAYS)
            .contains(&relay)
            .then(|| usize::from(relay - 1))
    }

    /// Send one command and commit it on acknowledgment, retrying per
    /// [`RelayTiming`]. The hardware fault is reported once, after the
    /// last attempt.
    fn transact(&mut self, relay: u8, on: bool) -> Result<(), RelayFault> {
        let Some(idx) = Self::index(relay) else {
            return Err(RelayFault::InvalidChannel);
        };
        let frame = protocol::encode(relay, on);
        let attempts = 1 + u32::from(self.timing.max_retries);

        for attempt in 1..=attempts {
            // Stale chatter must not satisfy this command's wait.
            self.poll_echo();
            self.rx.clear();

            debug!("relay tx (attempt {attempt}/{attempts}): {}", frame.trim_end());
            if let Err(e) = self.transport.write_line(&frame) {
                warn!("R{relay}: {e} (attempt {attempt}/{attempts})");
                continue;
            }

            if self.await_ack() {
                let ch = &mut self.channels[idx];
                ch.commanded = on;
                ch.last_command_ms = self.clock.now_ms();
                return Ok(());
            }
            warn!(
                "R{relay}: no ack within {} ms (attempt {attempt}/{attempts})",
                self.timing.response_timeout_ms
            );
        }

        log::error!("R{relay} {}: relay board not responding", if on { "ON" } else { "OFF" });
        self.sink.hardware_fault(relay, RelayFault::Timeout);
        Err(RelayFault::Timeout)
    }

    /// Poll the transport until an `OK` line arrives or the response
    /// timeout elapses. Non-ack lines go to the diagnostic sink.
    fn await_ack(&mut self) -> bool {
        let deadline = self
            .clock
            .now_ms()
            .saturating_add(u64::from(self.timing.response_timeout_ms));

        loop {
            while let Some(byte) = self.transport.read_byte() {
                if let Some(line) = self.rx.push(byte) {
                    if protocol::is_ack(line) {
                        return true;
                    }
                    if !line.is_empty() {
                        self.sink.echo_line(line);
                    }
                }
            }
            if self.clock.now_ms() >= deadline {
                return false;
            }
            self.clock.delay_us(ACK_POLL_US);
        }
    }

    fn ensure_power(&mut self) -> Result<(), RelayFault> {
        if self.board_powered {
            return Ok(());
        }
        info!("relay board unpowered, sending power-on");
        self.power_on()
    }
}

impl<T, C, S> RelayPort for RelayController<T, C, S>
where
    T: RelayTransport,
    C: Clock + DelayNs,
    S: ErrorSink + DiagnosticSink,
{
    fn set_relay(&mut self, relay: u8, on: bool, manual: bool) -> Result<(), RelayFault> {
        let Some(idx) = Self::index(relay) else {
            debug_assert!(false, "relay number {relay} out of range");
            return Err(RelayFault::InvalidChannel);
        };

        if self.channels[idx].commanded == on {
            return Ok(());
        }

        if self.safety_active && on && relay != RELAY_POWER && !manual {
            debug!("safety lockout: R{relay} ON blocked");
            return Err(RelayFault::Blocked);
        }
        if self.safety_active && manual {
            info!("manual override during safety: R{relay} {}", if on { "ON" } else { "OFF" });
        }

        if relay == RELAY_POWER {
            self.transact(relay, on)?;
            self.board_powered = !on;
            return Ok(());
        }

        self.ensure_power()?;
        self.transact(relay, on)?;
        debug!(
            "R{relay} -> {} ({})",
            if on { "ON" } else { "OFF" },
            if manual { "manual" } else { "auto" }
        );
        Ok(())
    }

    fn relay_state(&self, relay: u8) -> bool {
        Self::index(relay).is_some_and(|i| self.channels[i].commanded)
    }

    fn enable_safety(&mut self) -> Result<(), RelayFault> {
        self.safety_active = true;
        self.all_relays_off()
    }

    fn disable_safety(&mut self) {
        self.safety_active = false;
    }

    fn safety_active(&self) -> bool {
        self.safety_active
    }
}
