//! Controller: the hexagonal core.
//!
//! [`Controller`] owns the debouncer, sequence controller, safety interlock
//! and relay controller. Every component gets narrow `&mut` access to the
//! others only for the duration of a call, so there is one owner for each
//! piece of state and no globals.
//!
//! ```text
//!   InputPort ──▶ ┌──────────────────────────────────┐ ──▶ EventSink
//!                 │            Controller             │
//! PressurePort ──▶│ Debounce · Sequence · Safety      │
//!                 │            · Relays ──────────────│──▶ RelayTransport
//!                 └──────────────────────────────────┘
//! ```
//!
//! ## Tick order
//!
//! 1. Sample and debounce every watched channel.
//! 2. Read pressure.
//! 3. Deliver change events to the sequence, then `sequence.update`.
//! 4. `safety.update`, after the sequence so a trip always wins.
//! 5. Drain the relay board echo.
//! 6. Publish queued relay faults and periodic status.

use core::fmt::Write as _;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use log::{info, warn};

use crate::config::SystemConfig;
use crate::diagnostics::{Diagnostics, RuntimeMetrics, SystemError};
use crate::error::{Error, RelayFault};
use crate::inputs::{ChangeEvent, Debouncer};
use crate::pins::{MAX_RELAYS, WATCH_CHANNELS, WATCH_COUNT};
use crate::relay::{RelayController, RelayPort, RelayTiming};
use crate::safety::SafetyInterlock;
use crate::sequence::{SequenceController, SequenceTiming};

use super::commands::AppCommand;
use super::events::{AppEvent, TelemetryData};
use super::ports::{Clock, ConfigError, ConfigPort, EventSink, InputPort, PressurePort, RelayTransport};

/// Quiet period after the last runtime config change before auto-save.
const AUTO_SAVE_DELAY_MS: u64 = 5_000;

/// Load the stored configuration, falling back to defaults.
///
/// Returns the system error to raise when the fallback was taken.
pub fn load_config(port: &impl ConfigPort) -> (SystemConfig, Option<SystemError>) {
    match port.load() {
        Ok(config) => (config, None),
        Err(ConfigError::NotFound) => {
            info!("no stored config, using defaults");
            (SystemConfig::default(), Some(SystemError::ConfigMissing))
        }
        Err(e) => {
            warn!("stored config rejected ({e}), using defaults");
            (SystemConfig::default(), Some(SystemError::ConfigCorrupted))
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Controller
// ───────────────────────────────────────────────────────────────

/// Top-level owner of all control state.
pub struct Controller<T, C, P> {
    config: SystemConfig,
    debouncer: Debouncer,
    sequence: SequenceController,
    safety: SafetyInterlock<P>,
    relays: RelayController<T, C, Diagnostics>,
    /// Last finite pressure reading.
    pressure_psi: f32,
    tick_count: u64,
    started_ms: u64,
    last_status_ms: u64,
    config_dirty: bool,
    dirty_since_ms: u64,
}

impl<T, C, P> Controller<T, C, P>
where
    T: RelayTransport,
    C: Clock + DelayNs,
    P: OutputPin,
{
    /// Construct the controller. Nothing is driven until [`start`](Self::start).
    pub fn new(config: SystemConfig, transport: T, clock: C, engine_stop: P) -> Self {
        let relays = RelayController::new(
            transport,
            clock,
            Diagnostics::new(),
            RelayTiming::from(&config),
        );
        Self {
            debouncer: Debouncer::new(&config),
            sequence: SequenceController::new(SequenceTiming::from(&config)),
            safety: SafetyInterlock::new(&config, engine_stop),
            relays,
            config,
            pressure_psi: 0.0,
            tick_count: 0,
            started_ms: 0,
            last_status_ms: 0,
            config_dirty: false,
            dirty_since_ms: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Engine line to run, relay board powered, inputs primed from their
    /// current levels so nothing already closed at boot reads as a change.
    pub fn start(&mut self, hw: &mut impl InputPort, sink: &mut impl EventSink) {
        self.safety.begin();

        let now = self.now_ms();
        for &ch in &WATCH_CHANNELS {
            let level = hw.sample(ch);
            self.debouncer.prime(ch, level, now);
        }

        if let Err(e) = self.relays.begin() {
            warn!("relay board did not come up: {e}");
        }
        self.publish_relay_faults(sink);

        self.started_ms = now;
        self.last_status_ms = now;
        sink.emit(&AppEvent::Started);
        info!("controller started, inputs=0b{:06b}", self.debouncer.states().bits());
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one control cycle.
    ///
    /// The `hw` parameter satisfies **both** [`InputPort`] and
    /// [`PressurePort`]; one adapter owns the input peripherals.
    pub fn tick(&mut self, hw: &mut (impl InputPort + PressurePort), sink: &mut impl EventSink) {
        self.tick_count += 1;
        let now = self.now_ms();

        // 1. Debounce
        let mut changes: heapless::Vec<ChangeEvent, WATCH_COUNT> = heapless::Vec::new();
        for &ch in &WATCH_CHANNELS {
            let level = hw.sample(ch);
            if let Some(ev) = self.debouncer.poll(ch, level, now) {
                let _ = changes.push(ev);
            }
        }

        // 2. Pressure
        self.read_pressure(hw);
        let pressure = self.pressure_psi;

        // 3. Sequence
        for ev in &changes {
            sink.emit(&AppEvent::InputChanged {
                channel: ev.channel,
                active: ev.active,
            });
            self.sequence
                .on_input_change(ev, now, &mut self.relays, sink);
        }
        self.sequence
            .update(now, self.debouncer.states(), pressure, &mut self.relays, sink);

        // 4. Safety
        self.safety
            .update(pressure, &mut self.sequence, &mut self.relays, sink);

        // 5. Echo drain
        self.relays.poll_echo();

        // 6. Publish
        self.publish_relay_faults(sink);
        self.publish_status(now, sink);
    }

    // ── Command handling ──────────────────────────────────────

    /// Process an external command (operator panel, console, dispatcher).
    pub fn handle_command(&mut self, cmd: AppCommand, sink: &mut impl EventSink) -> Result<(), Error> {
        let result = match cmd {
            AppCommand::Relay { relay, on } => {
                if (1..=MAX_RELAYS).contains(&relay) {
                    self.relays
                        .set_relay(relay, on, true)
                        .map_err(Error::from)
                } else {
                    Err(RelayFault::InvalidChannel.into())
                }
            }
            AppCommand::AbortSequence => {
                self.sequence
                    .abort("manual_abort", &mut self.relays, sink);
                Ok(())
            }
            AppCommand::ResetSequence => {
                self.sequence.reset(&mut self.relays, sink);
                Ok(())
            }
            AppCommand::EmergencyStop => {
                self.safety
                    .activate("manual_estop", &mut self.sequence, &mut self.relays, sink);
                Ok(())
            }
            AppCommand::ClearSafety => {
                self.safety
                    .deactivate("manual_clear", &mut self.relays, sink);
                Ok(())
            }
            AppCommand::ClearEmergencyStop => {
                self.safety
                    .clear_emergency_stop(&mut self.relays, sink);
                Ok(())
            }
            AppCommand::EngineStop(stop) => {
                self.safety.set_engine_stop(stop, sink);
                Ok(())
            }
            AppCommand::AcknowledgeErrors => {
                self.relays.sink_mut().faults_mut().acknowledge_all();
                Ok(())
            }
            AppCommand::UpdateConfig(config) => self.apply_config(config),
        };

        self.publish_relay_faults(sink);
        result
    }

    /// Validate and apply a new configuration to every component.
    pub fn apply_config(&mut self, config: SystemConfig) -> Result<(), Error> {
        config.validate()?;

        self.debouncer.apply_config(&config);
        self.sequence.set_timing(SequenceTiming::from(&config));
        self.safety
            .set_thresholds(config.safety_threshold_psi, config.safety_hysteresis_psi);
        self.relays.set_timing(RelayTiming::from(&config));
        self.config = config;

        if !self.config_dirty {
            self.config_dirty = true;
            self.dirty_since_ms = self.now_ms();
        }
        info!("configuration updated at runtime");
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────

    /// Build a telemetry snapshot from the current state.
    pub fn build_telemetry(&self) -> TelemetryData {
        let now = self.now_ms();
        let mut relay_bits = 0u16;
        for relay in 1..=MAX_RELAYS {
            if self.relays.relay_state(relay) {
                relay_bits |= 1 << (relay - 1);
            }
        }
        TelemetryData {
            uptime_ms: now.saturating_sub(self.started_ms),
            stage: self.sequence.stage(),
            sequence_active: self.sequence.is_active(),
            elapsed_ms: self.sequence.elapsed_ms(now),
            pressure_psi: self.pressure_psi,
            safety_active: self.safety.is_active(),
            engine_stopped: self.safety.is_engine_stopped(),
            relay_bits,
            input_bits: self.debouncer.states().bits(),
            error_flags: self.relays.sink().faults().flags(),
        }
    }

    /// Sequence, safety and relay status lines joined with `" | "`.
    pub fn status_line(&self) -> heapless::String<384> {
        let mut s = heapless::String::new();
        let _ = write!(
            s,
            "{} | {} | {}",
            self.sequence.status_line(self.now_ms()),
            self.safety.status_line(),
            self.relays.status_line()
        );
        s
    }

    pub fn metrics(&self) -> RuntimeMetrics {
        RuntimeMetrics::collect(
            self.now_ms().saturating_sub(self.started_ms),
            self.tick_count,
            self.relays.sink(),
        )
    }

    pub fn now_ms(&self) -> u64 {
        self.relays.clock().now_ms()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    pub fn sequence(&self) -> &SequenceController {
        &self.sequence
    }

    pub fn safety(&self) -> &SafetyInterlock<P> {
        &self.safety
    }

    pub fn relays(&self) -> &RelayController<T, C, Diagnostics> {
        &self.relays
    }

    pub fn relays_mut(&mut self) -> &mut RelayController<T, C, Diagnostics> {
        &mut self.relays
    }

    pub fn debouncer(&self) -> &Debouncer {
        &self.debouncer
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        self.relays.sink()
    }

    pub fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        self.relays.sink_mut()
    }

    pub fn pressure_psi(&self) -> f32 {
        self.pressure_psi
    }

    // ── Config persistence ────────────────────────────────────

    /// Save once the config has been stable for five seconds.
    /// Returns `true` if the config was saved.
    pub fn auto_save_if_needed(&mut self, storage: &mut impl ConfigPort) -> bool {
        if !self.config_dirty {
            return false;
        }
        if self.now_ms().saturating_sub(self.dirty_since_ms) < AUTO_SAVE_DELAY_MS {
            return false;
        }
        self.save_config(storage)
    }

    /// Force-save if dirty (call before a controlled shutdown).
    pub fn force_save_if_dirty(&mut self, storage: &mut impl ConfigPort) {
        if self.config_dirty {
            self.save_config(storage);
        }
    }

    pub fn is_config_dirty(&self) -> bool {
        self.config_dirty
    }

    // ── Internal ──────────────────────────────────────────────

    fn save_config(&mut self, storage: &mut impl ConfigPort) -> bool {
        match storage.save(&self.config) {
            Ok(()) => {
                self.config_dirty = false;
                info!("config saved");
                true
            }
            Err(e) => {
                warn!("config save failed: {e}");
                false
            }
        }
    }

    /// Non-finite readings keep the last good value and raise
    /// [`SystemError::PressureSensor`] until a finite one arrives.
    fn read_pressure(&mut self, hw: &mut impl PressurePort) {
        let psi = hw.pressure_psi();
        let faults = self.relays.sink_mut().faults_mut();
        if psi.is_finite() {
            self.pressure_psi = psi;
            if faults.is_set(SystemError::PressureSensor) {
                faults.clear(SystemError::PressureSensor);
            }
        } else if !faults.is_set(SystemError::PressureSensor) {
            faults.set(SystemError::PressureSensor);
        }
    }

    fn publish_relay_faults(&mut self, sink: &mut impl EventSink) {
        while let Some((relay, fault)) = self.relays.sink_mut().take_relay_fault() {
            sink.emit(&AppEvent::RelayFault { relay, fault });
        }
    }

    fn publish_status(&mut self, now: u64, sink: &mut impl EventSink) {
        if !self.sequence.is_active() {
            return;
        }
        if now.saturating_sub(self.last_status_ms) < u64::from(self.config.status_interval_ms) {
            return;
        }
        self.last_status_ms = now;
        sink.emit(&AppEvent::SequenceStatus {
            stage: self.sequence.stage(),
            active: true,
            elapsed_ms: self.sequence.elapsed_ms(now),
        });
    }
}
