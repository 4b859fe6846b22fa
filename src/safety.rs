//! Pressure safety interlock.
//!
//! The interlock runs **every tick after the sequence controller**, so a
//! pressure trip in the same tick as a sequence transition always wins.
//!
//! ## Hysteresis band
//!
//! ```text
//!   pressure ≥ T          → activate("pressure_threshold")
//!   pressure <  T − H     → deactivate
//!   T − H ≤ pressure < T  → no change
//! ```
//!
//! ## Activation
//!
//! 1. `active = true`, reason latched.
//! 2. A running sequence is aborted.
//! 3. Relay lockout engaged, functional relays forced OFF.
//! 4. Engine-stop line driven to its stop level.
//! 5. Alert published.
//!
//! Steps 2–4 run on every call, even when already active, so the outputs
//! are always re-asserted. Operator E-stops and resets go through the same
//! [`activate`](SafetyInterlock::activate) / [`deactivate`](SafetyInterlock::deactivate)
//! entry points as pressure trips.
//!
//! Only a pure pressure trip clears itself below the band. Any operator
//! activation latches until an explicit clear or E-stop reset.

use core::fmt::Write as _;

use embedded_hal::digital::OutputPin;
use log::{error, info, warn};

use crate::app::events::{self, AppEvent, Reason};
use crate::app::ports::EventSink;
use crate::config::SystemConfig;
use crate::relay::RelayPort;
use crate::sequence::SequenceController;

/// Reason latched by a pressure trip.
pub const PRESSURE_TRIP: &str = "pressure_threshold";

/// Interlock state.
#[derive(Debug, Clone, Default)]
pub struct SafetyContext {
    pub active: bool,
    /// Set by any non-pressure activation; pressure recovery cannot clear it.
    pub latched: bool,
    pub reason: Reason,
    pub last_pressure_psi: f32,
    pub engine_stopped: bool,
}

/// Pressure interlock driving the engine-stop line.
pub struct SafetyInterlock<P> {
    ctx: SafetyContext,
    threshold_psi: f32,
    hysteresis_psi: f32,
    engine_stop: P,
}

impl<P: OutputPin> SafetyInterlock<P> {
    pub fn new(config: &SystemConfig, engine_stop: P) -> Self {
        Self {
            ctx: SafetyContext::default(),
            threshold_psi: config.safety_threshold_psi,
            hysteresis_psi: config.safety_hysteresis_psi,
            engine_stop,
        }
    }

    /// Drive the engine-stop line to its run level.
    pub fn begin(&mut self) {
        if self.engine_stop.set_low().is_err() {
            error!("engine-stop line init failed");
        }
        self.ctx.engine_stopped = false;
        info!(
            "safety interlock armed: threshold {:.1} PSI, hysteresis {:.1} PSI",
            self.threshold_psi, self.hysteresis_psi
        );
    }

    pub fn set_thresholds(&mut self, threshold_psi: f32, hysteresis_psi: f32) {
        self.threshold_psi = threshold_psi;
        self.hysteresis_psi = hysteresis_psi;
    }

    /// Evaluate one pressure reading.
    pub fn update(
        &mut self,
        pressure_psi: f32,
        sequence: &mut SequenceController,
        relays: &mut impl RelayPort,
        events: &mut impl EventSink,
    ) {
        self.ctx.last_pressure_psi = pressure_psi;

        if pressure_psi >= self.threshold_psi {
            if !self.ctx.active {
                self.activate(PRESSURE_TRIP, sequence, relays, events);
            }
        } else if self.ctx.active
            && !self.ctx.latched
            && pressure_psi < self.threshold_psi - self.hysteresis_psi
        {
            info!("safety cleared: pressure {pressure_psi:.1} PSI below threshold");
            self.deactivate("pressure_normal", relays, events);
        }
    }

    /// Engage the interlock. Total: always leaves the sequence IDLE, the
    /// drive relays commanded OFF and the engine stopped.
    pub fn activate(
        &mut self,
        reason: &str,
        sequence: &mut SequenceController,
        relays: &mut impl RelayPort,
        events: &mut impl EventSink,
    ) {
        let newly = !self.ctx.active;
        self.ctx.active = true;
        if reason != PRESSURE_TRIP {
            self.ctx.latched = true;
        }
        if newly {
            self.ctx.reason = events::reason(reason);
            error!(
                "SAFETY ACTIVATED: {reason} (pressure={:.1} PSI)",
                self.ctx.last_pressure_psi
            );
        }

        if sequence.is_active() {
            sequence.abort(reason, relays, events);
        }
        if let Err(e) = relays.enable_safety() {
            warn!("safety: relay shutdown incomplete: {e}");
        }
        self.set_engine_stop(true, events);

        if newly {
            events.emit(&AppEvent::SafetyActivated {
                reason: self.ctx.reason.clone(),
                pressure_psi: self.ctx.last_pressure_psi,
            });
        }
    }

    /// Release the interlock and let the engine run again. Relays stay off.
    /// A no-op while inactive, so a manual engine stop survives it.
    pub fn deactivate(&mut self, reason: &str, relays: &mut impl RelayPort, events: &mut impl EventSink) {
        if !self.ctx.active {
            return;
        }
        self.ctx.active = false;
        self.ctx.latched = false;
        relays.disable_safety();
        self.set_engine_stop(false, events);

        info!("safety cleared: {reason}");
        self.ctx.reason.clear();
        events.emit(&AppEvent::SafetyCleared {
            reason: events::reason(reason),
        });
    }

    /// Operator reset after an emergency stop.
    pub fn clear_emergency_stop(&mut self, relays: &mut impl RelayPort, events: &mut impl EventSink) {
        if self.ctx.active {
            info!("emergency stop reset by operator");
            self.deactivate("estop_cleared", relays, events);
        }
    }

    /// Drive the engine-stop line. Publishes only on change.
    pub fn set_engine_stop(&mut self, stop: bool, events: &mut impl EventSink) {
        let result = if stop {
            self.engine_stop.set_high()
        } else {
            self.engine_stop.set_low()
        };
        if result.is_err() {
            error!("engine-stop line write failed");
        }

        if self.ctx.engine_stopped != stop {
            self.ctx.engine_stopped = stop;
            info!("engine {}", if stop { "STOPPED" } else { "RUNNING" });
            events.emit(&AppEvent::EngineStop { stopped: stop });
        }
    }

    pub fn is_active(&self) -> bool {
        self.ctx.active
    }

    pub fn is_engine_stopped(&self) -> bool {
        self.ctx.engine_stopped
    }

    pub fn context(&self) -> &SafetyContext {
        &self.ctx
    }

    pub fn engine_stop_pin(&self) -> &P {
        &self.engine_stop
    }

    /// `safety=ACTIVE|OK engine=STOPPED|RUNNING pressure=.. threshold=..`
    pub fn status_line(&self) -> heapless::String<96> {
        let mut s = heapless::String::new();
        let _ = write!(
            s,
            "safety={} engine={} pressure={:.1} threshold={:.1}",
            if self.ctx.active { "ACTIVE" } else { "OK" },
            if self.ctx.engine_stopped { "STOPPED" } else { "RUNNING" },
            self.ctx.last_pressure_psi,
            self.threshold_psi,
        );
        if self.ctx.active && !self.ctx.reason.is_empty() {
            let _ = write!(s, " reason={}", self.ctx.reason);
        }
        s
    }
}
