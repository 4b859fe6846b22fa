//! Two-stage extend/retract sequence controller.
//!
//! Input change events arrive first (start interlock, abort presses), then
//! [`update`](SequenceController::update) runs once per control tick with
//! the stable input bitmap and the current pressure reading. Relays are
//! only ever commanded through a [`RelayPort`].
//!
//! ## Limit detection
//!
//! A stage's limit condition is `limit switch active || pressure >= limit`.
//! Both are evaluated every tick; either one starts the stability timer.
//! The condition must then hold for `stable_ms` without a single dropout.
//!
//! ## Exits to IDLE
//!
//! Every path back to IDLE goes through [`abort`](SequenceController::abort)
//! or the completion handler, and both command extend and retract OFF
//! before the state is cleared. A relay failure is logged but never keeps
//! the controller out of IDLE.

pub mod context;
pub mod states;

use core::fmt::Write as _;

use log::{info, warn};

use crate::app::events::{self, AppEvent, SequenceEvent};
use crate::app::ports::EventSink;
use crate::error::RelayFault;
use crate::inputs::{ChangeEvent, InputStates};
use crate::pins::{self, RELAY_EXTEND, RELAY_RETRACT};
use crate::relay::RelayPort;
pub use context::{SequenceContext, SequenceTiming};
pub use states::SequenceState;

pub struct SequenceController {
    ctx: SequenceContext,
}

impl SequenceController {
    pub fn new(timing: SequenceTiming) -> Self {
        Self {
            ctx: SequenceContext::new(timing),
        }
    }

    // ── Event path ────────────────────────────────────────────────

    /// Feed one debounced input transition.
    pub fn on_input_change(
        &mut self,
        ev: &ChangeEvent,
        now_ms: u64,
        relays: &mut impl RelayPort,
        events: &mut impl EventSink,
    ) {
        let start_held = ev.all.start_interlock();

        match self.ctx.state {
            SequenceState::Idle => {
                // Edge-triggered: the pair completing is what arms a start,
                // so a held pair does not restart after completion.
                if start_held && ev.active && pins::START_PAIR.contains(&ev.channel) {
                    info!("sequence: start interlock engaged, debouncing");
                    self.ctx.enter(SequenceState::WaitStartDebounce, now_ms);
                }
            }

            SequenceState::WaitStartDebounce => {
                if !start_held {
                    self.abort("released_during_debounce", relays, events);
                }
            }

            SequenceState::Stage1Active
            | SequenceState::Stage1WaitLimit
            | SequenceState::Stage2Active
            | SequenceState::Stage2WaitLimit => {
                // Once running, the start pair may be let go.
                let new_press = ev.active
                    && pins::ABORT_BUTTONS.contains(&ev.channel)
                    && !self.ctx.inputs_at_stage_entry.get(ev.channel);
                if new_press {
                    self.abort("new_press", relays, events);
                }
            }
        }
    }

    // ── Tick path ─────────────────────────────────────────────────

    /// Advance timers and evaluate limit conditions. Call once per tick,
    /// after every change event for the tick has been delivered.
    pub fn update(
        &mut self,
        now_ms: u64,
        inputs: InputStates,
        pressure_psi: f32,
        relays: &mut impl RelayPort,
        events: &mut impl EventSink,
    ) {
        let state = self.ctx.state;
        if !state.is_active() {
            return;
        }

        let in_state = now_ms.saturating_sub(self.ctx.state_entry_ms);
        if in_state > u64::from(self.ctx.timing.timeout_ms) {
            warn!("sequence: {state} exceeded {} ms", self.ctx.timing.timeout_ms);
            self.abort("timeout", relays, events);
            return;
        }

        match state {
            SequenceState::Idle => {}

            SequenceState::WaitStartDebounce => {
                if !inputs.start_interlock() {
                    self.abort("released_during_debounce", relays, events);
                } else if in_state >= u64::from(self.ctx.timing.start_stable_ms) {
                    self.enter_stage1(now_ms, inputs, relays, events);
                }
            }

            SequenceState::Stage1Active | SequenceState::Stage1WaitLimit => {
                let reached = inputs.get(pins::INPUT_LIMIT_EXTEND)
                    || pressure_psi >= self.ctx.timing.extend_limit_psi;
                if self.limit_stable(reached, now_ms, SequenceState::Stage1Active) {
                    self.enter_stage2(now_ms, inputs, relays, events);
                }
            }

            SequenceState::Stage2Active | SequenceState::Stage2WaitLimit => {
                let reached = inputs.get(pins::INPUT_LIMIT_RETRACT)
                    || pressure_psi >= self.ctx.timing.retract_limit_psi;
                if self.limit_stable(reached, now_ms, SequenceState::Stage2Active) {
                    self.complete(relays, events);
                }
            }
        }
    }

    // ── Cancellation ──────────────────────────────────────────────

    /// Stop the cylinder and return to IDLE. Idempotent.
    pub fn abort(&mut self, reason: &str, relays: &mut impl RelayPort, events: &mut impl EventSink) {
        let was = self.ctx.state;

        for relay in [RELAY_EXTEND, RELAY_RETRACT] {
            if let Err(e) = relays.set_relay(relay, false, false) {
                warn!("sequence abort: R{relay} OFF failed: {e}");
            }
        }
        self.ctx.clear();

        if was.is_active() {
            warn!("sequence aborted in {was}: {reason}");
            events.emit(&AppEvent::Sequence(SequenceEvent::Aborted(events::reason(
                reason,
            ))));
        }
    }

    /// Operator reset.
    pub fn reset(&mut self, relays: &mut impl RelayPort, events: &mut impl EventSink) {
        self.abort("manual_reset", relays, events);
    }

    // ── Accessors ─────────────────────────────────────────────────

    pub fn state(&self) -> SequenceState {
        self.ctx.state
    }

    pub fn is_active(&self) -> bool {
        self.ctx.state.is_active()
    }

    pub fn stage(&self) -> u8 {
        self.ctx.state.stage()
    }

    pub fn elapsed_ms(&self, now_ms: u64) -> u64 {
        self.ctx.elapsed_ms(now_ms)
    }

    pub fn context(&self) -> &SequenceContext {
        &self.ctx
    }

    pub fn timing(&self) -> SequenceTiming {
        self.ctx.timing
    }

    /// Replace all timing values. A running sequence picks them up on the
    /// next tick.
    pub fn set_timing(&mut self, timing: SequenceTiming) {
        self.ctx.timing = timing;
    }

    pub fn set_stable_ms(&mut self, ms: u32) {
        self.ctx.timing.stable_ms = ms;
    }

    pub fn set_start_stable_ms(&mut self, ms: u32) {
        self.ctx.timing.start_stable_ms = ms;
    }

    pub fn set_timeout_ms(&mut self, ms: u32) {
        self.ctx.timing.timeout_ms = ms;
    }

    /// `stage=<n> active=<0|1> elapsed=<ms> stableMs=.. startStableMs=.. timeoutMs=..`
    pub fn status_line(&self, now_ms: u64) -> heapless::String<128> {
        let t = &self.ctx.timing;
        let mut s = heapless::String::new();
        let _ = write!(
            s,
            "stage={} active={} elapsed={} stableMs={} startStableMs={} timeoutMs={}",
            self.stage(),
            u8::from(self.is_active()),
            self.elapsed_ms(now_ms),
            t.stable_ms,
            t.start_stable_ms,
            t.timeout_ms,
        );
        s
    }

    // ── Internal ──────────────────────────────────────────────────

    /// Track the limit condition for the stage whose drive state is
    /// `active`. Returns true once it has held for `stable_ms`.
    fn limit_stable(&mut self, reached: bool, now_ms: u64, active: SequenceState) -> bool {
        let waiting = match active {
            SequenceState::Stage1Active => SequenceState::Stage1WaitLimit,
            _ => SequenceState::Stage2WaitLimit,
        };

        if !reached {
            if self.ctx.state == waiting {
                self.ctx.state = active;
                self.ctx.limit_stable_since = None;
            }
            return false;
        }

        let since = *self.ctx.limit_stable_since.get_or_insert(now_ms);
        self.ctx.state = waiting;
        now_ms.saturating_sub(since) >= u64::from(self.ctx.timing.stable_ms)
    }

    fn enter_stage1(
        &mut self,
        now_ms: u64,
        inputs: InputStates,
        relays: &mut impl RelayPort,
        events: &mut impl EventSink,
    ) {
        self.ctx.enter(SequenceState::Stage1Active, now_ms);
        self.ctx.inputs_at_stage_entry = inputs;

        if let Err(e) = Self::drive(relays, true, false) {
            self.abort(relay_reason(e), relays, events);
            return;
        }
        info!("sequence: stage 1 (extend)");
        events.emit(&AppEvent::Sequence(SequenceEvent::StartedR1));
    }

    fn enter_stage2(
        &mut self,
        now_ms: u64,
        inputs: InputStates,
        relays: &mut impl RelayPort,
        events: &mut impl EventSink,
    ) {
        self.ctx.enter(SequenceState::Stage2Active, now_ms);
        self.ctx.inputs_at_stage_entry = inputs;

        if let Err(e) = Self::drive(relays, false, true) {
            self.abort(relay_reason(e), relays, events);
            return;
        }
        info!("sequence: stage 2 (retract)");
        events.emit(&AppEvent::Sequence(SequenceEvent::SwitchedToR2));
    }

    fn complete(&mut self, relays: &mut impl RelayPort, events: &mut impl EventSink) {
        for relay in [RELAY_RETRACT, RELAY_EXTEND] {
            if let Err(e) = relays.set_relay(relay, false, false) {
                warn!("sequence complete: R{relay} OFF failed: {e}");
            }
        }
        self.ctx.clear();
        info!("sequence: complete");
        events.emit(&AppEvent::Sequence(SequenceEvent::Complete));
    }

    /// Command the drive pair, OFF side first so both are never on together.
    fn drive(relays: &mut impl RelayPort, extend: bool, retract: bool) -> Result<(), RelayFault> {
        if extend {
            relays.set_relay(RELAY_RETRACT, retract, false)?;
            relays.set_relay(RELAY_EXTEND, extend, false)
        } else {
            relays.set_relay(RELAY_EXTEND, extend, false)?;
            relays.set_relay(RELAY_RETRACT, retract, false)
        }
    }
}

const fn relay_reason(fault: RelayFault) -> &'static str {
    match fault {
        RelayFault::InvalidChannel => "relay_invalid_channel",
        RelayFault::Blocked => "relay_blocked",
        RelayFault::Timeout => "relay_timeout",
    }
}
