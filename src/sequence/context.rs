//! Mutable sequence state owned by the [`SequenceController`](super::SequenceController).

use super::states::SequenceState;
use crate::config::SystemConfig;
use crate::inputs::InputStates;

/// Timing and limit thresholds, loaded from configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SequenceTiming {
    /// Limit condition must hold this long before the stage advances.
    pub stable_ms: u32,
    /// Start pair must be held this long before the cylinder moves.
    pub start_stable_ms: u32,
    /// Maximum time in any one state.
    pub timeout_ms: u32,
    pub extend_limit_psi: f32,
    pub retract_limit_psi: f32,
}

impl From<&SystemConfig> for SequenceTiming {
    fn from(c: &SystemConfig) -> Self {
        Self {
            stable_ms: c.sequence_stable_ms,
            start_stable_ms: c.sequence_start_stable_ms,
            timeout_ms: c.sequence_timeout_ms,
            extend_limit_psi: c.extend_pressure_limit_psi,
            retract_limit_psi: c.retract_pressure_limit_psi,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SequenceContext {
    pub state: SequenceState,
    /// Time the current state was entered. Toggling between a stage and
    /// its wait-limit state does not move it.
    pub state_entry_ms: u64,
    /// Start of the current limit-stability run, `None` when not timing.
    pub limit_stable_since: Option<u64>,
    pub timing: SequenceTiming,
    /// Stable inputs captured when the current stage was entered.
    pub inputs_at_stage_entry: InputStates,
}

impl SequenceContext {
    pub fn new(timing: SequenceTiming) -> Self {
        Self {
            state: SequenceState::Idle,
            state_entry_ms: 0,
            limit_stable_since: None,
            timing,
            inputs_at_stage_entry: InputStates::default(),
        }
    }

    /// Time spent in the current state.
    pub fn elapsed_ms(&self, now_ms: u64) -> u64 {
        if self.state.is_active() {
            now_ms.saturating_sub(self.state_entry_ms)
        } else {
            0
        }
    }

    pub(super) fn enter(&mut self, state: SequenceState, now_ms: u64) {
        self.state = state;
        self.state_entry_ms = now_ms;
        self.limit_stable_since = None;
    }

    pub(super) fn clear(&mut self) {
        self.enter(SequenceState::Idle, 0);
        self.inputs_at_stage_entry = InputStates::default();
    }
}
