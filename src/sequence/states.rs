//! Sequence state identifiers.
//!
//! ```text
//!  IDLE ──[start pair held]──▶ WAIT_START_DEBOUNCE ──[released]──▶ IDLE
//!    ▲                                  │
//!    │                        [held start_stable_ms]
//!    │                                  ▼
//!    │          STAGE1_ACTIVE ◀──[drops]── STAGE1_WAIT_LIMIT
//!    │               └──[extend limit / pressure]──▲   │
//!    │                                  [stable_ms]    │
//!    │                                                 ▼
//!    │          STAGE2_ACTIVE ◀──[drops]── STAGE2_WAIT_LIMIT
//!    │               └──[retract limit / pressure]─▲   │
//!    └────────────────────────────[stable_ms: complete]┘
//!
//!  Any non-IDLE ──[timeout | new press | abort]──▶ IDLE
//! ```

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SequenceState {
    #[default]
    Idle,
    WaitStartDebounce,
    Stage1Active,
    Stage1WaitLimit,
    Stage2Active,
    Stage2WaitLimit,
}

impl SequenceState {
    /// Drive stage: 1 = extend, 2 = retract, 0 otherwise.
    pub const fn stage(self) -> u8 {
        match self {
            Self::Stage1Active | Self::Stage1WaitLimit => 1,
            Self::Stage2Active | Self::Stage2WaitLimit => 2,
            Self::Idle | Self::WaitStartDebounce => 0,
        }
    }

    pub const fn is_active(self) -> bool {
        !matches!(self, Self::Idle)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::WaitStartDebounce => "WAIT_START_DEBOUNCE",
            Self::Stage1Active => "STAGE1_ACTIVE",
            Self::Stage1WaitLimit => "STAGE1_WAIT_LIMIT",
            Self::Stage2Active => "STAGE2_ACTIVE",
            Self::Stage2WaitLimit => "STAGE2_WAIT_LIMIT",
        }
    }
}

impl fmt::Display for SequenceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
