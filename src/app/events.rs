//! Outbound application events.
//!
//! The controller core emits these through the
//! [`EventSink`](super::ports::EventSink) port. Adapters on the other side
//! decide what to do with them: log to serial, publish to telemetry, or
//! record them in a test.

use core::fmt;

use serde::Serialize;

use crate::error::RelayFault;

/// Short diagnostic tag carried by aborts and safety events.
pub type Reason = heapless::String<32>;

/// Build a [`Reason`], truncating anything past its capacity.
pub fn reason(text: &str) -> Reason {
    let mut r = Reason::new();
    for ch in text.chars() {
        if r.push(ch).is_err() {
            break;
        }
    }
    r
}

/// Structured events emitted by the controller core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The controller finished start-up.
    Started,

    /// A watched input committed a new stable state.
    InputChanged { channel: u8, active: bool },

    /// Sequence milestone (`started_R1`, `switched_to_R2`, ...).
    Sequence(SequenceEvent),

    /// Periodic sequence status.
    SequenceStatus {
        stage: u8,
        active: bool,
        elapsed_ms: u64,
    },

    /// The safety interlock engaged.
    SafetyActivated { reason: Reason, pressure_psi: f32 },

    /// The safety interlock released.
    SafetyCleared { reason: Reason },

    /// The engine-stop line changed level.
    EngineStop { stopped: bool },

    /// A relay command failed after every retry.
    RelayFault { relay: u8, fault: RelayFault },

    /// Periodic telemetry snapshot.
    Telemetry(TelemetryData),
}

/// Sequence milestones, rendered as the telemetry event strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceEvent {
    StartedR1,
    SwitchedToR2,
    Complete,
    Aborted(Reason),
}

impl fmt::Display for SequenceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StartedR1 => f.write_str("started_R1"),
            Self::SwitchedToR2 => f.write_str("switched_to_R2"),
            Self::Complete => f.write_str("complete"),
            Self::Aborted(reason) => write!(f, "aborted_{reason}"),
        }
    }
}

/// A point-in-time telemetry snapshot suitable for logging or transmission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryData {
    pub uptime_ms: u64,
    pub stage: u8,
    pub sequence_active: bool,
    pub elapsed_ms: u64,
    pub pressure_psi: f32,
    pub safety_active: bool,
    pub engine_stopped: bool,
    /// Bit `n-1` set = relay `n` commanded ON.
    pub relay_bits: u16,
    /// Stable input bitmap, see [`InputStates`](crate::inputs::InputStates).
    pub input_bits: u8,
    /// Active [`SystemError`](crate::diagnostics::SystemError) flags.
    pub error_flags: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_events_render_as_topic_strings() {
        assert_eq!(SequenceEvent::StartedR1.to_string(), "started_R1");
        assert_eq!(SequenceEvent::SwitchedToR2.to_string(), "switched_to_R2");
        assert_eq!(
            SequenceEvent::Aborted(reason("timeout")).to_string(),
            "aborted_timeout"
        );
    }

    #[test]
    fn long_reason_is_truncated() {
        let r = reason("a_reason_that_is_much_longer_than_thirty_two_bytes");
        assert_eq!(r.len(), 32);
    }
}
