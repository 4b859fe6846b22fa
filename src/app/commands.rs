//! Inbound commands to the controller.
//!
//! These represent actions requested by the outside world (operator panel,
//! serial console, remote dispatcher) that the
//! [`Controller`](super::service::Controller) interprets and acts upon.

use crate::config::SystemConfig;
use crate::relay::protocol;

/// Commands that external adapters can send into the controller core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    /// Operator relay command. Always manual: bypasses the safety lockout.
    Relay { relay: u8, on: bool },

    /// Stop a running sequence (`manual_abort`).
    AbortSequence,

    /// Reset the sequence to IDLE (`manual_reset`).
    ResetSequence,

    /// Operator emergency stop.
    EmergencyStop,

    /// Release the safety interlock.
    ClearSafety,

    /// Reset after an emergency stop.
    ClearEmergencyStop,

    /// Drive the engine-stop line directly.
    EngineStop(bool),

    /// Acknowledge every active system error.
    AcknowledgeErrors,

    /// Hot-reload configuration. Rejected unless it validates.
    UpdateConfig(SystemConfig),
}

impl AppCommand {
    /// Parse an operator relay command line (`R<n> ON|OFF`).
    pub fn parse_relay(text: &str) -> Option<Self> {
        protocol::parse_command(text).map(|(relay, on)| Self::Relay { relay, on })
    }
}
