//! Unified error types for the log-splitter controller.
//!
//! A single `Error` enum that every subsystem can convert into, keeping the
//! top-level control loop's error handling uniform. All variants are `Copy`
//! so they can be passed through the sequence controller and safety
//! interlock without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level controller error
// ---------------------------------------------------------------------------

/// Every fallible operation in the controller funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A relay board command did not complete.
    Relay(RelayFault),
    /// The serial link to the relay board failed.
    Transport(TransportError),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
    /// Peripheral initialisation failed.
    Init(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Relay(e) => write!(f, "relay: {e}"),
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Relay command faults
// ---------------------------------------------------------------------------

/// Outcome of a rejected or failed `set_relay` call.
///
/// Only `Timeout` is a hardware fault. `Blocked` is the safety lockout doing
/// its job and is returned to the caller without being logged as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayFault {
    /// Relay number outside `1..=9`. Programming error.
    InvalidChannel,
    /// Automatic ON command vetoed while the safety lockout is engaged.
    Blocked,
    /// The board never acknowledged the command, retries included.
    Timeout,
}

impl RelayFault {
    /// Short lowercase tag for telemetry payloads.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidChannel => "invalid_channel",
            Self::Blocked => "blocked",
            Self::Timeout => "timeout",
        }
    }
}

impl fmt::Display for RelayFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidChannel => write!(f, "invalid relay channel"),
            Self::Blocked => write!(f, "blocked by safety lockout"),
            Self::Timeout => write!(f, "no acknowledgment from relay board"),
        }
    }
}

impl From<RelayFault> for Error {
    fn from(e: RelayFault) -> Self {
        Self::Relay(e)
    }
}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// The UART driver rejected or truncated the outbound frame.
    WriteFailed,
    /// The UART driver reported a receive error.
    ReadFailed,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WriteFailed => write!(f, "serial write failed"),
            Self::ReadFailed => write!(f, "serial read failed"),
        }
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Controller-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
