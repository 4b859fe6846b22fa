//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART / USB-CDC in production).
//! A mesh or MQTT publisher would implement the same trait.

use log::{error, info, warn};

use crate::app::events::{AppEvent, SequenceEvent};
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Telemetry(t) => match serde_json::to_string(t) {
                Ok(json) => info!("TELEM | {}", json),
                Err(e) => warn!("TELEM | encode failed: {}", e),
            },
            AppEvent::Sequence(SequenceEvent::Aborted(reason)) => {
                warn!("SEQ | aborted_{}", reason);
            }
            AppEvent::Sequence(ev) => {
                info!("SEQ | {}", ev);
            }
            AppEvent::SequenceStatus {
                stage,
                active,
                elapsed_ms,
            } => {
                info!(
                    "SEQ | stage={} active={} elapsed={}ms",
                    stage, active, elapsed_ms
                );
            }
            AppEvent::InputChanged { channel, active } => {
                info!(
                    "INPUT | pin {} {}",
                    channel,
                    if *active { "ACTIVE" } else { "INACTIVE" }
                );
            }
            AppEvent::SafetyActivated {
                reason,
                pressure_psi,
            } => {
                error!(
                    "SAFETY | ACTIVATED reason={} pressure={:.1}psi",
                    reason, pressure_psi
                );
            }
            AppEvent::SafetyCleared { reason } => {
                info!("SAFETY | cleared reason={}", reason);
            }
            AppEvent::EngineStop { stopped } => {
                if *stopped {
                    warn!("ENGINE | STOPPED");
                } else {
                    info!("ENGINE | running");
                }
            }
            AppEvent::RelayFault { relay, fault } => {
                error!("RELAY | R{} fault: {}", relay, fault);
            }
            AppEvent::Started => {
                info!("START | controller ready");
            }
        }
    }
}
