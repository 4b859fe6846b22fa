//! Controller pipeline: raw lines → debounce → sequence/safety → relay
//! frames, driven tick by tick on a simulated clock.

use logsplitter::adapters::nvs::NvsStorage;
use logsplitter::adapters::storage::StorageConfigAdapter;
use logsplitter::app::commands::AppCommand;
use logsplitter::app::events::{reason, AppEvent};
use logsplitter::app::ports::{ConfigError, ConfigPort};
use logsplitter::app::service::{load_config, Controller};
use logsplitter::config::SystemConfig;
use logsplitter::diagnostics::SystemError;
use logsplitter::error::{Error, RelayFault};
use logsplitter::pins::{
    INPUT_LIMIT_EXTEND, INPUT_LIMIT_RETRACT, INPUT_MANUAL_EXTEND, RELAY_EXTEND, RELAY_POWER,
    RELAY_RETRACT,
};
use logsplitter::relay::RelayPort;
use logsplitter::sequence::SequenceState;

use crate::mock_hw::{BoardMode, MockInputs, MockPin, RecordingSink, ScriptedBoard, SimClock};

const TICK_MS: u64 = 10;

struct Rig {
    ctl: Controller<ScriptedBoard, SimClock, MockPin>,
    clock: SimClock,
    hw: MockInputs,
    sink: RecordingSink,
}

fn rig_with(config: SystemConfig, mode: BoardMode) -> Rig {
    let clock = SimClock::new();
    let mut hw = MockInputs::idle(&config);
    let mut sink = RecordingSink::new();
    let mut ctl = Controller::new(
        config,
        ScriptedBoard::new(mode),
        clock.clone(),
        MockPin::default(),
    );
    ctl.start(&mut hw, &mut sink);
    Rig {
        ctl,
        clock,
        hw,
        sink,
    }
}

fn rig() -> Rig {
    rig_with(SystemConfig::default(), BoardMode::Ack)
}

impl Rig {
    fn run_ms(&mut self, ms: u64) {
        for _ in 0..ms / TICK_MS {
            self.clock.advance_ms(TICK_MS);
            self.ctl.tick(&mut self.hw, &mut self.sink);
        }
    }

    fn command(&mut self, cmd: AppCommand) -> Result<(), Error> {
        self.ctl.handle_command(cmd, &mut self.sink)
    }

    fn relay(&self, relay: u8) -> bool {
        self.ctl.relays().relay_state(relay)
    }

    fn board(&mut self) -> &mut ScriptedBoard {
        self.ctl.relays_mut().transport_mut()
    }

    /// Press both start buttons and run until stage 1 is driving.
    fn start_cycle(&mut self) {
        self.hw.press_start();
        self.run_ms(200);
        assert_eq!(self.ctl.sequence().state(), SequenceState::Stage1Active);
    }
}

// ── Start-up ──────────────────────────────────────────────────

#[test]
fn start_powers_board_and_runs_engine() {
    let mut r = rig();
    assert_eq!(r.board().written, ["R9 OFF\n"]);
    assert!(r.ctl.relays().board_powered());
    assert!(!r.ctl.safety().engine_stop_pin().high);
    assert_eq!(r.sink.events, [AppEvent::Started]);
}

#[test]
fn silent_board_at_boot_is_reported() {
    let r = rig_with(SystemConfig::default(), BoardMode::Silent);
    assert!(r.sink.events.contains(&AppEvent::RelayFault {
        relay: RELAY_POWER,
        fault: RelayFault::Timeout,
    }));
    assert!(r.ctl.diagnostics().faults().is_set(SystemError::HardwareFault));
    assert!(r.sink.events.ends_with(&[AppEvent::Started]));
}

// ── Full cycle ────────────────────────────────────────────────

#[test]
fn full_cycle_extend_retract_complete() {
    let mut r = rig();
    r.start_cycle();
    assert!(r.relay(RELAY_EXTEND));
    assert!(!r.relay(RELAY_RETRACT));

    r.hw.set_active(INPUT_LIMIT_EXTEND, true);
    r.run_ms(50);
    assert_eq!(r.ctl.sequence().state(), SequenceState::Stage2Active);
    assert!(!r.relay(RELAY_EXTEND));
    assert!(r.relay(RELAY_RETRACT));

    r.hw.set_active(INPUT_LIMIT_EXTEND, false);
    r.hw.set_active(INPUT_LIMIT_RETRACT, true);
    r.run_ms(50);
    assert_eq!(r.ctl.sequence().state(), SequenceState::Idle);
    assert!(!r.relay(RELAY_EXTEND));
    assert!(!r.relay(RELAY_RETRACT));

    assert_eq!(
        r.sink.sequence_events(),
        ["started_R1", "switched_to_R2", "complete"]
    );
    assert_eq!(
        r.board().frames_for(RELAY_EXTEND),
        ["R1 ON", "R1 OFF"]
    );
}

#[test]
fn held_start_pair_does_not_restart_after_completion() {
    let mut r = rig();
    r.start_cycle();
    r.hw.set_active(INPUT_LIMIT_EXTEND, true);
    r.run_ms(50);
    r.hw.set_active(INPUT_LIMIT_RETRACT, true);
    r.run_ms(50);
    assert_eq!(r.ctl.sequence().state(), SequenceState::Idle);

    r.run_ms(500);
    assert_eq!(r.ctl.sequence().state(), SequenceState::Idle);
}

#[test]
fn input_changes_are_published() {
    let mut r = rig();
    r.hw.press_start();
    r.run_ms(50);
    assert_eq!(
        r.sink.count(|e| matches!(e, AppEvent::InputChanged { active: true, .. })),
        2
    );
    assert_eq!(r.ctl.build_telemetry().input_bits, 0b0000_1010);
}

#[test]
fn short_start_press_never_extends() {
    let mut r = rig();
    r.hw.press_start();
    r.run_ms(60);
    r.hw.release_start();
    r.run_ms(300);
    assert!(r.board().frames_for(RELAY_EXTEND).is_empty());
    assert!(r.sink.aborted_with("released_during_debounce"));
}

#[test]
fn new_manual_press_aborts_running_stage() {
    let mut r = rig();
    r.start_cycle();
    r.hw.release_start();
    r.run_ms(100);
    assert_eq!(r.ctl.sequence().state(), SequenceState::Stage1Active);

    r.hw.set_active(INPUT_MANUAL_EXTEND, true);
    r.run_ms(50);
    assert_eq!(r.ctl.sequence().state(), SequenceState::Idle);
    assert!(!r.relay(RELAY_EXTEND));
    assert!(r.sink.aborted_with("new_press"));
}

#[test]
fn stage_without_limit_times_out() {
    let mut r = rig();
    r.start_cycle();
    r.run_ms(30_100);
    assert_eq!(r.ctl.sequence().state(), SequenceState::Idle);
    assert!(r.sink.aborted_with("timeout"));
    assert!(!r.relay(RELAY_EXTEND));
}

#[test]
fn status_is_published_while_running() {
    let mut r = rig();
    r.start_cycle();
    r.run_ms(2_000);
    assert!(r.sink.count(|e| matches!(
        e,
        AppEvent::SequenceStatus {
            stage: 1,
            active: true,
            ..
        }
    )) >= 1);
}

// ── Safety ────────────────────────────────────────────────────

#[test]
fn overpressure_trips_safety_mid_stage() {
    let mut r = rig();
    r.start_cycle();

    r.hw.pressure_psi = 2600.0;
    r.run_ms(TICK_MS);

    assert!(r.ctl.safety().is_active());
    assert_eq!(r.ctl.sequence().state(), SequenceState::Idle);
    assert!(!r.relay(RELAY_EXTEND));
    assert!(!r.relay(RELAY_RETRACT));
    assert!(r.ctl.safety().engine_stop_pin().high);
    assert!(r.sink.aborted_with("pressure_threshold"));
    assert_eq!(
        r.sink.count(|e| matches!(e, AppEvent::SafetyActivated { .. })),
        1
    );
}

#[test]
fn safety_clears_below_hysteresis_band() {
    let mut r = rig();
    r.hw.pressure_psi = 2500.0;
    r.run_ms(TICK_MS);
    assert!(r.ctl.safety().is_active());

    r.hw.pressure_psi = 2495.0;
    r.run_ms(100);
    assert!(r.ctl.safety().is_active());

    r.hw.pressure_psi = 2480.0;
    r.run_ms(TICK_MS);
    assert!(!r.ctl.safety().is_active());
    assert!(!r.ctl.safety().engine_stop_pin().high);
    assert!(r.sink.events.contains(&AppEvent::SafetyCleared {
        reason: reason("pressure_normal"),
    }));
}

#[test]
fn lockout_blocks_start_but_not_operator() {
    let mut r = rig();
    r.command(AppCommand::EmergencyStop).unwrap();
    assert!(r.ctl.safety().is_active());

    r.hw.press_start();
    r.run_ms(300);
    assert!(!r.relay(RELAY_EXTEND));
    assert!(r.sink.aborted_with("relay_blocked"));

    r.command(AppCommand::Relay {
        relay: RELAY_EXTEND,
        on: true,
    })
    .unwrap();
    assert!(r.relay(RELAY_EXTEND));
}

#[test]
fn emergency_stop_round_trip() {
    let mut r = rig();
    r.command(AppCommand::EmergencyStop).unwrap();
    assert_eq!(r.ctl.safety().context().reason.as_str(), "manual_estop");

    r.command(AppCommand::ClearEmergencyStop).unwrap();
    assert!(!r.ctl.safety().is_active());
    assert!(!r.ctl.safety().is_engine_stopped());
    assert_eq!(
        r.sink.events.last(),
        Some(&AppEvent::SafetyCleared {
            reason: reason("estop_cleared"),
        })
    );
}

#[test]
fn manual_engine_stop_command() {
    let mut r = rig();
    r.command(AppCommand::EngineStop(true)).unwrap();
    assert!(r.ctl.safety().engine_stop_pin().high);
    assert!(!r.ctl.safety().is_active());
    r.command(AppCommand::EngineStop(false)).unwrap();
    assert!(!r.ctl.safety().engine_stop_pin().high);
}

#[test]
fn safety_clears_do_not_restart_a_stopped_engine() {
    let mut r = rig();
    r.command(AppCommand::EngineStop(true)).unwrap();

    r.command(AppCommand::ClearEmergencyStop).unwrap();
    r.command(AppCommand::ClearSafety).unwrap();
    r.run_ms(TICK_MS);

    assert!(r.ctl.safety().is_engine_stopped());
    assert!(r.ctl.safety().engine_stop_pin().high);
    assert_eq!(
        r.sink.count(|e| matches!(e, AppEvent::SafetyCleared { .. })),
        0
    );
}

#[test]
fn emergency_stop_holds_at_zero_pressure() {
    let mut r = rig();
    r.hw.pressure_psi = 0.0;
    r.command(AppCommand::EmergencyStop).unwrap();

    r.run_ms(500);
    assert!(r.ctl.safety().is_active());
    assert!(r.ctl.safety().is_engine_stopped());
    assert!(r.ctl.relays().safety_active());

    r.command(AppCommand::ClearSafety).unwrap();
    r.run_ms(TICK_MS);
    assert!(!r.ctl.safety().is_active());
    assert!(!r.ctl.safety().is_engine_stopped());
}

// ── Relay commands and faults ─────────────────────────────────

#[test]
fn operator_relay_out_of_range_is_rejected() {
    let mut r = rig();
    let before = r.board().written.len();
    assert_eq!(
        r.command(AppCommand::Relay { relay: 12, on: true }),
        Err(Error::Relay(RelayFault::InvalidChannel))
    );
    assert_eq!(r.board().written.len(), before);
}

#[test]
fn unacknowledged_command_raises_hardware_fault() {
    let mut r = rig();
    r.board().mode = BoardMode::Silent;

    assert_eq!(
        r.command(AppCommand::Relay { relay: 3, on: true }),
        Err(Error::Relay(RelayFault::Timeout))
    );
    assert!(!r.relay(3));
    assert_eq!(r.board().frames_for(3).len(), 3);
    assert_eq!(
        r.sink.count(|e| matches!(e, AppEvent::RelayFault { relay: 3, .. })),
        1
    );
    assert_ne!(r.ctl.build_telemetry().error_flags & SystemError::HardwareFault.mask(), 0);

    r.command(AppCommand::AcknowledgeErrors).unwrap();
    assert!(!r.ctl.diagnostics().faults().has_unacknowledged());
}

#[test]
fn board_chatter_goes_to_diagnostics() {
    let mut r = rig();
    r.board().inject("relay board v2\r\n");
    r.run_ms(TICK_MS);
    assert_eq!(r.ctl.diagnostics().echo_lines(), 1);
    assert_eq!(r.ctl.diagnostics().last_echo(), "relay board v2");
}

// ── Pressure input ────────────────────────────────────────────

#[test]
fn non_finite_pressure_keeps_last_reading() {
    let mut r = rig();
    r.hw.pressure_psi = 1200.0;
    r.run_ms(TICK_MS);

    r.hw.pressure_psi = f32::NAN;
    r.run_ms(TICK_MS);
    assert_eq!(r.ctl.pressure_psi(), 1200.0);
    assert!(r.ctl.diagnostics().faults().is_set(SystemError::PressureSensor));
    assert!(!r.ctl.safety().is_active());

    r.hw.pressure_psi = 1300.0;
    r.run_ms(TICK_MS);
    assert_eq!(r.ctl.pressure_psi(), 1300.0);
    assert!(!r.ctl.diagnostics().faults().is_set(SystemError::PressureSensor));
}

// ── Configuration ─────────────────────────────────────────────

#[test]
fn invalid_config_update_is_rejected() {
    let mut r = rig();
    let cfg = SystemConfig {
        sequence_timeout_ms: 10,
        ..Default::default()
    };
    assert!(matches!(
        r.command(AppCommand::UpdateConfig(cfg)),
        Err(Error::Config(_))
    ));
    assert!(!r.ctl.is_config_dirty());
    assert_eq!(r.ctl.config().sequence_timeout_ms, 30_000);
}

#[test]
fn config_update_applies_and_auto_saves() {
    let mut r = rig();
    let mut store = StorageConfigAdapter::new(NvsStorage::new().unwrap());
    let cfg = SystemConfig {
        sequence_start_stable_ms: 250,
        safety_threshold_psi: 2750.0,
        ..Default::default()
    };
    r.command(AppCommand::UpdateConfig(cfg.clone())).unwrap();
    assert!(r.ctl.is_config_dirty());
    assert_eq!(r.ctl.sequence().timing().start_stable_ms, 250);

    // New threshold is live: 2600 no longer trips.
    r.hw.pressure_psi = 2600.0;
    r.run_ms(1_000);
    assert!(!r.ctl.safety().is_active());
    assert!(!r.ctl.auto_save_if_needed(&mut store));

    r.run_ms(4_100);
    assert!(r.ctl.auto_save_if_needed(&mut store));
    assert!(!r.ctl.is_config_dirty());
    assert_eq!(store.load().unwrap(), cfg);
}

struct BrokenStore;

impl ConfigPort for BrokenStore {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        Err(ConfigError::Corrupted)
    }

    fn save(&mut self, _config: &SystemConfig) -> Result<(), ConfigError> {
        Err(ConfigError::IoError)
    }
}

#[test]
fn load_config_falls_back_to_defaults() {
    let empty = StorageConfigAdapter::new(NvsStorage::new().unwrap());
    let (cfg, fault) = load_config(&empty);
    assert_eq!(cfg, SystemConfig::default());
    assert_eq!(fault, Some(SystemError::ConfigMissing));

    let (cfg, fault) = load_config(&BrokenStore);
    assert_eq!(cfg, SystemConfig::default());
    assert_eq!(fault, Some(SystemError::ConfigCorrupted));
}

#[test]
fn failed_save_stays_dirty() {
    let mut r = rig();
    r.command(AppCommand::UpdateConfig(SystemConfig {
        sequence_stable_ms: 30,
        ..Default::default()
    }))
    .unwrap();
    r.run_ms(6_000);
    assert!(!r.ctl.auto_save_if_needed(&mut BrokenStore));
    assert!(r.ctl.is_config_dirty());
}

// ── Reporting ─────────────────────────────────────────────────

#[test]
fn status_line_joins_components() {
    let r = rig();
    let line = r.ctl.status_line();
    assert!(line.starts_with("stage=0 active=0"), "{line}");
    assert!(line.contains(" | safety=OK engine=RUNNING"), "{line}");
    assert!(line.contains(" | relays: R1=OFF R2=OFF"), "{line}");
}

#[test]
fn abort_command_stops_cycle() {
    let mut r = rig();
    r.start_cycle();
    r.command(AppCommand::AbortSequence).unwrap();
    assert_eq!(r.ctl.sequence().state(), SequenceState::Idle);
    assert!(!r.relay(RELAY_EXTEND));
    assert!(r.sink.aborted_with("manual_abort"));

    // Idle abort publishes nothing new.
    let n = r.sink.events.len();
    r.command(AppCommand::ResetSequence).unwrap();
    assert_eq!(r.sink.events.len(), n);
}

#[test]
fn metrics_count_cycles() {
    let mut r = rig();
    r.run_ms(100);
    let m = r.ctl.metrics();
    assert_eq!(m.control_cycles, 10);
    assert_eq!(m.relay_timeouts, 0);
}
