//! Relay controller against the scripted board, with the production
//! diagnostics sink on the other side.

use logsplitter::app::ports::Clock;
use logsplitter::config::SystemConfig;
use logsplitter::diagnostics::{Diagnostics, SystemError};
use logsplitter::error::RelayFault;
use logsplitter::relay::{RelayController, RelayPort, RelayTiming};

use crate::mock_hw::{BoardMode, ScriptedBoard, SimClock};

type Link = RelayController<ScriptedBoard, SimClock, Diagnostics>;

fn link(mode: BoardMode) -> (Link, SimClock) {
    let clock = SimClock::new();
    let mut rc = RelayController::new(
        ScriptedBoard::new(mode),
        clock.clone(),
        Diagnostics::new(),
        RelayTiming::from(&SystemConfig::default()),
    );
    if mode == BoardMode::Ack {
        rc.begin().unwrap();
    }
    (rc, clock)
}

#[test]
fn dropped_frame_is_retried() {
    let (mut rc, clock) = link(BoardMode::Ack);
    rc.transport_mut().drop_next = 1;
    let t0 = clock.now_ms();

    rc.set_relay(1, true, false).unwrap();

    assert!(rc.relay_state(1));
    assert_eq!(rc.transport_mut().frames_for(1), ["R1 ON", "R1 ON"]);
    assert!(clock.now_ms() - t0 >= 100);
    assert_eq!(rc.sink().relay_timeouts(), 0);
}

#[test]
fn ack_wait_is_bounded_by_retries() {
    let (mut rc, clock) = link(BoardMode::Ack);
    rc.transport_mut().mode = BoardMode::Silent;
    let t0 = clock.now_ms();

    assert_eq!(rc.set_relay(2, true, false), Err(RelayFault::Timeout));

    let blocked = clock.now_ms() - t0;
    let worst = u64::from(SystemConfig::default().relay_worst_case_block_ms());
    assert!((worst..worst + 5).contains(&blocked), "blocked {blocked} ms");
}

#[test]
fn timeout_is_queued_once_for_telemetry() {
    let (mut rc, _) = link(BoardMode::Ack);
    rc.transport_mut().mode = BoardMode::Silent;
    let _ = rc.set_relay(4, true, true);

    let diag = rc.sink_mut();
    assert!(diag.faults().is_set(SystemError::HardwareFault));
    assert_eq!(diag.take_relay_fault(), Some((4, RelayFault::Timeout)));
    assert_eq!(diag.take_relay_fault(), None);
}

#[test]
fn lowercase_ack_with_carriage_return_is_accepted() {
    let (mut rc, _) = link(BoardMode::Ack);
    rc.transport_mut().reply = "ok\r\n".to_string();
    rc.set_relay(5, true, true).unwrap();
    assert!(rc.relay_state(5));
}

#[test]
fn padded_ack_is_chatter_not_acknowledgment() {
    let (mut rc, _) = link(BoardMode::Ack);
    rc.transport_mut().reply = " Ok \r\n".to_string();
    assert_eq!(rc.set_relay(5, true, true), Err(RelayFault::Timeout));
    assert!(!rc.relay_state(5));
    assert_eq!(rc.sink().last_echo(), " Ok ");
}

#[test]
fn board_chatter_before_ack_is_diagnostic() {
    let (mut rc, _) = link(BoardMode::Ack);
    rc.transport_mut().reply = "R6 ON\r\nOK\r\n".to_string();
    rc.set_relay(6, true, true).unwrap();
    assert!(rc.relay_state(6));
    assert_eq!(rc.sink().echo_lines(), 1);
    assert_eq!(rc.sink().last_echo(), "R6 ON");
}

#[test]
fn write_failures_exhaust_attempts() {
    let (mut rc, _) = link(BoardMode::Ack);
    rc.transport_mut().mode = BoardMode::WriteFails;
    assert_eq!(rc.set_relay(1, true, false), Err(RelayFault::Timeout));
    assert_eq!(rc.sink().relay_timeouts(), 1);
    assert!(!rc.relay_state(1));
}

#[test]
fn unpowered_board_is_powered_before_command() {
    let (mut rc, clock) = link(BoardMode::Silent);
    rc.transport_mut().mode = BoardMode::Ack;
    assert!(!rc.board_powered());

    rc.set_relay(1, true, false).unwrap();
    assert!(rc.board_powered());
    assert_eq!(rc.transport_mut().written, ["R9 OFF\n", "R1 ON\n"]);
    assert!(clock.now_ms() >= 50);
}

#[test]
fn safety_lockout_forces_functional_relays_off() {
    let (mut rc, _) = link(BoardMode::Ack);
    for relay in 1..=4 {
        rc.set_relay(relay, true, false).unwrap();
    }
    rc.enable_safety().unwrap();
    for relay in 1..=8 {
        assert!(!rc.relay_state(relay), "R{relay} still on");
    }
    assert!(rc.board_powered());
    assert_eq!(rc.set_relay(1, true, false), Err(RelayFault::Blocked));

    rc.disable_safety();
    rc.set_relay(1, true, false).unwrap();
}
