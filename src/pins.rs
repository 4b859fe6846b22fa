//! Channel and pin assignments for the log-splitter controller board.
//!
//! Single source of truth: every module references this one rather than
//! hard-coding channel numbers. Watched input channels keep the numbering
//! printed on the terminal block (2–7); the GPIO each one lands on is a
//! separate table used only by the hardware adapter.

// ---------------------------------------------------------------------------
// Watched digital inputs (terminal numbering)
// ---------------------------------------------------------------------------

/// Manual extend button.
pub const INPUT_MANUAL_EXTEND: u8 = 2;
/// Start button A (left hand).
pub const INPUT_START_A: u8 = 3;
/// Manual retract button.
pub const INPUT_MANUAL_RETRACT: u8 = 4;
/// Start button B (right hand).
pub const INPUT_START_B: u8 = 5;
/// Cylinder fully extended limit switch.
pub const INPUT_LIMIT_EXTEND: u8 = 6;
/// Cylinder fully retracted limit switch.
pub const INPUT_LIMIT_RETRACT: u8 = 7;

/// Every watched channel, in bitmap order (bit `i` of the polarity bitmap
/// and of [`InputStates`](crate::inputs::InputStates) is `WATCH_CHANNELS[i]`).
pub const WATCH_CHANNELS: [u8; 6] = [
    INPUT_MANUAL_EXTEND,
    INPUT_START_A,
    INPUT_MANUAL_RETRACT,
    INPUT_START_B,
    INPUT_LIMIT_EXTEND,
    INPUT_LIMIT_RETRACT,
];

/// Number of watched channels.
pub const WATCH_COUNT: usize = WATCH_CHANNELS.len();

/// The two-hand start interlock pair.
pub const START_PAIR: [u8; 2] = [INPUT_START_A, INPUT_START_B];

/// Operator buttons that abort a running sequence when newly pressed.
pub const ABORT_BUTTONS: [u8; 2] = [INPUT_MANUAL_EXTEND, INPUT_MANUAL_RETRACT];

/// Bitmap index of a watched channel, `None` if it is not watched.
pub fn watch_index(channel: u8) -> Option<usize> {
    WATCH_CHANNELS.iter().position(|&c| c == channel)
}

/// True for the two limit-switch channels (configurable debounce preset).
pub const fn is_limit_switch(channel: u8) -> bool {
    matches!(channel, INPUT_LIMIT_EXTEND | INPUT_LIMIT_RETRACT)
}

// ---------------------------------------------------------------------------
// Relay board channels
// ---------------------------------------------------------------------------

/// Cylinder extend valve.
pub const RELAY_EXTEND: u8 = 1;
/// Cylinder retract valve.
pub const RELAY_RETRACT: u8 = 2;
/// Relay board power control (inverted: OFF = board powered).
pub const RELAY_POWER: u8 = 9;
/// Highest relay number on the board.
pub const MAX_RELAYS: u8 = 9;

// ---------------------------------------------------------------------------
// ESP32-S3 GPIO routing
// ---------------------------------------------------------------------------

/// GPIO for each entry of [`WATCH_CHANNELS`], same order.
pub const WATCH_GPIOS: [i32; WATCH_COUNT] = [4, 5, 6, 7, 15, 16];

/// Engine-stop output: HIGH = stop, LOW = run.
pub const ENGINE_STOP_GPIO: i32 = 12;

/// Main hydraulic pressure transducer (0–4.5 V), ADC1 channel 0.
pub const PRESSURE_ADC_GPIO: i32 = 1;
/// ADC1 channel number of [`PRESSURE_ADC_GPIO`].
pub const PRESSURE_ADC_CHANNEL: u32 = 0;

/// UART port wired to the relay board.
pub const RELAY_UART_PORT: i32 = 1;
pub const RELAY_UART_TX_GPIO: i32 = 17;
pub const RELAY_UART_RX_GPIO: i32 = 18;
pub const RELAY_UART_BAUD: u32 = 115_200;
