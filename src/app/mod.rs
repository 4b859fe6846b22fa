//! Application core: domain wiring, zero I/O.
//!
//! The [`service::Controller`] owns the debouncer, sequence controller,
//! safety interlock and relay controller and runs them in a fixed order
//! each tick. All interaction with hardware happens through **port
//! traits** defined in [`ports`], keeping this layer fully testable
//! without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
