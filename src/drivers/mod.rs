//! Output drivers, hardware initialisation, and peripheral helpers.

pub mod engine_stop;
pub mod hw_init;
pub mod watchdog;
