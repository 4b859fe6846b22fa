//! Log-splitter controller firmware library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod inputs;
pub mod pins;
pub mod relay;
pub mod safety;
pub mod sequence;

// Hardware-facing modules; the device implementations are guarded by cfg
// attributes inside, host builds get simulation stubs.
pub mod adapters;
pub mod drivers;
