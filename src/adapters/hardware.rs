//! Hardware adapter: bridges real peripherals to domain port traits.
//!
//! Reads the watched GPIO lines and the main pressure transducer, exposing
//! them through [`InputPort`] and [`PressurePort`]. This and the UART
//! transport are the only modules that touch input hardware. On non-espidf
//! targets the underlying `hw_init` helpers are simulation stubs.

use crate::app::ports::{InputPort, PressurePort};
use crate::drivers::hw_init;
use crate::pins;

/// Full-scale ADC count (12-bit).
const ADC_MAX: f32 = 4095.0;

/// Transducer range: 0–4.5 V maps to 0–`SENSOR_MAX_PSI`. The front-end
/// divider scales 4.5 V onto the ADC full scale.
pub const SENSOR_MAX_PSI: f32 = 5000.0;

/// Linear transducer conversion. The filtered estimator lives upstream;
/// this is the raw channel only.
pub fn adc_to_psi(raw: u16) -> f32 {
    (f32::from(raw) / ADC_MAX).clamp(0.0, 1.0) * SENSOR_MAX_PSI
}

/// Concrete adapter that combines the input hardware behind port traits.
#[derive(Default)]
pub struct HardwareAdapter {
    adc_failures: u32,
}

impl HardwareAdapter {
    pub fn new() -> Self {
        Self { adc_failures: 0 }
    }

    /// ADC reads that returned a driver error.
    pub fn adc_failures(&self) -> u32 {
        self.adc_failures
    }
}

// ── InputPort implementation ──────────────────────────────────

impl InputPort for HardwareAdapter {
    fn sample(&mut self, channel: u8) -> bool {
        match pins::watch_index(channel) {
            Some(i) => hw_init::gpio_read(pins::WATCH_GPIOS[i]),
            None => {
                debug_assert!(false, "unknown input channel {channel}");
                false
            }
        }
    }
}

// ── PressurePort implementation ───────────────────────────────

impl PressurePort for HardwareAdapter {
    /// A failed conversion reads as NaN so the controller keeps the last
    /// good value and raises the sensor fault.
    fn pressure_psi(&mut self) -> f32 {
        match hw_init::adc1_read(pins::PRESSURE_ADC_CHANNEL) {
            Some(raw) => adc_to_psi(raw),
            None => {
                self.adc_failures = self.adc_failures.saturating_add(1);
                f32::NAN
            }
        }
    }
}
