//! Engine-stop output line.
//!
//! HIGH stops the engine, LOW lets it run. The pin is configured by
//! [`hw_init`](super::hw_init) and driven through the `embedded-hal`
//! [`OutputPin`] trait so the safety interlock stays hardware-agnostic.

use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, OutputPin};

use super::hw_init;
use crate::pins;

pub struct EngineStopPin {
    gpio: i32,
    high: bool,
}

impl Default for EngineStopPin {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineStopPin {
    pub fn new() -> Self {
        Self {
            gpio: pins::ENGINE_STOP_GPIO,
            high: false,
        }
    }

    /// Last level written.
    pub fn is_high(&self) -> bool {
        self.high
    }

    fn write(&mut self, high: bool) {
        hw_init::gpio_write(self.gpio, high);
        self.high = high;
    }
}

impl ErrorType for EngineStopPin {
    type Error = Infallible;
}

impl OutputPin for EngineStopPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.write(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.write(true);
        Ok(())
    }
}
