//! Serial link to the relay board.
//!
//! Implements [`RelayTransport`] over the UART installed by
//! [`hw_init`](crate::drivers::hw_init). Framing and acknowledgment
//! handling live in [`relay`](crate::relay); this adapter only moves bytes.

use log::debug;

use crate::app::ports::RelayTransport;
use crate::drivers::hw_init;
use crate::error::TransportError;

#[derive(Default)]
pub struct UartRelayTransport {
    bytes_written: u32,
}

impl UartRelayTransport {
    pub fn new() -> Self {
        Self { bytes_written: 0 }
    }

    pub fn bytes_written(&self) -> u32 {
        self.bytes_written
    }
}

impl RelayTransport for UartRelayTransport {
    fn write_line(&mut self, line: &str) -> Result<(), TransportError> {
        let data = line.as_bytes();
        match hw_init::uart_write(data) {
            Some(n) if n == data.len() => {
                self.bytes_written = self.bytes_written.wrapping_add(n as u32);
                Ok(())
            }
            other => {
                debug!("uart: short write {:?} of {}", other, data.len());
                Err(TransportError::WriteFailed)
            }
        }
    }

    fn read_byte(&mut self) -> Option<u8> {
        hw_init::uart_read_byte()
    }
}
