//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements               | Connects to               |
//! |-------------|--------------------------|---------------------------|
//! | `hardware`  | InputPort, PressurePort  | ESP32 GPIO, ADC1          |
//! | `log_sink`  | EventSink                | Serial log output         |
//! | `nvs`       | StoragePort              | NVS / in-memory store     |
//! | `storage`   | ConfigPort               | any StoragePort           |
//! | `time`      | Clock, DelayNs           | ESP32 system timer        |
//! | `uart`      | RelayTransport           | Relay board UART          |

pub mod hardware;
pub mod log_sink;
pub mod nvs;
pub mod storage;
pub mod time;
pub mod uart;
