//! Log-splitter controller firmware entry point.
//!
//! Hexagonal architecture with a fixed-rate control loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter     UartRelayTransport   LogEventSink         │
//! │  (Input+Pressure)    (RelayTransport)     (EventSink)          │
//! │  StorageConfigAdapter<NvsStorage>         Esp32Clock           │
//! │  (ConfigPort)                             (Clock+DelayNs)      │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              Controller (pure logic)                   │    │
//! │  │  Debounce · Sequence · Safety · Relays                 │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  Watchdog · EngineStopPin                                      │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use esp_idf_hal::delay::FreeRtos;
use log::{error, info, warn};

use logsplitter::adapters::hardware::HardwareAdapter;
use logsplitter::adapters::log_sink::LogEventSink;
use logsplitter::adapters::nvs::NvsStorage;
use logsplitter::adapters::storage::StorageConfigAdapter;
use logsplitter::adapters::time::Esp32Clock;
use logsplitter::adapters::uart::UartRelayTransport;
use logsplitter::app::events::AppEvent;
use logsplitter::app::ports::{Clock, EventSink};
use logsplitter::app::service::{load_config, Controller};
use logsplitter::config::SystemConfig;
use logsplitter::diagnostics;
use logsplitter::drivers::engine_stop::EngineStopPin;
use logsplitter::drivers::{hw_init, watchdog};

/// Full telemetry snapshot period.
const TELEMETRY_INTERVAL_MS: u64 = 10_000;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;
    diagnostics::install_panic_handler();

    info!("LogSplitter controller v{}", env!("CARGO_PKG_VERSION"));

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let mut config_store = match NvsStorage::new() {
        Ok(nvs) => Some(StorageConfigAdapter::new(nvs)),
        Err(e) => {
            warn!("NVS init failed ({}), running with defaults and no persistence", e);
            None
        }
    };
    let (config, config_fault) = match &config_store {
        Some(store) => load_config(store),
        None => (SystemConfig::default(), None),
    };

    // ── 3. Initialise hardware peripherals ────────────────────
    if let Err(e) = hw_init::init_peripherals(&config) {
        // Without inputs or the relay link nothing can run; hold the engine stopped.
        error!("HAL init failed: {}, halting", e);
        hw_init::gpio_write(logsplitter::pins::ENGINE_STOP_GPIO, true);
        anyhow::bail!("peripheral init failed: {e}");
    }
    let watchdog = watchdog::Watchdog::new(watchdog::timeout_for(
        config.relay_worst_case_block_ms() + config.relay_power_settle_ms,
    ));

    // ── 4. Construct adapters and controller ──────────────────
    let mut hw = HardwareAdapter::new();
    let mut log_sink = LogEventSink::new();
    let interval_ms = u64::from(config.control_loop_interval_ms);

    let mut controller = Controller::new(
        config,
        UartRelayTransport::new(),
        Esp32Clock::new(),
        EngineStopPin::new(),
    );
    if let Some(fault) = config_fault {
        controller.diagnostics_mut().faults_mut().set(fault);
    }
    controller.start(&mut hw, &mut log_sink);

    info!("System ready. Entering control loop ({}ms).", interval_ms);

    // ── 5. Control loop ───────────────────────────────────────
    let mut last_telemetry_ms = controller.now_ms();
    let loop_clock = Esp32Clock::new();

    loop {
        let started = loop_clock.now_ms();

        controller.tick(&mut hw, &mut log_sink);

        let now = controller.now_ms();
        if now.saturating_sub(last_telemetry_ms) >= TELEMETRY_INTERVAL_MS {
            last_telemetry_ms = now;
            log_sink.emit(&AppEvent::Telemetry(controller.build_telemetry()));
            info!("{}", controller.status_line());
        }

        // Config auto-save (5s debounce after last change).
        if let Some(store) = config_store.as_mut() {
            controller.auto_save_if_needed(store);
        }

        // Feed watchdog on every iteration.
        watchdog.feed();

        // Sleep out the rest of the period; an overrun starts the next tick
        // immediately.
        let spent = loop_clock.now_ms().saturating_sub(started);
        if spent < interval_ms {
            FreeRtos::delay_ms((interval_ms - spent) as u32);
        } else if spent > interval_ms * 4 {
            warn!("control tick overran: {}ms", spent);
        }
    }
}
