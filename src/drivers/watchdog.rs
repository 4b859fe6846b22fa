//! Task Watchdog Timer (TWDT) driver.
//!
//! Wraps the ESP-IDF TWDT API to reset the controller if the control loop
//! stalls. The timeout has to exceed the worst-case blocking time of one
//! tick, which is dominated by relay acknowledgment retries, so it is
//! derived from the configuration rather than fixed.
//!
//! The main loop must call `feed()` on every control tick iteration.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

/// Floor for the TWDT timeout (ms).
pub const MIN_TIMEOUT_MS: u32 = 5_000;

/// Timeout for a loop whose single tick may block for `worst_case_block_ms`.
///
/// Three relay transactions can block in one tick (two stage drives plus
/// an abort), so the margin is four times the worst case.
pub fn timeout_for(worst_case_block_ms: u32) -> u32 {
    worst_case_block_ms.saturating_mul(4).max(MIN_TIMEOUT_MS)
}

pub struct Watchdog {
    timeout_ms: u32,
    #[cfg(target_os = "espidf")]
    subscribed: bool,
}

impl Watchdog {
    /// Initialise and subscribe the current task to the TWDT.
    pub fn new(timeout_ms: u32) -> Self {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: TWDT reconfigure/add are called once from the main
            // task before the control loop starts.
            unsafe {
                let cfg = esp_task_wdt_config_t {
                    timeout_ms,
                    idle_core_mask: 0,
                    trigger_panic: true,
                };
                let ret = esp_task_wdt_reconfigure(&cfg);
                if ret != ESP_OK {
                    log::warn!(
                        "TWDT reconfigure returned {} (may already be configured)",
                        ret
                    );
                }

                let ret = esp_task_wdt_add(core::ptr::null_mut());
                let subscribed = ret == ESP_OK;
                if subscribed {
                    info!("Watchdog: subscribed ({}ms timeout, panic on trigger)", timeout_ms);
                } else {
                    log::warn!("Watchdog: failed to subscribe ({})", ret);
                }

                Self {
                    timeout_ms,
                    subscribed,
                }
            }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            log::info!("Watchdog(sim): no-op, {}ms", timeout_ms);
            Self { timeout_ms }
        }
    }

    pub fn timeout_ms(&self) -> u32 {
        self.timeout_ms
    }

    /// Feed the watchdog. Must be called at least once per timeout period.
    pub fn feed(&self) {
        #[cfg(target_os = "espidf")]
        {
            if self.subscribed {
                // SAFETY: resets the TWDT entry of the calling task only.
                unsafe {
                    esp_task_wdt_reset();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_covers_relay_retries() {
        // 100 ms x 3 attempts + 50 ms settle
        assert_eq!(timeout_for(350), MIN_TIMEOUT_MS);
        assert_eq!(timeout_for(3_000), 12_000);
        assert_eq!(timeout_for(u32::MAX), u32::MAX);
    }

    #[test]
    fn sim_watchdog_keeps_timeout() {
        let wdt = Watchdog::new(timeout_for(350));
        wdt.feed();
        assert_eq!(wdt.timeout_ms(), MIN_TIMEOUT_MS);
    }
}
