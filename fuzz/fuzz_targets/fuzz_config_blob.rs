//! Fuzz target: persisted configuration decode
//!
//! Stores arbitrary bytes under the config key and loads them back. The
//! load must never panic, and anything it accepts must pass validation.
//!
//! cargo fuzz run fuzz_config_blob

#![no_main]

use libfuzzer_sys::fuzz_target;
use logsplitter::adapters::nvs::NvsStorage;
use logsplitter::adapters::storage::StorageConfigAdapter;
use logsplitter::app::ports::{ConfigPort, StoragePort};

fuzz_target!(|data: &[u8]| {
    let Ok(nvs) = NvsStorage::new() else {
        return;
    };
    let mut store = StorageConfigAdapter::new(nvs);
    if store.storage_mut().write("splitter", "syscfg", data).is_err() {
        return;
    }

    if let Ok(config) = store.load() {
        assert!(config.validate().is_ok(), "load accepted an invalid config");
        // A config that loaded must survive a save/load cycle unchanged.
        store.save(&config).expect("valid config must save");
        assert_eq!(store.load().ok(), Some(config));
    }
});
