//! Persisted configuration over any [`StoragePort`].
//!
//! The blob is a four-byte magic tag followed by the postcard encoding of
//! [`SystemConfig`]. A missing key is [`ConfigError::NotFound`]; a wrong
//! tag, undecodable body or out-of-range value is
//! [`ConfigError::Corrupted`], so the caller can tell a first boot from a
//! damaged store.

use log::{info, warn};

use crate::app::ports::{ConfigError, ConfigPort, StorageError, StoragePort};
use crate::config::SystemConfig;

const CONFIG_NAMESPACE: &str = "splitter";
const CONFIG_KEY: &str = "syscfg";

/// Format tag. Bump the last byte when the field layout changes.
pub const CONFIG_MAGIC: [u8; 4] = *b"LSC\x01";

const MAX_BLOB_SIZE: usize = 128;

pub struct StorageConfigAdapter<S> {
    storage: S,
}

impl<S: StoragePort> StorageConfigAdapter<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// Remove the stored blob; the next load falls back to defaults.
    pub fn erase(&mut self) -> Result<(), ConfigError> {
        self.storage.delete(CONFIG_NAMESPACE, CONFIG_KEY)?;
        Ok(())
    }
}

impl<S: StoragePort> ConfigPort for StorageConfigAdapter<S> {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        let mut buf = [0u8; MAX_BLOB_SIZE];
        let len = match self.storage.read(CONFIG_NAMESPACE, CONFIG_KEY, &mut buf) {
            Ok(len) => len,
            Err(StorageError::NotFound) => return Err(ConfigError::NotFound),
            Err(e) => return Err(e.into()),
        };

        let blob = &buf[..len];
        let Some(body) = blob.strip_prefix(&CONFIG_MAGIC) else {
            warn!("config blob has wrong tag ({} bytes)", len);
            return Err(ConfigError::Corrupted);
        };
        let config: SystemConfig =
            postcard::from_bytes(body).map_err(|_| ConfigError::Corrupted)?;
        config.validate().map_err(|e| {
            warn!("stored config out of range: {}", e);
            ConfigError::Corrupted
        })?;

        info!("config loaded ({} bytes)", len);
        Ok(config)
    }

    fn save(&mut self, config: &SystemConfig) -> Result<(), ConfigError> {
        config.validate()?;

        let mut buf = [0u8; MAX_BLOB_SIZE];
        buf[..CONFIG_MAGIC.len()].copy_from_slice(&CONFIG_MAGIC);
        let body_len = postcard::to_slice(config, &mut buf[CONFIG_MAGIC.len()..])
            .map_err(|_| ConfigError::IoError)?
            .len();
        let len = CONFIG_MAGIC.len() + body_len;

        self.storage.write(CONFIG_NAMESPACE, CONFIG_KEY, &buf[..len])?;
        info!("config saved ({} bytes)", len);
        Ok(())
    }
}
