// src/config.rs
//! Layered runtime configuration.
//!
//! Sources, lowest precedence first:
//! 1. built-in defaults
//! 2. `decid.toml` in the working directory (optional)
//! 3. environment variables `DECID__<SECTION>__<KEY>`, e.g.
//!    `DECID__STORAGE__BACKEND=pinata`
//!
//! `.env` is loaded by the binary before [`Settings::load`] runs.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

/// Content-store backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Local IPFS node HTTP API
    Ipfs,
    /// Pinata pinning service
    Pinata,
    /// In-process store, for demos and tests
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerSettings {
    /// Lowest fee, in drops, ever put on a transaction
    pub fee_drops_floor: u64,
    /// `LastLedgerSequence` = current ledger index + this offset
    pub last_ledger_offset: u32,
    pub validation_timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub reconnect_max_attempts: u32,
    pub reconnect_backoff_ms: u64,
}

impl LedgerSettings {
    pub fn validation_timeout(&self) -> Duration {
        Duration::from_secs(self.validation_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_backoff_ms)
    }
}

impl Default for LedgerSettings {
    fn default() -> Self {
        LedgerSettings {
            fee_drops_floor: 10,
            last_ledger_offset: 20,
            validation_timeout_secs: 30,
            poll_interval_ms: 1000,
            reconnect_max_attempts: 5,
            reconnect_backoff_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    pub ipfs_api_url: String,
    pub pinata_endpoint: String,
    #[serde(default)]
    pub pinata_jwt: Option<String>,
    /// Host of the HTTP gateway used for `https://<host>/ipfs/<cid>` links,
    /// or a full base URL such as `http://127.0.0.1:8080`
    pub gateway_host: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        StorageSettings {
            backend: StorageBackend::Memory,
            ipfs_api_url: "http://localhost:5001".to_string(),
            pinata_endpoint: "https://api.pinata.cloud".to_string(),
            pinata_jwt: None,
            gateway_host: "gateway.pinata.cloud".to_string(),
        }
    }
}

/// All runtime settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// DID method name, the `xrpl` in `did:xrpl:<address>`
    pub did_method: String,
    pub ledger: LedgerSettings,
    pub storage: StorageSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            did_method: "xrpl".to_string(),
            ledger: LedgerSettings::default(),
            storage: StorageSettings::default(),
        }
    }
}

impl Settings {
    /// Loads settings from defaults, `decid.toml` and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("decid")
    }

    /// Same as [`Settings::load`] with a different file stem.
    pub fn load_from(file_stem: &str) -> Result<Self, ConfigError> {
        let defaults = Settings::default();
        let ledger = &defaults.ledger;
        let storage = &defaults.storage;

        Config::builder()
            .set_default("did_method", defaults.did_method.clone())?
            .set_default("ledger.fee_drops_floor", ledger.fee_drops_floor)?
            .set_default("ledger.last_ledger_offset", ledger.last_ledger_offset)?
            .set_default("ledger.validation_timeout_secs", ledger.validation_timeout_secs)?
            .set_default("ledger.poll_interval_ms", ledger.poll_interval_ms)?
            .set_default("ledger.reconnect_max_attempts", ledger.reconnect_max_attempts)?
            .set_default("ledger.reconnect_backoff_ms", ledger.reconnect_backoff_ms)?
            .set_default("storage.backend", "memory")?
            .set_default("storage.ipfs_api_url", storage.ipfs_api_url.clone())?
            .set_default("storage.pinata_endpoint", storage.pinata_endpoint.clone())?
            .set_default("storage.gateway_host", storage.gateway_host.clone())?
            .add_source(File::with_name(file_stem).required(false))
            .add_source(Environment::with_prefix("DECID").separator("__"))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_without_file_uses_defaults() {
        let settings = Settings::load_from("decid-settings-that-do-not-exist").unwrap();

        assert_eq!(settings.did_method, "xrpl");
        assert_eq!(settings.storage.backend, StorageBackend::Memory);
        assert_eq!(settings.ledger.last_ledger_offset, 20);
        assert_eq!(settings.ledger.validation_timeout(), Duration::from_secs(30));
        assert!(settings.storage.pinata_jwt.is_none());
    }

    #[test]
    fn test_durations() {
        let ledger = LedgerSettings {
            poll_interval_ms: 250,
            reconnect_backoff_ms: 75,
            ..LedgerSettings::default()
        };
        assert_eq!(ledger.poll_interval(), Duration::from_millis(250));
        assert_eq!(ledger.reconnect_backoff(), Duration::from_millis(75));
    }
}
