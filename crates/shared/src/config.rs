//! Application configuration management.

use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::types::Currency;

/// Application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Store configuration.
    #[serde(default)]
    pub store: StoreConfig,
    /// Ledger engine configuration.
    #[serde(default)]
    pub engine: EngineConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Display name of the store.
    #[serde(default = "default_store_name")]
    pub name: String,
    /// Currency every cash register of this store is kept in.
    #[serde(default = "default_currency")]
    pub currency: Currency,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: default_store_name(),
            currency: default_currency(),
        }
    }
}

fn default_store_name() -> String {
    "Bodega".to_string()
}

fn default_currency() -> Currency {
    Currency::Ars
}

/// Ledger engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// How long an operation waits for a ledger lock before giving up.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
    /// Register closings whose absolute difference exceeds this amount raise an alert.
    #[serde(default = "default_discrepancy_threshold")]
    pub discrepancy_threshold: Decimal,
    /// Capacity of the engine event channel.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: default_lock_timeout_ms(),
            discrepancy_threshold: default_discrepancy_threshold(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl EngineConfig {
    /// Returns the lock timeout as a `Duration`.
    #[must_use]
    pub const fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

fn default_lock_timeout_ms() -> u64 {
    2_000
}

fn default_discrepancy_threshold() -> Decimal {
    Decimal::TEN
}

fn default_event_buffer() -> usize {
    256
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_filter")]
    pub filter: String,
    /// Emit JSON lines instead of human readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            json: false,
        }
    }
}

fn default_filter() -> String {
    "bodega_core=info,bodega_daysim=info".to_string()
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("BODEGA").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}
