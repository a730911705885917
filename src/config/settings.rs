//! Application settings loaded from `config.toml`.
//!
//! Every section is optional; missing keys fall back to the defaults below so a bare
//! deployment only needs `DATABASE_URL`.

use crate::config::catalog::StoreSeed;
use crate::config::database::DEFAULT_DATABASE_URL;
use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming an alternative config file.
pub const CONFIG_PATH_ENV: &str = "MARKETPLACE_CONFIG";

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Connection pool settings
    pub database: DatabaseSettings,
    /// Purchase engine settings
    pub purchase: PurchaseSettings,
    /// Catalog to seed at startup
    pub stores: Vec<StoreSeed>,
}

/// `[database]` section
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Connection URL, overridden by `DATABASE_URL`
    pub url: String,
    /// Upper bound on pooled connections
    pub max_connections: u32,
    /// Seconds to wait for a pooled connection before failing with contention
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: 8,
            acquire_timeout_secs: 5,
        }
    }
}

/// `[purchase]` section
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PurchaseSettings {
    /// Prefix of generated order codes (`PREFIX-<uuid>`)
    pub order_code_prefix: String,
    /// Reject purchases outside a round's start/end window
    pub enforce_round_window: bool,
    /// Upper bound on a single purchase or allocation transaction, in milliseconds
    pub lock_timeout_ms: u64,
}

impl Default for PurchaseSettings {
    fn default() -> Self {
        Self {
            order_code_prefix: "ORDER".to_string(),
            enforce_round_window: true,
            lock_timeout_ms: 5_000,
        }
    }
}

impl PurchaseSettings {
    /// The transaction time bound as a [`Duration`].
    #[must_use]
    pub const fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

/// Parses configuration from TOML text.
///
/// # Errors
/// Returns [`Error::Config`] if the TOML is malformed or a value has the wrong type.
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads configuration from a TOML file
///
/// # Errors
/// Returns an error if the file cannot be read or the TOML is invalid.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;
    parse_config(&contents)
}

/// Loads configuration from `$MARKETPLACE_CONFIG` or `./config.toml`.
///
/// A missing file is not an error: defaults are used and a warning is logged.
/// An unreadable or malformed file is.
pub fn load_app_configuration() -> Result<AppConfig> {
    let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "config.toml".to_string());
    if !Path::new(&path).exists() {
        warn!("No config file at {}, using defaults", path);
        return Ok(AppConfig::default());
    }

    let config = load_config(&path)?;
    info!(
        "Loaded configuration from {} ({} seeded stores)",
        path,
        config.stores.len()
    );
    Ok(config)
}
