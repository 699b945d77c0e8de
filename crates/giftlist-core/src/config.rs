//! Access core configuration.

use anyhow::Result;
use giftlist_storage::TxnLimits;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

// Default configuration constants
const DEFAULT_DENIAL_FLOOR_MS: u64 = 100;
const DEFAULT_TXN_ACQUIRE_TIMEOUT_MS: u64 = 2_000;
const DEFAULT_TXN_EXECUTION_TIMEOUT_MS: u64 = 5_000;
const MIN_DENIAL_FLOOR_MS: u64 = 1;
const MIN_TXN_TIMEOUT_MS: u64 = 10;

const CONFIG_ENV: &str = "GIFTLIST_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "giftlist.toml";

/// Tunables for the permission engine and the reservation coordinator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AccessConfig {
    /// Minimum latency of every denial, in milliseconds
    pub denial_floor_ms: u64,
    /// How long a write may wait for the writer slot
    pub txn_acquire_timeout_ms: u64,
    /// How long a write may run once it holds the slot
    pub txn_execution_timeout_ms: u64,
    /// Whether anonymous callers may pass the `reserve` permission check
    pub anonymous_reservations: bool,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            denial_floor_ms: DEFAULT_DENIAL_FLOOR_MS,
            txn_acquire_timeout_ms: DEFAULT_TXN_ACQUIRE_TIMEOUT_MS,
            txn_execution_timeout_ms: DEFAULT_TXN_EXECUTION_TIMEOUT_MS,
            anonymous_reservations: false,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    #[serde(default)]
    access: AccessConfig,
}

impl AccessConfig {
    /// Load from `$GIFTLIST_CONFIG`, then `./giftlist.toml`, then the environment.
    pub fn load() -> Result<Self> {
        let config = match config_file_path() {
            Some(path) => {
                let contents = fs::read_to_string(&path)
                    .map_err(|err| anyhow::anyhow!("Failed to read config {}: {}", path, err))?;
                Self::from_toml_str(&contents)
                    .map_err(|err| anyhow::anyhow!("Failed to parse config {}: {}", path, err))?
            }
            None => Self::from_env(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Parse the `[access]` table of a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let parsed: FileConfig = toml::from_str(contents)?;
        Ok(parsed.access)
    }

    fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            denial_floor_ms: env_u64("GIFTLIST_DENIAL_FLOOR_MS")
                .unwrap_or(defaults.denial_floor_ms),
            txn_acquire_timeout_ms: env_u64("GIFTLIST_TXN_ACQUIRE_TIMEOUT_MS")
                .unwrap_or(defaults.txn_acquire_timeout_ms),
            txn_execution_timeout_ms: env_u64("GIFTLIST_TXN_EXECUTION_TIMEOUT_MS")
                .unwrap_or(defaults.txn_execution_timeout_ms),
            anonymous_reservations: env::var("GIFTLIST_ANONYMOUS_RESERVATIONS")
                .ok()
                .and_then(|value| value.parse::<bool>().ok())
                .unwrap_or(defaults.anonymous_reservations),
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.denial_floor_ms < MIN_DENIAL_FLOOR_MS {
            return Err(anyhow::anyhow!(
                "Denial floor must be at least {} ms",
                MIN_DENIAL_FLOOR_MS
            ));
        }

        if self.txn_acquire_timeout_ms < MIN_TXN_TIMEOUT_MS {
            return Err(anyhow::anyhow!(
                "Transaction acquire timeout must be at least {} ms",
                MIN_TXN_TIMEOUT_MS
            ));
        }

        if self.txn_execution_timeout_ms < MIN_TXN_TIMEOUT_MS {
            return Err(anyhow::anyhow!(
                "Transaction execution timeout must be at least {} ms",
                MIN_TXN_TIMEOUT_MS
            ));
        }

        Ok(())
    }

    pub fn denial_floor(&self) -> Duration {
        Duration::from_millis(self.denial_floor_ms)
    }

    pub fn txn_limits(&self) -> TxnLimits {
        TxnLimits::new(
            Duration::from_millis(self.txn_acquire_timeout_ms),
            Duration::from_millis(self.txn_execution_timeout_ms),
        )
    }
}

fn env_u64(name: &str) -> Option<u64> {
    env::var(name).ok().and_then(|value| value.parse::<u64>().ok())
}

fn config_file_path() -> Option<String> {
    if let Ok(path) = env::var(CONFIG_ENV) {
        return Some(path);
    }
    if Path::new(DEFAULT_CONFIG_FILE).exists() {
        return Some(DEFAULT_CONFIG_FILE.to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AccessConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.denial_floor(), Duration::from_millis(100));
        assert_eq!(config.txn_limits().total(), Duration::from_millis(7_000));
        assert!(!config.anonymous_reservations);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AccessConfig::from_toml_str(
            r#"
            [access]
            denial_floor_ms = 250
            anonymous_reservations = true
            "#,
        )
        .unwrap();
        assert_eq!(config.denial_floor_ms, 250);
        assert!(config.anonymous_reservations);
        assert_eq!(config.txn_acquire_timeout_ms, DEFAULT_TXN_ACQUIRE_TIMEOUT_MS);
    }

    #[test]
    fn test_missing_access_table_uses_defaults() {
        let config = AccessConfig::from_toml_str("").unwrap();
        assert_eq!(config, AccessConfig::default());
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let config = AccessConfig {
            denial_floor_ms: 0,
            ..AccessConfig::default()
        };
        assert!(config.validate().is_err());

        let config = AccessConfig {
            txn_execution_timeout_ms: 5,
            ..AccessConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
