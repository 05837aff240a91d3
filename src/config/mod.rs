//! Configuration for the wallet
//!
//! Settings come from three layers, lowest priority first:
//! 1. Built-in defaults
//! 2. A JSON config file (`--config`)
//! 3. Environment variables (`WALLET_DATA_DIR`, `WALLET_DEBUG`, ...)
//!
//! The resolved [`Config`] is built once at startup and passed explicitly to
//! the store and the submitter; nothing reads process-wide state afterwards.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable names
pub mod env_vars {
    pub const DATA_DIR: &str = "WALLET_DATA_DIR";
    pub const DEBUG: &str = "WALLET_DEBUG";
    pub const RECEIPT_TIMEOUT_SECS: &str = "WALLET_RECEIPT_TIMEOUT_SECS";
    pub const POLL_INTERVAL_MS: &str = "WALLET_POLL_INTERVAL_MS";
}

const DEFAULT_DIR_NAME: &str = ".evm-wallet";
const JOURNAL_FILE: &str = "transfers.jsonl";

/// Receipt polling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiptConfig {
    /// Delay between receipt queries (milliseconds)
    pub poll_interval_ms: u64,
    /// Give up waiting for confirmation after this many seconds (None = wait until cancelled)
    pub timeout_secs: Option<u64>,
}

impl Default for ReceiptConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1_000,
            timeout_secs: None,
        }
    }
}

impl ReceiptConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// A zero poll interval would spin on `eth_getTransactionReceipt`
    fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(Error::Config(
                "receipt poll interval must be at least 1 ms".to_string(),
            ));
        }
        Ok(())
    }
}

/// Main configuration
///
/// Missing fields in a config file fall back to [`Config::default`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the wallet database, lock file and transfer journal
    pub data_dir: PathBuf,
    /// Enable debug logging
    pub debug: bool,
    /// Receipt polling settings
    pub receipt: ReceiptConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            debug: false,
            receipt: ReceiptConfig::default(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(DEFAULT_DIR_NAME),
        None => PathBuf::from(".").join(DEFAULT_DIR_NAME),
    }
}

impl Config {
    /// Load configuration from an optional JSON file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_with(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Read a JSON config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.receipt.validate()?;
        Ok(config)
    }

    /// Apply overrides using `lookup` to resolve variable names
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(env_vars::DATA_DIR) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(flag) = lookup(env_vars::DEBUG) {
            self.debug = matches!(flag.to_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(secs) = lookup(env_vars::RECEIPT_TIMEOUT_SECS) {
            let secs = secs.parse::<u64>().map_err(|e| {
                Error::Config(format!("{}: {}", env_vars::RECEIPT_TIMEOUT_SECS, e))
            })?;
            self.receipt.timeout_secs = Some(secs);
        }
        if let Some(ms) = lookup(env_vars::POLL_INTERVAL_MS) {
            self.receipt.poll_interval_ms = ms
                .parse::<u64>()
                .map_err(|e| Error::Config(format!("{}: {}", env_vars::POLL_INTERVAL_MS, e)))?;
        }
        self.receipt.validate()
    }

    /// Path of the append-only transfer journal
    pub fn journal_path(&self) -> PathBuf {
        self.data_dir.join(JOURNAL_FILE)
    }
}
