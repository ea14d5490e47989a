//! Configuration management for lnpos

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub merchant: MerchantConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub state: StateConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerchantConfig {
    /// Username stamped on every transaction
    pub username: String,

    /// Display currency for amounts entered at the till
    #[serde(default = "default_currency_code")]
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Bound on the in-memory transaction history
    #[serde(default = "default_max_transactions")]
    pub max_transactions: usize,
}

/// Locations of the TOML state files kept outside the database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    #[serde(default = "default_rewards_file")]
    pub rewards_file: String,

    #[serde(default = "default_pin_file")]
    pub pin_file: String,
}

fn default_currency_code() -> String {
    "USD".to_string()
}

fn default_max_transactions() -> usize {
    crate::history::DEFAULT_MAX_TRANSACTIONS
}

fn default_rewards_file() -> String {
    "~/.config/lnpos/rewards.toml".to_string()
}

fn default_pin_file() -> String {
    "~/.config/lnpos/pin.toml".to_string()
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_transactions: default_max_transactions(),
        }
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            rewards_file: default_rewards_file(),
            pin_file: default_pin_file(),
        }
    }
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            database: DatabaseConfig {
                path: "~/.local/share/lnpos/transactions.db".to_string(),
            },
            merchant: MerchantConfig {
                username: "merchant".to_string(),
                currency: default_currency_code(),
            },
            history: HistoryConfig::default(),
            state: StateConfig::default(),
        }
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        let config_path = resolve_config_path()?;
        self.save_to_path(&config_path)
    }

    /// Save configuration to a specific path, creating parent directories
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigError::WriteError)?;
        }

        let content = toml::to_string_pretty(self).map_err(ConfigError::SerializeError)?;
        std::fs::write(path, content).map_err(ConfigError::WriteError)?;

        Ok(())
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("LNPOS_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("lnpos").join("config.toml"))
}

/// Resolve the data directory path following XDG Base Directory spec
pub fn resolve_data_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| ConfigError::MissingField("data directory".to_string()))?;

    Ok(data_dir.join("lnpos"))
}

/// Expand a leading tilde in a configured path
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).to_string())
}
