//! Configuration management for ProvChain

use crate::blockchain::MAX_PAYLOAD_SIZE;
use crate::error::ChainError;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_CONFIG_FILE: &str = "provchain.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_payload_bytes: default_max_payload_bytes(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: default_db_path() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_level() }
    }
}

impl LoggingConfig {
    pub fn tracing_level(&self) -> Result<tracing::Level, ChainError> {
        tracing::Level::from_str(&self.level)
            .map_err(|_| ChainError::ConfigError(format!("Unknown log level '{}'", self.level)))
    }
}

fn default_max_payload_bytes() -> usize {
    MAX_PAYLOAD_SIZE
}

fn default_level() -> String {
    "info".to_string()
}

/// Data directory under the user's home (`~/.provchain`).
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".provchain")
}

fn default_db_path() -> String {
    data_dir().join("ledger.db").to_string_lossy().into_owned()
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Self, ChainError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ChainError> {
        if self.ledger.max_payload_bytes == 0 || self.ledger.max_payload_bytes > MAX_PAYLOAD_SIZE {
            return Err(ChainError::ConfigError(format!(
                "ledger.max_payload_bytes must be between 1 and {}",
                MAX_PAYLOAD_SIZE
            )));
        }
        if self.database.path.is_empty() {
            return Err(ChainError::ConfigError("database.path must be set".to_string()));
        }
        self.logging.tracing_level()?;
        Ok(())
    }
}

/// Load configuration from `path`; a missing file yields defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ChainError> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let text = fs::read_to_string(path)?;
    Config::from_toml(&text)
}

/// Load `provchain.toml` from the working directory.
pub fn load_config() -> Result<Config, ChainError> {
    load_config_from(Path::new(DEFAULT_CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.ledger.max_payload_bytes, MAX_PAYLOAD_SIZE);
        assert!(config.database.path.ends_with("ledger.db"));
        assert_eq!(config.logging.tracing_level().unwrap(), tracing::Level::INFO);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config = Config::from_toml("[ledger]\nmax_payload_bytes = 4096\n").unwrap();
        assert_eq!(config.ledger.max_payload_bytes, 4096);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_full_toml() {
        let text = r#"
            [ledger]
            max_payload_bytes = 512

            [database]
            path = "/tmp/chain.db"

            [logging]
            level = "debug"
        "#;
        let config = Config::from_toml(text).unwrap();
        assert_eq!(config.database.path, "/tmp/chain.db");
        assert_eq!(config.logging.tracing_level().unwrap(), tracing::Level::DEBUG);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            Config::from_toml("[ledger]\nmax_payload_bytes = 0\n"),
            Err(ChainError::ConfigError(_))
        ));
        assert!(matches!(
            Config::from_toml("[ledger]\nmax_payload_bytes = 999999999\n"),
            Err(ChainError::ConfigError(_))
        ));
        assert!(matches!(
            Config::from_toml("[logging]\nlevel = \"loud\"\n"),
            Err(ChainError::ConfigError(_))
        ));
        assert!(matches!(
            Config::from_toml("[database]\npath = \"\"\n"),
            Err(ChainError::ConfigError(_))
        ));
        assert!(matches!(Config::from_toml("not toml ["), Err(ChainError::ConfigError(_))));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = load_config_from(Path::new("/definitely/not/here/provchain.toml")).unwrap();
        assert_eq!(config.ledger.max_payload_bytes, MAX_PAYLOAD_SIZE);
    }
}
