//! Engine configuration.

use crate::domain::{AccountId, Amount};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Configuration for one engine instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Account that custodies deposits and fill proceeds.
    pub account: AccountId,
    /// Largest single deposit accepted by `place_order`.
    pub max_order_amount: u64,
    /// Fill records retained in the in-process history (0 = unbounded).
    pub fill_history_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            account: AccountId::new("limit-order-engine"),
            max_order_amount: u64::MAX,
            fill_history_limit: 0,
        }
    }
}

impl EngineConfig {
    pub fn new(account: AccountId) -> Self {
        Self { account, ..Self::default() }
    }

    /// Load a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.account.0.is_empty() {
            return Err(ConfigError::Invalid("account must not be empty".into()));
        }
        if self.max_order_amount == 0 {
            return Err(ConfigError::Invalid("max_order_amount must be positive".into()));
        }
        Ok(())
    }

    pub fn max_order(&self) -> Amount {
        Amount::from(self.max_order_amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let config = EngineConfig::from_toml("").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn toml_overrides_fields() {
        let config = EngineConfig::from_toml(
            r#"
account = "hook-custody"
max_order_amount = 1000
fill_history_limit = 64
"#,
        )
        .unwrap();
        assert_eq!(config.account, AccountId::new("hook-custody"));
        assert_eq!(config.max_order(), 1000);
        assert_eq!(config.fill_history_limit, 64);
    }

    #[test]
    fn zero_max_order_rejected() {
        let err = EngineConfig::from_toml("max_order_amount = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let err = EngineConfig::from_toml("account = [").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
