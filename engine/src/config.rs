//! Store configuration.

use crate::MergeStrategy;
use serde::{Deserialize, Serialize};
use std::env;

/// Environment variable overriding the local conflict strategy.
pub const STRATEGY_ENV: &str = "CARRY_MERGE_STRATEGY";

/// Per-store settings fixed at construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreConfig {
    /// Conflict rule for local writes. Every replica must use the same rule
    /// here and in reconcile for their states to converge.
    pub strategy: MergeStrategy,
}

impl StoreConfig {
    /// Load configuration from environment variables, defaulting anything
    /// that is unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let strategy = match env::var(STRATEGY_ENV) {
            Ok(value) => value
                .parse()
                .map_err(|_| ConfigError::InvalidStrategy(value))?,
            Err(env::VarError::NotPresent) => MergeStrategy::default(),
            Err(env::VarError::NotUnicode(_)) => {
                return Err(ConfigError::InvalidStrategy("<non-unicode>".into()))
            }
        };

        Ok(Self { strategy })
    }

    /// Parse a JSON config, as handed over the FFI boundary.
    pub fn from_json(json: &str) -> crate::error::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid CARRY_MERGE_STRATEGY value: {0}")]
    InvalidStrategy(String),
}
