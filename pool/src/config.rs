//! Pool configuration with TOML file support.

use serde::{Deserialize, Serialize};

use crate::logging::LogFormat;
use crate::PoolError;

/// Configuration for a staking pool.
///
/// Can be loaded from a TOML file via [`PoolConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Initial reward rate, scaled by `rate_scale`, per staked unit per second.
    #[serde(default)]
    pub reward_rate: u64,

    /// Fixed-point scale applied to `reward_rate`.
    #[serde(default = "default_rate_scale")]
    pub rate_scale: u64,

    /// Symbol of the asset participants stake.
    #[serde(default = "default_staking_asset")]
    pub staking_asset: String,

    /// Symbol of the asset paid as reward.
    #[serde(default = "default_reward_asset")]
    pub reward_asset: String,

    /// Account that holds the pool's assets.
    #[serde(default = "default_custody")]
    pub custody: String,

    /// Run a full invariant scan after every mutation.
    #[serde(default = "default_true")]
    pub audit_invariants: bool,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_rate_scale() -> u64 {
    1_000_000_000_000
}

fn default_staking_asset() -> String {
    "STK".to_string()
}

fn default_reward_asset() -> String {
    "RWD".to_string()
}

fn default_custody() -> String {
    "pool".to_string()
}

fn default_true() -> bool {
    true
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl PoolConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<std::path::Path>) -> Result<Self, PoolError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, PoolError> {
        let config: Self = toml::from_str(s).map_err(|e| PoolError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, PoolError> {
        toml::to_string_pretty(self).map_err(|e| PoolError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), PoolError> {
        if self.rate_scale == 0 {
            return Err(PoolError::Config("rate_scale must be positive".into()));
        }
        if self.custody.trim().is_empty() {
            return Err(PoolError::Config("custody account must be set".into()));
        }
        if self.staking_asset == self.reward_asset {
            return Err(PoolError::Config(
                "staking and reward assets must differ".into(),
            ));
        }
        self.log_format()?;
        Ok(())
    }

    pub fn log_format(&self) -> Result<LogFormat, PoolError> {
        self.log_format.parse()
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            reward_rate: 0,
            rate_scale: default_rate_scale(),
            staking_asset: default_staking_asset(),
            reward_asset: default_reward_asset(),
            custody: default_custody(),
            audit_invariants: default_true(),
            log_format: default_log_format(),
            log_level: default_log_level(),
        }
    }
}
