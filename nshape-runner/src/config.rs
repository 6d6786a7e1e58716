//! Scan configuration (TOML).
//!
//! ```toml
//! threads = 8        # optional, defaults to the number of cores
//! min_score = 60     # optional, drop signals scoring below this
//!
//! [params]
//! lookback_bars = 200
//! min_leg_pct = 0.10
//! cooldown_days = 20
//! ```
//!
//! Missing keys in `[params]` take their defaults.

use std::path::{Path, PathBuf};

use nshape_core::domain::ParamsHash;
use nshape_core::{ParamError, ScanParameters};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("serialize config TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid scan parameters: {0}")]
    Params(#[from] ParamError),

    #[error("threads must be at least 1")]
    ZeroThreads,

    #[error("min_score must be at most 100, got {0}")]
    MinScore(u8),
}

/// Everything one scan run needs besides the bars.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Worker threads; `None` uses one per core.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threads: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_score: Option<u8>,
    pub params: ScanParameters,
}

impl ScanConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threads == Some(0) {
            return Err(ConfigError::ZeroThreads);
        }
        if let Some(min) = self.min_score.filter(|&m| m > 100) {
            return Err(ConfigError::MinScore(min));
        }
        self.params.validate()?;
        Ok(())
    }

    pub fn params_hash(&self) -> ParamsHash {
        self.params.params_hash()
    }
}
