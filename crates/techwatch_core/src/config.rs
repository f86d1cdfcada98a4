//! Engine and logging configuration.
//!
//! # Responsibility
//! - Parse `techwatch.toml` into typed settings with defaults for every field.
//! - Reject values that would break allocation (zero capacity or interval).
//!
//! # Invariants
//! - An empty document yields `TechWatchConfig::default()`.

use crate::logging::default_log_level;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Capacity given to cycles created without an explicit one.
pub const DEFAULT_CYCLE_CAPACITY: u32 = 10;
/// Gap between a reference cycle and the one created after it.
pub const DEFAULT_CYCLE_INTERVAL_DAYS: u32 = 7;

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(toml::de::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "failed to parse config: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

/// Allocation and succession defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub default_capacity: u32,
    pub cycle_interval_days: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_capacity: DEFAULT_CYCLE_CAPACITY,
            cycle_interval_days: DEFAULT_CYCLE_INTERVAL_DAYS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Absolute directory for rolling log files; logging stays off when unset.
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level().to_string(),
            dir: None,
        }
    }
}

/// Top-level configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TechWatchConfig {
    pub engine: EngineConfig,
    pub logging: LoggingConfig,
}

impl TechWatchConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.default_capacity == 0 {
            return Err(ConfigError::Invalid(
                "engine.default_capacity must be positive".to_string(),
            ));
        }
        if self.engine.cycle_interval_days == 0 {
            return Err(ConfigError::Invalid(
                "engine.cycle_interval_days must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
