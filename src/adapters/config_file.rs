//! JSON file configuration adapter.
//!
//! Implements [`ConfigPort`] for the bench: the configuration lives in a
//! JSON document whose fields mirror [`SystemConfig`].  A missing file
//! maps to [`ConfigError::NotFound`] so the caller can fall back to
//! defaults.

use std::io::ErrorKind;
use std::path::PathBuf;

use log::{info, warn};

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::SystemConfig;

/// Environment variable naming the bench configuration file.
pub const CONFIG_ENV: &str = "BIOTAG_CONFIG";

pub struct JsonFileConfig {
    path: PathBuf,
}

impl JsonFileConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Adapter for the path in [`CONFIG_ENV`], if set.
    pub fn from_env() -> Option<Self> {
        std::env::var_os(CONFIG_ENV).map(Self::new)
    }

    /// Parse and validate a configuration document.
    pub fn parse(text: &str) -> Result<SystemConfig, ConfigError> {
        let config: SystemConfig = serde_json::from_str(text).map_err(|e| {
            warn!("Config: parse error: {}", e);
            ConfigError::Corrupted
        })?;
        config.validate().map_err(ConfigError::ValidationFailed)?;
        Ok(config)
    }
}

impl ConfigPort for JsonFileConfig {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        let text = std::fs::read_to_string(&self.path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ConfigError::NotFound,
            _ => ConfigError::IoError,
        })?;
        let config = Self::parse(&text)?;
        info!("Config: loaded {}", self.path.display());
        Ok(config)
    }
}
