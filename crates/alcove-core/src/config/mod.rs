//! Configuration types for Alcove.
//!
//! A single `AlcoveConfig` groups the token settings (secret source, hash
//! algorithm, default lifetime) and the cookie settings.

pub mod cookie;
pub mod token;

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

pub use cookie::CookieConfig;
pub use token::TokenConfig;

/// Environment variable that overrides the configuration file location.
pub const CONFIG_PATH_ENV: &str = "ALCOVE_CONFIG";

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "alcove.yaml";

/// Complete Alcove configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AlcoveConfig {
    /// Token signing settings.
    #[serde(default)]
    pub token: TokenConfig,

    /// Session cookie settings.
    #[serde(default)]
    pub cookie: CookieConfig,
}

impl AlcoveConfig {
    /// Parse a configuration from a YAML string.
    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(raw)?)
    }
}

/// Load the configuration from a YAML file.
pub fn load_config(path: &Path) -> Result<AlcoveConfig, ConfigError> {
    tracing::debug!(path = %path.display(), "Loading configuration");
    let raw = fs::read_to_string(path)?;
    AlcoveConfig::from_yaml(&raw)
}

/// Location of the configuration file: `$ALCOVE_CONFIG` or `alcove.yaml`.
pub fn config_path() -> PathBuf {
    if let Ok(p) = env::var(CONFIG_PATH_ENV) {
        return PathBuf::from(p);
    }
    PathBuf::from(DEFAULT_CONFIG_FILE)
}
