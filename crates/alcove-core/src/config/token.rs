//! Token signing configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ConfigError;

/// Configuration for signed tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    /// Inline secret. Prefer `secret_env` or `secret_file` outside of tests.
    #[serde(default)]
    pub secret: Option<String>,

    /// Environment variable containing the secret.
    #[serde(default)]
    pub secret_env: Option<String>,

    /// Path to a file containing the secret.
    #[serde(default)]
    pub secret_file: Option<PathBuf>,

    /// HMAC hash algorithm name (`sha224`, `sha256`, `sha384`, `sha512`).
    #[serde(default = "default_algorithm")]
    pub algorithm: String,

    /// Default expiration for issued tokens, in seconds. Values up to 30 days
    /// are relative, larger values are absolute Unix timestamps, 0 never expires.
    #[serde(default)]
    pub ttl: u64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            secret: None,
            secret_env: None,
            secret_file: None,
            algorithm: default_algorithm(),
            ttl: 0,
        }
    }
}

impl TokenConfig {
    /// Resolve the secret from environment, file, or inline value, in that order.
    ///
    /// A configured `secret_file` that cannot be read is an error, never a
    /// reason to fall back to the inline value.
    pub fn resolve_secret(&self) -> Result<Option<String>, ConfigError> {
        if let Some(env_var) = &self.secret_env
            && let Ok(secret) = std::env::var(env_var)
        {
            return Ok(Some(secret));
        }

        if let Some(path) = &self.secret_file {
            let secret = std::fs::read_to_string(path).map_err(|source| {
                ConfigError::SecretFile {
                    path: path.clone(),
                    source,
                }
            })?;
            return Ok(Some(secret.trim().to_string()));
        }

        Ok(self.secret.clone())
    }

    /// Resolve the secret, failing when none is configured or it is empty.
    pub fn require_secret(&self) -> Result<String, ConfigError> {
        match self.resolve_secret()? {
            None => Err(ConfigError::MissingSecret),
            Some(s) if s.is_empty() => Err(ConfigError::EmptySecret),
            Some(s) => Ok(s),
        }
    }
}

fn default_algorithm() -> String {
    "sha256".to_string()
}
