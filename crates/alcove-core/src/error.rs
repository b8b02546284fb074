//! Configuration error type.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while setting up tokens. These are fatal at setup time and
/// are never retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No secret source was configured.
    #[error("no token secret configured (set `secret`, `secret_env` or `secret_file`)")]
    MissingSecret,

    /// A secret was given but it is empty.
    #[error("token secret must not be empty")]
    EmptySecret,

    /// The requested hash algorithm is not in the supported registry.
    #[error("unsupported hash algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// A payload value did not serialize to a JSON object.
    #[error("token payload must be a JSON object: {0}")]
    PayloadNotObject(String),

    /// The secret file could not be read.
    #[error("failed to read secret file {path}: {source}")]
    SecretFile {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The configuration file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid YAML for the expected schema.
    #[error("invalid configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
