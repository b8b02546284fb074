//! # alcove-core
//!
//! Configuration types shared by the Alcove crates.
//!
//! Configuration is loaded from a single YAML file (`alcove.yaml` by default,
//! overridable with the `ALCOVE_CONFIG` environment variable):
//!
//! ```yaml
//! token:
//!   secret_env: ALCOVE_SECRET
//!   algorithm: sha256
//!   ttl: 86400
//! cookie:
//!   domain: example.co.uk
//! ```

pub mod config;
pub mod error;

pub use config::{AlcoveConfig, CookieConfig, TokenConfig, config_path, load_config};
pub use error::ConfigError;
