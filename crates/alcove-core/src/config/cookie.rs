//! Session cookie configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the session cookie.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CookieConfig {
    /// Explicit cookie domain. When unset the domain is derived from the
    /// request host, which only knows about `.co.uk` as a multi-label suffix.
    #[serde(default)]
    pub domain: Option<String>,
}
