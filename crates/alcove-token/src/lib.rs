//! # alcove-token
//!
//! Compact, tamper-evident tokens carrying application payload data, and
//! their binding to a browser cookie for stateless session authentication.
//!
//! A token on the wire looks like:
//!
//! ```text
//! base64url(HMAC(secret, payload_json)) "." base64url(payload_json)
//! ```
//!
//! The payload is canonical JSON (sorted keys, compact) and carries a reserved
//! `expires_at` field with the resolved expiration, if any.
//!
//! ## Expiration
//!
//! Expiration values up to [`RELATIVE_EXPIRATION_LIMIT`] (30 days) are
//! relative to the signing time; larger values are absolute Unix timestamps;
//! `0` never expires.
//!
//! ## Example
//!
//! ```
//! use alcove_token::{SignedToken, TokenError};
//!
//! let mut token = SignedToken::new("server-secret", 3600).unwrap();
//! token.set_payload_value("customer", 42);
//! let wire = token.token().unwrap().to_string();
//!
//! let mut restored = SignedToken::new("server-secret", 0).unwrap();
//! restored.parse(&wire).unwrap();
//! assert_eq!(restored.payload_value("customer"), Some(&serde_json::json!(42)));
//!
//! let mut forged = SignedToken::new("other-secret", 0).unwrap();
//! assert!(matches!(forged.parse(&wire), Err(TokenError::InvalidToken(_))));
//! ```

pub mod algorithm;
pub mod error;
pub mod jar;
pub mod secret;
pub mod session;
pub mod token;

pub use alcove_core::ConfigError;
pub use algorithm::Algorithm;
pub use error::{CookieError, Error, TokenError, TokenErrorKind};
pub use jar::{CookieJar, CookieRecord, HeaderCookieJar, MemoryCookieJar};
pub use secret::Secret;
pub use session::{COOKIE_NAME, CookieScope, CookieToken, cookie_domain};
pub use token::{RELATIVE_EXPIRATION_LIMIT, SignedToken, calculated_expiration_time};
