//! Error types for token handling.

use alcove_core::ConfigError;
use thiserror::Error;

/// Why a presented token was rejected.
///
/// Every variant means "treat the caller as unauthenticated", so handling a
/// `TokenError` as a whole is the catch-all for rejected credentials.
/// `InvalidTokenData` and `ExpiredToken` are refinements of `InvalidToken`
/// that are only reported once the signature has been verified.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Malformed wire format or signature mismatch.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// Signature verified, but the payload is not a well-formed object.
    #[error("invalid token data: {0}")]
    InvalidTokenData(String),

    /// Signature and structure verified, but the token has expired.
    #[error("token expired at {expired_at}")]
    ExpiredToken { expired_at: u64 },
}

/// Discriminant of a [`TokenError`], for callers that only need the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenErrorKind {
    Invalid,
    InvalidData,
    Expired,
}

impl TokenError {
    pub fn kind(&self) -> TokenErrorKind {
        match self {
            TokenError::InvalidToken(_) => TokenErrorKind::Invalid,
            TokenError::InvalidTokenData(_) => TokenErrorKind::InvalidData,
            TokenError::ExpiredToken { .. } => TokenErrorKind::Expired,
        }
    }

    /// True when the token was genuine but has expired.
    pub fn is_expired(&self) -> bool {
        matches!(self, TokenError::ExpiredToken { .. })
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        TokenError::InvalidToken(reason.into())
    }

    pub(crate) fn invalid_data(reason: impl Into<String>) -> Self {
        TokenError::InvalidTokenData(reason.into())
    }
}

/// The cookie capability refused a write.
#[derive(Debug, Error)]
pub enum CookieError {
    /// Response headers were already sent.
    #[error("cannot set cookie {name}: headers already sent")]
    HeadersSent { name: String },

    /// The cookie cannot be encoded as a header value.
    #[error("invalid cookie value for {name}: {source}")]
    InvalidHeader {
        name: String,
        source: http::header::InvalidHeaderValue,
    },
}

/// Errors returned by the crate's public operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Cookie(#[from] CookieError),

    /// Producing the signed form failed.
    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl Error {
    /// The token rejection, if this error is one.
    pub fn as_token_error(&self) -> Option<&TokenError> {
        match self {
            Error::Token(e) => Some(e),
            _ => None,
        }
    }
}
