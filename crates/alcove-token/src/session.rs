//! Session tokens bound to the `__alc` browser cookie.

use std::net::IpAddr;

use alcove_core::{ConfigError, CookieConfig, TokenConfig};
use serde_json::Value;

use crate::error::{CookieError, Error};
use crate::jar::{CookieJar, CookieRecord};
use crate::secret::Secret;
use crate::token::{SignedToken, now_unix};

/// Name of the session cookie.
pub const COOKIE_NAME: &str = "__alc";

/// Path the session cookie is scoped to.
pub const COOKIE_PATH: &str = "/";

/// Payload key holding the customer identifier.
pub const CUSTOMER_KEY: &str = "customer";

/// How far in the past a revoked cookie's expiry is set.
const REVOKE_BACKDATE_SECS: u64 = 3600;

/// Derive the domain a cookie for `host` is scoped to.
///
/// Keeps the last two labels (`www.example.com` -> `example.com`), or the
/// last three for hosts ending in `.co.uk`. This is a heuristic: other
/// multi-label public suffixes (`.com.au`, `.co.jp`, ...) are scoped one
/// label too wide. Set [`CookieConfig::domain`] for those.
///
/// A `:port` suffix and trailing dot are ignored. IP literals and hosts with
/// too few labels are returned as is.
pub fn cookie_domain(host: &str) -> String {
    let host = strip_port(host.trim())
        .trim_end_matches('.')
        .to_ascii_lowercase();

    if host.parse::<IpAddr>().is_ok() {
        return host;
    }

    let keep = if host.ends_with(".co.uk") { 3 } else { 2 };
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() <= keep {
        return host;
    }
    labels[labels.len() - keep..].join(".")
}

fn strip_port(host: &str) -> &str {
    if let Some(rest) = host.strip_prefix('[') {
        return rest.split_once(']').map_or(rest, |(addr, _)| addr);
    }
    match host.rsplit_once(':') {
        Some((name, port))
            if !name.contains(':') && !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) =>
        {
            name
        }
        _ => host,
    }
}

/// Per-request cookie scope: the domain the session cookie is written to.
///
/// Built once per request from that request's host, so a process serving
/// several hosts never shares a derived domain between them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieScope {
    domain: String,
}

impl CookieScope {
    pub fn for_host(host: &str) -> Self {
        Self {
            domain: cookie_domain(host),
        }
    }

    /// Use the configured domain if there is one, otherwise derive it from `host`.
    pub fn from_config(config: &CookieConfig, host: &str) -> Self {
        match config.domain.as_deref().map(str::trim) {
            Some(domain) if !domain.is_empty() => Self {
                domain: domain.to_ascii_lowercase(),
            },
            _ => Self::for_host(host),
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    fn record(&self, value: String, expires: u64) -> CookieRecord {
        CookieRecord {
            name: COOKIE_NAME.to_string(),
            value,
            path: COOKIE_PATH.to_string(),
            domain: self.domain.clone(),
            expires,
        }
    }
}

/// A [`SignedToken`] identifying a customer, carried in the session cookie.
#[derive(Debug, Clone)]
pub struct CookieToken {
    token: SignedToken,
}

impl CookieToken {
    /// `ttl` follows the token expiration rules; `0` issues a session cookie
    /// whose token never expires.
    pub fn new(secret: impl Into<Secret>, ttl: u64) -> Result<Self, ConfigError> {
        Ok(Self {
            token: SignedToken::new(secret, ttl)?,
        })
    }

    pub fn from_config(config: &TokenConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            token: SignedToken::from_config(config)?,
        })
    }

    pub fn from_signed(token: SignedToken) -> Self {
        Self { token }
    }

    pub fn signed(&self) -> &SignedToken {
        &self.token
    }

    pub fn signed_mut(&mut self) -> &mut SignedToken {
        &mut self.token
    }

    pub fn into_signed(self) -> SignedToken {
        self.token
    }

    pub fn customer(&self) -> Option<&Value> {
        self.token.payload_value(CUSTOMER_KEY)
    }

    pub fn set_customer(&mut self, customer: impl Into<Value>) {
        self.token.set_payload_value(CUSTOMER_KEY, customer);
    }

    /// Sign the token and write it to the session cookie.
    pub fn write_cookie<J>(&mut self, jar: &mut J, scope: &CookieScope) -> Result<(), Error>
    where
        J: CookieJar + ?Sized,
    {
        self.write_cookie_at(jar, scope, now_unix())
    }

    pub fn write_cookie_at<J>(
        &mut self,
        jar: &mut J,
        scope: &CookieScope,
        now: u64,
    ) -> Result<(), Error>
    where
        J: CookieJar + ?Sized,
    {
        // The cookie expires with the token it carries: `0` (session cookie)
        // when the token never expires.
        let (value, expires) = self.token.token_with_expiry_at(now)?;
        let value = value.to_string();

        jar.set(scope.record(value, expires)).inspect_err(|e| {
            tracing::warn!(error = %e, "Failed to write session cookie");
        })?;

        tracing::debug!(domain = scope.domain(), expires, "Issued session cookie");
        Ok(())
    }

    /// Issue a session cookie for `customer`.
    pub fn issue<J>(
        jar: &mut J,
        scope: &CookieScope,
        customer: impl Into<Value>,
        secret: impl Into<Secret>,
        ttl: u64,
    ) -> Result<Self, Error>
    where
        J: CookieJar + ?Sized,
    {
        let mut cookie = Self::new(secret, ttl)?;
        cookie.set_customer(customer);
        cookie.write_cookie(jar, scope)?;
        Ok(cookie)
    }

    /// Restore the session from the request cookie.
    ///
    /// Returns `Ok(None)` when the client sent no session cookie. A cookie
    /// that fails verification is an error, never silently ignored.
    pub fn restore<J>(jar: &J, secret: impl Into<Secret>) -> Result<Option<Self>, Error>
    where
        J: CookieJar + ?Sized,
    {
        Self::restore_with(jar, SignedToken::new(secret, 0)?)
    }

    /// Like [`CookieToken::restore`], verifying with a preconfigured token
    /// (secret and algorithm).
    pub fn restore_with<J>(jar: &J, mut token: SignedToken) -> Result<Option<Self>, Error>
    where
        J: CookieJar + ?Sized,
    {
        let Some(value) = jar.get(COOKIE_NAME) else {
            return Ok(None);
        };

        token.parse(&value).inspect_err(|e| {
            tracing::debug!(kind = ?e.kind(), "Session cookie rejected");
        })?;

        Ok(Some(Self { token }))
    }

    /// Expire the session cookie on the client, whatever the current state.
    pub fn revoke<J>(jar: &mut J, scope: &CookieScope) -> Result<(), CookieError>
    where
        J: CookieJar + ?Sized,
    {
        Self::revoke_at(jar, scope, now_unix())
    }

    pub fn revoke_at<J>(jar: &mut J, scope: &CookieScope, now: u64) -> Result<(), CookieError>
    where
        J: CookieJar + ?Sized,
    {
        // 0 would turn the record into a session cookie
        let expires = now.saturating_sub(REVOKE_BACKDATE_SECS).max(1);
        jar.set(scope.record(String::new(), expires))?;
        jar.clear(COOKIE_NAME);

        tracing::debug!(domain = scope.domain(), "Revoked session cookie");
        Ok(())
    }

    /// Expire this session's cookie.
    pub fn remove_cookie<J>(&self, jar: &mut J, scope: &CookieScope) -> Result<(), CookieError>
    where
        J: CookieJar + ?Sized,
    {
        Self::revoke(jar, scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TokenError;
    use crate::jar::MemoryCookieJar;
    use crate::token::RELATIVE_EXPIRATION_LIMIT;
    use serde_json::json;

    const SECRET: &str = "cookie secret";
    const NOW: u64 = 1_700_000_000;

    #[test]
    fn test_cookie_domain() {
        assert_eq!(cookie_domain("www.example.com"), "example.com");
        assert_eq!(cookie_domain("foo.example.co.uk"), "example.co.uk");
        assert_eq!(cookie_domain("a.b.foo.example.co.uk"), "example.co.uk");
        assert_eq!(cookie_domain("example.com"), "example.com");
        assert_eq!(cookie_domain("example.co.uk"), "example.co.uk");
        assert_eq!(cookie_domain("localhost"), "localhost");
    }

    #[test]
    fn test_cookie_domain_normalizes_host() {
        assert_eq!(cookie_domain("WWW.Example.COM"), "example.com");
        assert_eq!(cookie_domain("shop.example.com:8443"), "example.com");
        assert_eq!(cookie_domain("www.example.com."), "example.com");
        assert_eq!(cookie_domain("127.0.0.1:8080"), "127.0.0.1");
        assert_eq!(cookie_domain("[::1]:8080"), "::1");
        assert_eq!(cookie_domain("::1"), "::1");
    }

    #[test]
    fn test_scope_from_config() {
        let config = CookieConfig {
            domain: Some("Example.com.au".to_string()),
        };
        assert_eq!(
            CookieScope::from_config(&config, "shop.example.com.au").domain(),
            "example.com.au"
        );

        let config = CookieConfig::default();
        assert_eq!(
            CookieScope::from_config(&config, "shop.example.com").domain(),
            "example.com"
        );
    }

    #[test]
    fn test_issue_session_cookie() {
        let mut jar = MemoryCookieJar::new();
        let scope = CookieScope::for_host("www.example.com");

        let cookie = CookieToken::issue(&mut jar, &scope, "c-100", SECRET, 0).unwrap();
        assert_eq!(cookie.customer(), Some(&json!("c-100")));

        let record = jar.last_written(COOKIE_NAME).unwrap();
        assert_eq!(record.path, "/");
        assert_eq!(record.domain, "example.com");
        assert_eq!(record.expires, 0);
        assert!(record.is_session());
        assert!(record.value.contains('.'));
    }

    #[test]
    fn test_issue_with_ttl_sets_absolute_expiry() {
        let mut jar = MemoryCookieJar::new();
        let scope = CookieScope::for_host("www.example.com");

        let mut cookie = CookieToken::new(SECRET, 3600).unwrap();
        cookie.set_customer(55);
        cookie.write_cookie_at(&mut jar, &scope, NOW).unwrap();
        assert_eq!(jar.last_written(COOKIE_NAME).unwrap().expires, NOW + 3600);

        let mut cookie = CookieToken::new(SECRET, RELATIVE_EXPIRATION_LIMIT + 10).unwrap();
        cookie.write_cookie_at(&mut jar, &scope, NOW).unwrap();
        assert_eq!(
            jar.last_written(COOKIE_NAME).unwrap().expires,
            RELATIVE_EXPIRATION_LIMIT + 10
        );
    }

    #[test]
    fn test_cookie_expiry_follows_already_signed_token() {
        let mut jar = MemoryCookieJar::new();
        let scope = CookieScope::for_host("www.example.com");

        let mut cookie = CookieToken::new(SECRET, 3600).unwrap();
        cookie.set_customer("c-1");
        cookie.signed_mut().token_at(NOW).unwrap();
        cookie.write_cookie_at(&mut jar, &scope, NOW + 500).unwrap();

        let record = jar.last_written(COOKIE_NAME).unwrap();
        let mut parsed = SignedToken::new(SECRET, 0).unwrap();
        parsed.parse_at(&record.value, NOW + 500).unwrap();
        assert_eq!(record.expires, NOW + 3600);
        assert_eq!(record.expires, parsed.expires_at());
    }

    #[test]
    fn test_issue_reports_refused_write() {
        let mut jar = MemoryCookieJar::new();
        jar.mark_headers_sent();
        let scope = CookieScope::for_host("example.com");

        let err = CookieToken::issue(&mut jar, &scope, 1, SECRET, 0).unwrap_err();
        assert!(matches!(err, Error::Cookie(CookieError::HeadersSent { .. })));
    }

    #[test]
    fn test_restore_round_trip() {
        let mut issuing = MemoryCookieJar::new();
        let scope = CookieScope::for_host("www.example.com");
        CookieToken::issue(&mut issuing, &scope, 987, SECRET, 600).unwrap();
        let value = issuing.last_written(COOKIE_NAME).unwrap().value.clone();

        let incoming = MemoryCookieJar::new().with_cookie(COOKIE_NAME, value);
        let restored = CookieToken::restore(&incoming, SECRET).unwrap().unwrap();
        assert_eq!(restored.customer(), Some(&json!(987)));
        assert!(!restored.signed().is_expired());
    }

    #[test]
    fn test_restore_absent_cookie() {
        let jar = MemoryCookieJar::new().with_cookie("unrelated", "x");
        assert!(CookieToken::restore(&jar, SECRET).unwrap().is_none());
    }

    #[test]
    fn test_restore_propagates_token_errors() {
        let jar = MemoryCookieJar::new().with_cookie(COOKIE_NAME, "garbage");
        let err = CookieToken::restore(&jar, SECRET).unwrap_err();
        assert!(matches!(err, Error::Token(TokenError::InvalidToken(_))));

        let mut issuing = MemoryCookieJar::new();
        let scope = CookieScope::for_host("example.com");
        CookieToken::issue(&mut issuing, &scope, 1, SECRET, RELATIVE_EXPIRATION_LIMIT + 1)
            .unwrap();
        let value = issuing.last_written(COOKIE_NAME).unwrap().value.clone();

        let jar = MemoryCookieJar::new().with_cookie(COOKIE_NAME, value);
        let err = CookieToken::restore(&jar, SECRET).unwrap_err();
        assert!(matches!(err, Error::Token(TokenError::ExpiredToken { .. })));
    }

    #[test]
    fn test_restore_requires_secret() {
        let jar = MemoryCookieJar::new();
        let err = CookieToken::restore(&jar, "").unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::EmptySecret)));
    }

    #[test]
    fn test_revoke_expires_in_the_past() {
        let scope = CookieScope::for_host("www.example.co.uk");
        let mut jar = MemoryCookieJar::new().with_cookie(COOKIE_NAME, "anything");

        CookieToken::revoke_at(&mut jar, &scope, NOW).unwrap();

        let record = jar.last_written(COOKIE_NAME).unwrap();
        assert!(record.value.is_empty());
        assert!(record.expires > 0 && record.expires < NOW);
        assert_eq!(record.domain, "example.co.uk");
        assert!(jar.get(COOKIE_NAME).is_none());
    }

    #[test]
    fn test_remove_cookie_ignores_token_expiry() {
        let scope = CookieScope::for_host("example.com");
        let mut jar = MemoryCookieJar::new();

        let mut cookie = CookieToken::new(SECRET, RELATIVE_EXPIRATION_LIMIT).unwrap();
        cookie.write_cookie(&mut jar, &scope).unwrap();
        cookie.remove_cookie(&mut jar, &scope).unwrap();

        let record = jar.last_written(COOKIE_NAME).unwrap();
        assert!(record.expires < now_unix());
        assert!(record.value.is_empty());
    }

    #[test]
    fn test_customer_absent_by_default() {
        let cookie = CookieToken::new(SECRET, 0).unwrap();
        assert!(cookie.customer().is_none());
    }
}
