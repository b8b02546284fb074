//! Signed token construction and verification.

use std::fmt;

use alcove_core::{ConfigError, TokenConfig};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::algorithm::Algorithm;
use crate::error::{Error, TokenError};
use crate::secret::Secret;

/// Expiration values up to this many seconds (30 days) are relative to the
/// signing time. Larger values are absolute Unix timestamps.
pub const RELATIVE_EXPIRATION_LIMIT: u64 = 2_592_000;

/// Reserved payload key holding the resolved expiration.
pub const EXPIRES_AT_KEY: &str = "expires_at";

/// Resolve an expiration value against `now`.
///
/// `0` stays `0` (never expires), values in `1..=RELATIVE_EXPIRATION_LIMIT`
/// are added to `now`, anything larger is already an absolute timestamp.
pub fn calculated_expiration_time(expires_at: u64, now: u64) -> u64 {
    if expires_at > 0 && expires_at <= RELATIVE_EXPIRATION_LIMIT {
        now.saturating_add(expires_at)
    } else {
        expires_at
    }
}

pub(crate) fn now_unix() -> u64 {
    Utc::now().timestamp().max(0) as u64
}

/// A token carrying a JSON payload, signed with an HMAC.
///
/// Signing is lazy: [`SignedToken::token`] computes the wire form once and
/// caches it until a setter changes the algorithm, secret, payload or
/// expiration. Setters take `&mut self`; give each request its own instance.
#[derive(Clone)]
pub struct SignedToken {
    algorithm: Algorithm,
    secret: Secret,
    expires_at: u64,
    payload: Map<String, Value>,
    cached: Option<SignedForm>,
}

/// Wire form together with the absolute expiration it was signed with.
#[derive(Debug, Clone)]
struct SignedForm {
    wire: String,
    expires_at: u64,
}

impl fmt::Debug for SignedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignedToken")
            .field("algorithm", &self.algorithm)
            .field("secret", &self.secret)
            .field("expires_at", &self.expires_at)
            .field("payload", &self.payload)
            .field("signed", &self.cached.is_some())
            .finish()
    }
}

impl SignedToken {
    /// Create an unsigned token with an empty payload.
    pub fn new(secret: impl Into<Secret>, expires_at: u64) -> Result<Self, ConfigError> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(ConfigError::EmptySecret);
        }

        Ok(Self {
            algorithm: Algorithm::default(),
            secret,
            expires_at,
            payload: Map::new(),
            cached: None,
        })
    }

    /// Create a token from configuration. A missing secret is an error.
    pub fn from_config(config: &TokenConfig) -> Result<Self, ConfigError> {
        let secret = config.require_secret()?;
        let mut token = Self::new(secret, config.ttl)?;
        token.set_algorithm(&config.algorithm)?;
        Ok(token)
    }

    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self.cached = None;
        self
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Select the hash algorithm by registry name.
    pub fn set_algorithm(&mut self, name: &str) -> Result<(), ConfigError> {
        self.algorithm = name.parse()?;
        self.cached = None;
        Ok(())
    }

    pub fn set_secret(&mut self, secret: impl Into<Secret>) -> Result<(), ConfigError> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(ConfigError::EmptySecret);
        }
        self.secret = secret;
        self.cached = None;
        Ok(())
    }

    /// The raw expiration value, relative or absolute.
    pub fn expires_at(&self) -> u64 {
        self.expires_at
    }

    pub fn set_expiration_time(&mut self, expires_at: u64) {
        self.expires_at = expires_at;
        self.cached = None;
    }

    /// The expiration resolved against `now`; `0` if the token never expires.
    pub fn calculated_expiration_time(&self, now: u64) -> u64 {
        calculated_expiration_time(self.expires_at, now)
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    pub fn set_payload(&mut self, payload: Map<String, Value>) {
        self.payload = payload;
        self.cached = None;
    }

    pub fn payload_value(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    pub fn set_payload_value(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.payload.insert(key.into(), value.into());
        self.cached = None;
    }

    pub fn remove_payload_value(&mut self, key: &str) -> Option<Value> {
        let removed = self.payload.remove(key);
        if removed.is_some() {
            self.cached = None;
        }
        removed
    }

    /// Replace the payload with a serializable value. It must serialize to a
    /// JSON object.
    pub fn set_claims<T: Serialize>(&mut self, claims: &T) -> Result<(), ConfigError> {
        match serde_json::to_value(claims) {
            Ok(Value::Object(map)) => {
                self.set_payload(map);
                Ok(())
            }
            Ok(other) => Err(ConfigError::PayloadNotObject(format!(
                "got {}",
                json_type_name(&other)
            ))),
            Err(e) => Err(ConfigError::PayloadNotObject(e.to_string())),
        }
    }

    /// Typed view of the payload.
    pub fn claims<T: DeserializeOwned>(&self) -> Result<T, TokenError> {
        serde_json::from_value(Value::Object(self.payload.clone()))
            .map_err(|e| TokenError::invalid_data(e.to_string()))
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_unix())
    }

    pub fn is_expired_at(&self, now: u64) -> bool {
        is_past(self.calculated_expiration_time(now), now)
    }

    /// The signed wire form, computed on first use.
    pub fn token(&mut self) -> Result<&str, Error> {
        self.token_at(now_unix())
    }

    /// Like [`SignedToken::token`], resolving relative expiration against `now`.
    /// A cached token is returned as is.
    pub fn token_at(&mut self, now: u64) -> Result<&str, Error> {
        self.token_with_expiry_at(now).map(|(wire, _)| wire)
    }

    /// The wire form and the absolute expiration carried inside it (`0` for
    /// never). Both come from the same signing pass, so a cached token
    /// reports the expiration it was signed with, not one resolved against
    /// `now`.
    pub fn token_with_expiry_at(&mut self, now: u64) -> Result<(&str, u64), Error> {
        let signed = match self.cached.take() {
            Some(signed) => signed,
            None => self.sign(now)?,
        };
        let signed = self.cached.insert(signed);
        Ok((signed.wire.as_str(), signed.expires_at))
    }

    fn sign(&self, now: u64) -> Result<SignedForm, Error> {
        let mut expires_at = self.calculated_expiration_time(now);

        let mut payload = self.payload.clone();
        match payload.get(EXPIRES_AT_KEY).and_then(Value::as_u64) {
            // an explicit payload value is what parsing will read back
            Some(explicit) => expires_at = explicit,
            None if expires_at != 0 && !payload.contains_key(EXPIRES_AT_KEY) => {
                payload.insert(EXPIRES_AT_KEY.to_string(), Value::from(expires_at));
            }
            None => {}
        }

        let bytes = serde_json::to_vec(&canonicalize_map(&payload))
            .map_err(|e| Error::Signing(e.to_string()))?;
        let digest = self
            .algorithm
            .sign(self.secret.as_bytes(), &bytes)
            .map_err(|e| Error::Signing(e.to_string()))?;

        tracing::debug!(algorithm = %self.algorithm, expires_at, "Signed token");

        Ok(SignedForm {
            wire: format!(
                "{}.{}",
                URL_SAFE_NO_PAD.encode(digest),
                URL_SAFE_NO_PAD.encode(&bytes)
            ),
            expires_at,
        })
    }

    /// Verify `token` and load its payload and expiration.
    ///
    /// On error the current payload and expiration are left untouched.
    pub fn parse(&mut self, token: &str) -> Result<(), TokenError> {
        self.parse_at(token, now_unix())
    }

    /// Like [`SignedToken::parse`], checking expiration against `now`.
    pub fn parse_at(&mut self, token: &str, now: u64) -> Result<(), TokenError> {
        let (payload, expires_at) = self.verify(token, now).inspect_err(|e| {
            tracing::debug!(reason = %e, "Rejected token");
        })?;

        self.payload = payload;
        self.expires_at = expires_at;
        self.cached = None;

        tracing::debug!(algorithm = %self.algorithm, expires_at, "Verified token");
        Ok(())
    }

    fn verify(&self, token: &str, now: u64) -> Result<(Map<String, Value>, u64), TokenError> {
        let (digest_part, payload_part) = token
            .split_once('.')
            .ok_or_else(|| TokenError::invalid("missing separator"))?;

        let digest = URL_SAFE_NO_PAD
            .decode(digest_part)
            .map_err(|_| TokenError::invalid("invalid digest encoding"))?;
        let bytes = URL_SAFE_NO_PAD
            .decode(payload_part)
            .map_err(|_| TokenError::invalid("invalid payload encoding"))?;

        let matches = self
            .algorithm
            .verify(self.secret.as_bytes(), &bytes, &digest)
            .map_err(|_| TokenError::invalid("invalid secret key"))?;
        if !matches {
            return Err(TokenError::invalid("signature mismatch"));
        }

        let payload = match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                return Err(TokenError::invalid_data(format!(
                    "payload is {}, expected object",
                    json_type_name(&other)
                )));
            }
            Err(e) => {
                return Err(TokenError::invalid_data(format!(
                    "payload is not valid JSON: {}",
                    e
                )));
            }
        };

        let expires_at = match payload.get(EXPIRES_AT_KEY) {
            None => 0,
            Some(value) => value.as_u64().ok_or_else(|| {
                TokenError::invalid_data("expires_at is not a non-negative integer")
            })?,
        };

        let resolved = calculated_expiration_time(expires_at, now);
        if is_past(resolved, now) {
            return Err(TokenError::ExpiredToken {
                expired_at: resolved,
            });
        }

        Ok((payload, expires_at))
    }
}

fn is_past(resolved: u64, now: u64) -> bool {
    resolved > 0 && resolved < now
}

/// Rebuild `map` with keys inserted in sorted order, recursively. The output
/// serializes the same whether or not serde_json preserves insertion order.
fn canonicalize_map(map: &Map<String, Value>) -> Map<String, Value> {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();
    keys.into_iter()
        .map(|k| (k.clone(), canonicalize(&map[k.as_str()])))
        .collect()
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(canonicalize_map(map)),
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
