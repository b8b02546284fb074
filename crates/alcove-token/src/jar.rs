//! Cookie access as an injected capability.
//!
//! The token code never touches request or response globals. It reads and
//! writes cookies through a [`CookieJar`], so it can run against a real HTTP
//! exchange ([`HeaderCookieJar`]) or in memory ([`MemoryCookieJar`]).

use std::collections::HashMap;

use cookie::Cookie;
use http::header::{COOKIE, SET_COOKIE};
use http::{HeaderMap, HeaderValue};
use time::{OffsetDateTime, PrimitiveDateTime};

use crate::error::CookieError;

/// A cookie to be sent to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieRecord {
    pub name: String,
    pub value: String,
    pub path: String,
    pub domain: String,
    /// Unix timestamp; `0` makes it a session cookie.
    pub expires: u64,
}

impl CookieRecord {
    pub fn is_session(&self) -> bool {
        self.expires == 0
    }

    pub fn to_cookie(&self) -> Cookie<'static> {
        let mut cookie = Cookie::build((self.name.clone(), self.value.clone()))
            .path(self.path.clone())
            .build();
        if !self.domain.is_empty() {
            cookie.set_domain(self.domain.clone());
        }
        if !self.is_session() {
            cookie.set_expires(expiry_datetime(self.expires));
        }
        cookie
    }

    /// Render the record as a `Set-Cookie` header value.
    pub fn to_set_cookie(&self) -> String {
        self.to_cookie().to_string()
    }
}

/// Timestamps past the representable range clamp to the latest instant.
fn expiry_datetime(timestamp: u64) -> OffsetDateTime {
    i64::try_from(timestamp)
        .ok()
        .and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok())
        .unwrap_or_else(|| PrimitiveDateTime::MAX.assume_utc())
}

/// Read incoming cookies and write outgoing ones for one request.
pub trait CookieJar {
    /// Value of the named cookie sent by the client.
    fn get(&self, name: &str) -> Option<String>;

    /// Queue a cookie for the response.
    fn set(&mut self, record: CookieRecord) -> Result<(), CookieError>;

    /// Forget the named cookie for the rest of this request.
    fn clear(&mut self, name: &str);
}

/// In-memory jar, for tests and non-HTTP callers.
#[derive(Debug, Clone, Default)]
pub struct MemoryCookieJar {
    incoming: HashMap<String, String>,
    written: Vec<CookieRecord>,
    headers_sent: bool,
}

impl MemoryCookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Jar preloaded with a cookie as if the client had sent it.
    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.incoming.insert(name.into(), value.into());
        self
    }

    /// Make every subsequent `set` fail, as after the response was flushed.
    pub fn mark_headers_sent(&mut self) {
        self.headers_sent = true;
    }

    /// Records written so far, oldest first.
    pub fn written(&self) -> &[CookieRecord] {
        &self.written
    }

    pub fn last_written(&self, name: &str) -> Option<&CookieRecord> {
        self.written.iter().rev().find(|r| r.name == name)
    }
}

impl CookieJar for MemoryCookieJar {
    fn get(&self, name: &str) -> Option<String> {
        self.incoming.get(name).cloned()
    }

    fn set(&mut self, record: CookieRecord) -> Result<(), CookieError> {
        if self.headers_sent {
            return Err(CookieError::HeadersSent { name: record.name });
        }
        self.written.push(record);
        Ok(())
    }

    fn clear(&mut self, name: &str) {
        self.incoming.remove(name);
    }
}

/// Jar backed by HTTP headers: reads the request's `Cookie` headers and
/// collects `Set-Cookie` values for the response.
#[derive(Debug, Clone, Default)]
pub struct HeaderCookieJar {
    incoming: HashMap<String, String>,
    outgoing: Vec<HeaderValue>,
    sealed: bool,
}

impl HeaderCookieJar {
    /// Parse every `Cookie` header of a request. The first occurrence of a
    /// name wins, matching how browsers order more specific cookies first.
    pub fn from_request_headers(headers: &HeaderMap) -> Self {
        let mut incoming = HashMap::new();
        for header in headers.get_all(COOKIE) {
            let Ok(raw) = header.to_str() else {
                continue;
            };
            for cookie in Cookie::split_parse(raw).filter_map(Result::ok) {
                incoming
                    .entry(cookie.name().to_string())
                    .or_insert_with(|| cookie.value_trimmed().to_string());
            }
        }

        Self {
            incoming,
            outgoing: Vec::new(),
            sealed: false,
        }
    }

    /// Pending `Set-Cookie` values.
    pub fn set_cookie_headers(&self) -> &[HeaderValue] {
        &self.outgoing
    }

    /// Append the pending `Set-Cookie` headers to a response and refuse any
    /// further writes.
    pub fn write_to(&mut self, response_headers: &mut HeaderMap) {
        for value in self.outgoing.drain(..) {
            response_headers.append(SET_COOKIE, value);
        }
        self.sealed = true;
    }
}

impl CookieJar for HeaderCookieJar {
    fn get(&self, name: &str) -> Option<String> {
        self.incoming.get(name).cloned()
    }

    fn set(&mut self, record: CookieRecord) -> Result<(), CookieError> {
        if self.sealed {
            tracing::warn!(cookie = %record.name, "Cookie write after headers were sent");
            return Err(CookieError::HeadersSent { name: record.name });
        }
        let value = HeaderValue::from_str(&record.to_set_cookie()).map_err(|source| {
            CookieError::InvalidHeader {
                name: record.name.clone(),
                source,
            }
        })?;
        self.outgoing.push(value);
        Ok(())
    }

    fn clear(&mut self, name: &str) {
        self.incoming.remove(name);
    }
}
