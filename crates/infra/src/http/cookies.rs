//! Cookie capture for the CSRF double-submit pattern
//!
//! The server hands out `csrf_token` as a cookie and expects it back in the
//! `x-csrf-token` header. [`CsrfCookieJar`] remembers every cookie the
//! server sets, replays them on later requests, and exposes them through
//! [`CookieSource`] so the credential store can fall back to the cookie.

use std::collections::BTreeMap;

use authwire_core::CookieSource;
use authwire_domain::constants::CSRF_COOKIE;
use parking_lot::RwLock;
use reqwest::header::{HeaderMap, SET_COOKIE};
use tracing::trace;

/// Thread-safe store of cookies set by the API.
#[derive(Debug, Default)]
pub struct CsrfCookieJar {
    cookies: RwLock<BTreeMap<String, String>>,
}

impl CsrfCookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record every `Set-Cookie` header of a response.
    pub fn capture(&self, headers: &HeaderMap) {
        for value in headers.get_all(SET_COOKIE) {
            if let Ok(raw) = value.to_str() {
                self.store_set_cookie(raw);
            }
        }
    }

    /// Apply one `Set-Cookie` value. Expired or empty cookies are removed.
    pub fn store_set_cookie(&self, raw: &str) {
        let Some((name, value, expired)) = parse_set_cookie(raw) else {
            return;
        };

        let mut cookies = self.cookies.write();
        if expired || value.is_empty() {
            cookies.remove(&name);
            trace!(cookie = %name, "cookie removed");
        } else {
            trace!(cookie = %name, "cookie stored");
            cookies.insert(name, value);
        }
    }

    /// Value for an outgoing `Cookie` header, `None` when the jar is empty.
    pub fn header_value(&self) -> Option<String> {
        let cookies = self.cookies.read();
        if cookies.is_empty() {
            return None;
        }
        let pairs: Vec<String> = cookies
            .iter()
            .map(|(name, value)| format!("{name}={}", urlencoding::encode(value)))
            .collect();
        Some(pairs.join("; "))
    }

    pub fn csrf_token(&self) -> Option<String> {
        self.cookie(CSRF_COOKIE)
    }

    pub fn len(&self) -> usize {
        self.cookies.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.read().is_empty()
    }

    pub fn clear(&self) {
        self.cookies.write().clear();
    }
}

impl CookieSource for CsrfCookieJar {
    fn cookie(&self, name: &str) -> Option<String> {
        self.cookies.read().get(name).cloned()
    }
}

/// Split a `Set-Cookie` value into its decoded name and value, and whether
/// its attributes expire it immediately.
fn parse_set_cookie(raw: &str) -> Option<(String, String, bool)> {
    let mut parts = raw.split(';');
    let (name, value) = parts.next()?.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let value = value.trim().trim_matches('"');
    let value = urlencoding::decode(value)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| value.to_string());

    let expired = parts.any(|attribute| {
        let attribute = attribute.trim().to_ascii_lowercase();
        attribute
            .strip_prefix("max-age=")
            .is_some_and(|age| age.trim().parse::<i64>().is_ok_and(|seconds| seconds <= 0))
    });

    Some((name.to_string(), value, expired))
}
