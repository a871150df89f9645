//! Request descriptors and the wire-level request handed to an executor.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::{AUTHORIZATION_HEADER, BEARER_PREFIX};

/// HTTP methods the transport issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// Methods that change server state.
    pub const fn is_mutating(self) -> bool {
        !matches!(self, Self::Get)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive header map. Names are stored lower-cased.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headers(BTreeMap<String, String>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.0.insert(name.as_ref().to_ascii_lowercase(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(&name.to_ascii_lowercase())
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.0.remove(&name.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}

/// Per-request behaviour switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestFlags {
    /// Never hand a 401 to the refresh coordinator.
    pub skip_auth_refresh: bool,
    /// Keep failures off the event bus; the caller still gets the error.
    pub suppress_error_event: bool,
    /// Set on the replay after a refresh. A 401 on a retry is terminal.
    pub is_retry: bool,
}

/// Immutable description of one API call.
///
/// Builder methods consume and return the descriptor; the transport never
/// mutates a descriptor it was given. A replay is a new descriptor produced
/// by [`RequestDescriptor::retried_with_token`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestDescriptor {
    method: HttpMethod,
    url: String,
    headers: Headers,
    body: Option<Value>,
    flags: RequestFlags,
    fallback_message: Option<String>,
    timeout: Option<Duration>,
}

impl RequestDescriptor {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Headers::new(),
            body: None,
            flags: RequestFlags::default(),
            fallback_message: None,
            timeout: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, url)
    }

    pub fn patch(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Patch, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, url)
    }

    #[must_use]
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn with_json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn skip_auth_refresh(mut self) -> Self {
        self.flags.skip_auth_refresh = true;
        self
    }

    #[must_use]
    pub fn suppress_error_event(mut self) -> Self {
        self.flags.suppress_error_event = true;
        self
    }

    #[must_use]
    pub fn with_fallback_message(mut self, message: impl Into<String>) -> Self {
        self.fallback_message = Some(message.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Replay of this request carrying a freshly issued access token.
    #[must_use]
    pub fn retried_with_token(&self, access_token: &str) -> Self {
        let mut replay = self.clone();
        replay.headers.insert(AUTHORIZATION_HEADER, format!("{BEARER_PREFIX}{access_token}"));
        replay.flags.is_retry = true;
        replay
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn flags(&self) -> RequestFlags {
        self.flags
    }

    pub fn fallback_message(&self) -> Option<&str> {
        self.fallback_message.as_deref()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Whether a 401 on this request may be recovered by refreshing.
    pub fn is_refresh_eligible(&self) -> bool {
        !self.flags.skip_auth_refresh && !self.flags.is_retry
    }
}

/// Fully resolved request passed to an executor.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    pub method: HttpMethod,
    /// Absolute URL.
    pub url: String,
    pub headers: Headers,
    pub body: Option<Value>,
    pub timeout: Duration,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn headers_are_case_insensitive() {
        let mut headers = Headers::new();
        headers.insert("X-CSRF-Token", "abc");
        assert_eq!(headers.get("x-csrf-token"), Some("abc"));
        assert!(headers.contains("X-Csrf-Token"));
        assert_eq!(headers.remove("X-CSRF-TOKEN"), Some("abc".into()));
        assert!(headers.is_empty());
    }

    #[test]
    fn retried_with_token_leaves_original_untouched() {
        let original = RequestDescriptor::post("/orders")
            .with_header("Authorization", "Bearer stale")
            .with_json(json!({"sku": 1}));

        let replay = original.retried_with_token("fresh");

        assert!(!original.flags().is_retry);
        assert_eq!(original.headers().get("authorization"), Some("Bearer stale"));
        assert!(replay.flags().is_retry);
        assert_eq!(replay.headers().get("authorization"), Some("Bearer fresh"));
        assert_eq!(replay.body(), original.body());
        assert!(!replay.is_refresh_eligible());
    }

    #[test]
    fn skip_auth_refresh_disables_refresh_eligibility() {
        assert!(RequestDescriptor::get("/me").is_refresh_eligible());
        assert!(!RequestDescriptor::get("/me").skip_auth_refresh().is_refresh_eligible());
    }

    #[test]
    fn only_get_is_non_mutating() {
        assert!(!HttpMethod::Get.is_mutating());
        assert!(HttpMethod::Post.is_mutating());
        assert!(HttpMethod::Delete.is_mutating());
        assert_eq!(HttpMethod::Patch.to_string(), "PATCH");
    }
}
