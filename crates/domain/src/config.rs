//! Client configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_API_BASE_URL, DEFAULT_REFRESH_TIMEOUT_MS, DEFAULT_REQUEST_TIMEOUT_MS,
    DEFAULT_USER_AGENT,
};
use crate::errors::{AuthWireError, Result};

/// Settings for one authenticated API client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Scheme and host of the API, without a trailing slash.
    pub api_base_url: String,
    pub request_timeout_ms: u64,
    /// Timeout of the token refresh call, kept shorter than regular calls.
    pub refresh_timeout_ms: u64,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            refresh_timeout_ms: DEFAULT_REFRESH_TIMEOUT_MS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ClientConfig {
    /// Config pointing at `api_base_url` with default timeouts.
    pub fn with_base_url(api_base_url: impl Into<String>) -> Self {
        Self { api_base_url: api_base_url.into(), ..Self::default() }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_millis(self.refresh_timeout_ms)
    }

    /// Trim the base URL and reject values the transport cannot use.
    pub fn validated(mut self) -> Result<Self> {
        self.api_base_url = self.api_base_url.trim().trim_end_matches('/').to_string();
        if self.api_base_url.is_empty() {
            return Err(AuthWireError::Config("api_base_url must not be empty".into()));
        }
        if !(self.api_base_url.starts_with("http://") || self.api_base_url.starts_with("https://"))
        {
            return Err(AuthWireError::Config(format!(
                "api_base_url must be an http(s) URL, got '{}'",
                self.api_base_url
            )));
        }
        if self.request_timeout_ms == 0 || self.refresh_timeout_ms == 0 {
            return Err(AuthWireError::Config("timeouts must be greater than zero".into()));
        }
        Ok(self)
    }

    /// Join the base URL with a path or pass an absolute URL through.
    pub fn resolve_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        let base = self.api_base_url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }
}
