use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use authwire_core::HttpExecutor;
use authwire_domain::constants::{DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_USER_AGENT};
use authwire_domain::{
    AuthWireError, ClientConfig, Headers, HttpMethod, OutboundRequest, Result, TransportFailure,
    TransportResponse,
};
use reqwest::header::{HeaderMap, COOKIE};
use reqwest::{Client as ReqwestClient, Method};
use serde_json::Value;
use tracing::debug;

use super::cookies::CsrfCookieJar;
use crate::errors::{transport_failure, InfraError};

/// [`HttpExecutor`] backed by a pooled reqwest client.
///
/// Performs exactly one exchange per call: no retries, no status
/// interpretation. Every status code comes back as a [`TransportResponse`].
#[derive(Clone)]
pub struct ReqwestExecutor {
    client: ReqwestClient,
    cookies: Option<Arc<CsrfCookieJar>>,
}

impl ReqwestExecutor {
    /// Start building a new executor.
    pub fn builder() -> ReqwestExecutorBuilder {
        ReqwestExecutorBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Executor configured from `config`, attached to `cookies`.
    pub fn from_config(config: &ClientConfig, cookies: Arc<CsrfCookieJar>) -> Result<Self> {
        Self::builder()
            .timeout(config.request_timeout())
            .user_agent(config.user_agent.clone())
            .cookie_jar(cookies)
            .build()
    }

    pub fn cookie_jar(&self) -> Option<&Arc<CsrfCookieJar>> {
        self.cookies.as_ref()
    }
}

impl std::fmt::Debug for ReqwestExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestExecutor").field("cookies", &self.cookies.is_some()).finish()
    }
}

#[async_trait]
impl HttpExecutor for ReqwestExecutor {
    async fn execute(
        &self,
        request: OutboundRequest,
    ) -> std::result::Result<TransportResponse, TransportFailure> {
        let method = to_method(request.method);
        let url = request.url;

        let mut builder = self.client.request(method.clone(), &url).timeout(request.timeout);
        for (name, value) in request.headers.iter() {
            builder = builder.header(name, value);
        }
        if let Some(jar) = &self.cookies {
            if !request.headers.contains(COOKIE.as_str()) {
                if let Some(cookie) = jar.header_value() {
                    builder = builder.header(COOKIE, cookie);
                }
            }
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        debug!(%method, %url, "sending HTTP request");
        let response = match builder.send().await {
            Ok(response) => response,
            Err(err) => {
                debug!(%method, %url, error = %err, "HTTP request failed");
                return Err(transport_failure(&err));
            }
        };

        let status = response.status().as_u16();
        debug!(%method, %url, status, "received HTTP response");

        if let Some(jar) = &self.cookies {
            jar.capture(response.headers());
        }
        let headers = collect_headers(response.headers());

        let bytes = response.bytes().await.map_err(|err| transport_failure(&err))?;
        Ok(TransportResponse { status, headers, body: parse_body(&bytes) })
    }
}

/// Builder for [`ReqwestExecutor`].
#[derive(Debug)]
pub struct ReqwestExecutorBuilder {
    timeout: Duration,
    user_agent: Option<String>,
    default_headers: Option<HeaderMap>,
    cookies: Option<Arc<CsrfCookieJar>>,
}

impl Default for ReqwestExecutorBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            user_agent: None,
            default_headers: None,
            cookies: None,
        }
    }
}

impl ReqwestExecutorBuilder {
    /// Client-wide timeout; each request still carries its own.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn default_headers(mut self, headers: HeaderMap) -> Self {
        self.default_headers = Some(headers);
        self
    }

    /// Capture `Set-Cookie` into `jar` and replay it on later requests.
    pub fn cookie_jar(mut self, jar: Arc<CsrfCookieJar>) -> Self {
        self.cookies = Some(jar);
        self
    }

    pub fn build(self) -> Result<ReqwestExecutor> {
        if self.timeout.is_zero() {
            return Err(AuthWireError::Config("HTTP timeout must be greater than zero".into()));
        }

        let agent = self.user_agent.unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let mut builder =
            ReqwestClient::builder().timeout(self.timeout).user_agent(agent).no_proxy();

        if let Some(headers) = self.default_headers {
            builder = builder.default_headers(headers);
        }

        let client = builder.build().map_err(|err| {
            let infra: InfraError = err.into();
            AuthWireError::from(infra)
        })?;

        Ok(ReqwestExecutor { client, cookies: self.cookies })
    }
}

fn to_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

/// Lower-cased response headers; values that are not visible ASCII are
/// skipped.
fn collect_headers(map: &HeaderMap) -> Headers {
    map.iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|value| (name.as_str(), value)))
        .collect()
}

/// JSON when it parses, the raw text otherwise, `None` when empty.
fn parse_body(bytes: &[u8]) -> Option<Value> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    match serde_json::from_slice(bytes) {
        Ok(value) => Some(value),
        Err(_) => Some(Value::String(String::from_utf8_lossy(bytes).into_owned())),
    }
}
