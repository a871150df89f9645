//! Raw responses returned by an executor.

use serde_json::Value;

use super::request::Headers;

/// One HTTP response, status not yet interpreted.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: Headers,
    /// Parsed JSON body. Non-JSON text is kept as a JSON string; an empty
    /// body is `None`.
    pub body: Option<Value>,
}

impl TransportResponse {
    pub fn new(status: u16) -> Self {
        Self { status, headers: Headers::new(), body: None }
    }

    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    pub const fn is_unauthorized(&self) -> bool {
        self.status == 401
    }

    /// Body handed back to callers, `Null` when empty.
    pub fn into_payload(self) -> Value {
        self.body.unwrap_or(Value::Null)
    }
}
