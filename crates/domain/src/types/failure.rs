//! Failure inputs and the normalized error surfaced to callers.

use std::fmt;
use std::time::Duration;

use authwire_common::error::{ErrorClassification, ErrorSeverity};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Anything that can go wrong with one HTTP exchange.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportFailure {
    /// The request was cancelled before a response arrived.
    Cancelled,
    /// No response: connect error, timeout, broken body stream.
    Network { message: String },
    /// A response arrived with a non-success status.
    Response { status: u16, body: Option<Value>, retry_after: Option<Duration> },
}

impl TransportFailure {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network { message: message.into() }
    }

    pub fn response(status: u16, body: Option<Value>) -> Self {
        Self::Response { status, body, retry_after: None }
    }

    /// HTTP status, `0` when no response arrived.
    pub const fn status(&self) -> u16 {
        match self {
            Self::Response { status, .. } => *status,
            Self::Cancelled | Self::Network { .. } => 0,
        }
    }
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => write!(f, "request cancelled"),
            Self::Network { message } => write!(f, "network failure: {message}"),
            Self::Response { status, .. } => write!(f, "HTTP {status}"),
        }
    }
}

/// Stable error taxonomy. Codes the client does not know are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ErrorCode {
    AuthInvalid,
    AuthLocked,
    AuthExpired,
    ValidationFailed,
    RateLimit,
    ServerError,
    Unknown,
    RequestCancelled,
    Other(String),
}

impl ErrorCode {
    pub fn as_str(&self) -> &str {
        match self {
            Self::AuthInvalid => "AUTH_INVALID",
            Self::AuthLocked => "AUTH_LOCKED",
            Self::AuthExpired => "AUTH_EXPIRED",
            Self::ValidationFailed => "VALIDATION_FAILED",
            Self::RateLimit => "RATE_LIMIT",
            Self::ServerError => "SERVER_ERROR",
            Self::Unknown => "UNKNOWN",
            Self::RequestCancelled => "REQUEST_CANCELLED",
            Self::Other(code) => code,
        }
    }

    /// Canned user message for codes with a fixed wording.
    pub const fn canned_message(&self) -> Option<&'static str> {
        match self {
            Self::AuthInvalid => Some("账号或密码错误。"),
            Self::AuthLocked => Some("账户已被锁定，请联系管理员。"),
            Self::AuthExpired => Some("登录状态已过期，请重新登录。"),
            Self::ValidationFailed => Some("提交的数据验证失败，请检查后重试。"),
            Self::RateLimit => Some("请求过于频繁，请稍后再试。"),
            Self::ServerError => Some("服务器开小差了，请稍后再试。"),
            Self::Unknown | Self::RequestCancelled | Self::Other(_) => None,
        }
    }

    /// Code implied by a status when the payload carries none.
    pub const fn from_status(status: u16) -> Self {
        match status {
            429 => Self::RateLimit,
            500..=599 => Self::ServerError,
            _ => Self::Unknown,
        }
    }
}

impl From<&str> for ErrorCode {
    fn from(code: &str) -> Self {
        match code {
            "AUTH_INVALID" => Self::AuthInvalid,
            "AUTH_LOCKED" => Self::AuthLocked,
            "AUTH_EXPIRED" => Self::AuthExpired,
            "VALIDATION_FAILED" => Self::ValidationFailed,
            "RATE_LIMIT" => Self::RateLimit,
            "SERVER_ERROR" => Self::ServerError,
            "UNKNOWN" => Self::Unknown,
            "REQUEST_CANCELLED" => Self::RequestCancelled,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for ErrorCode {
    fn from(code: String) -> Self {
        Self::from(code.as_str())
    }
}

impl From<ErrorCode> for String {
    fn from(code: ErrorCode) -> Self {
        code.as_str().to_string()
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// UI-ready error produced for every failed call.
///
/// `Display` is the message, so callers can show the error as-is.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{message}")]
pub struct NormalizedError {
    pub code: ErrorCode,
    /// HTTP status, `0` when no response arrived.
    pub status: u16,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// Informative only; the transport already retried what it could.
    pub retryable: bool,
    #[serde(skip)]
    pub retry_after: Option<Duration>,
}

impl NormalizedError {
    pub fn new(code: ErrorCode, status: u16, message: impl Into<String>) -> Self {
        let retryable = Self::status_is_retryable(status) || code == ErrorCode::RequestCancelled;
        Self { code, status, message: message.into(), details: None, retryable, retry_after: None }
    }

    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Transient statuses: no response, throttled, server-side.
    pub const fn status_is_retryable(status: u16) -> bool {
        matches!(status, 0 | 429 | 500..=599)
    }

    pub fn is_cancelled(&self) -> bool {
        self.code == ErrorCode::RequestCancelled
    }

    pub fn is_auth_failure(&self) -> bool {
        self.status == 401
            || matches!(
                self.code,
                ErrorCode::AuthExpired | ErrorCode::AuthInvalid | ErrorCode::AuthLocked
            )
    }
}

impl ErrorClassification for NormalizedError {
    fn is_retryable(&self) -> bool {
        self.retryable
    }

    fn severity(&self) -> ErrorSeverity {
        match self.status {
            _ if self.is_cancelled() => ErrorSeverity::Info,
            0 | 500..=599 => ErrorSeverity::Error,
            _ => ErrorSeverity::Warning,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }
}
