//! Maps transport failures onto [`NormalizedError`].
//!
//! [`classify`] is the pure mapping. [`ErrorNormalizer`] wraps it with the
//! two side effects every surfaced failure gets: logging of server-side and
//! connectivity failures, and a broadcast on the event bus unless the
//! request opted out.

use std::sync::Arc;

use authwire_domain::constants::{
    LOGIN_CREDENTIALS_MESSAGE, LOGIN_PATH, NETWORK_ERROR_MESSAGE, REQUEST_CANCELLED_MESSAGE,
};
use authwire_domain::{AuthEvent, ErrorCode, NormalizedError, TransportFailure};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::events::EventBus;

/// Where a failure came from and how it should be surfaced.
#[derive(Debug, Clone, Copy)]
pub struct FailureContext<'a> {
    pub url: &'a str,
    pub fallback_message: &'a str,
    pub suppress_event: bool,
}

/// Pure mapping from a failure to the caller-facing error.
pub fn classify(failure: &TransportFailure, url: &str, fallback_message: &str) -> NormalizedError {
    let (status, body, retry_after) = match failure {
        TransportFailure::Cancelled => {
            return NormalizedError::new(ErrorCode::RequestCancelled, 0, REQUEST_CANCELLED_MESSAGE);
        }
        TransportFailure::Network { .. } => (0, None, None),
        TransportFailure::Response { status, body, retry_after } => {
            (*status, body.as_ref(), *retry_after)
        }
    };

    let payload = body.and_then(Value::as_object);
    let server_code =
        payload.and_then(|p| p.get("code")).and_then(Value::as_str).filter(|c| !c.is_empty());
    let server_message = payload
        .and_then(|p| p.get("message"))
        .and_then(Value::as_str)
        .filter(|m| !m.trim().is_empty());

    let code = server_code.map_or_else(|| ErrorCode::from_status(status), ErrorCode::from);

    let message = if status == 401 && url.contains(LOGIN_PATH) {
        LOGIN_CREDENTIALS_MESSAGE
    } else if let Some(message) = server_message {
        message
    } else if let Some(canned) = code.canned_message() {
        canned
    } else if status == 0 {
        NETWORK_ERROR_MESSAGE
    } else {
        fallback_message
    };

    let mut normalized = NormalizedError::new(code, status, message);
    if let Some(details) = payload.and_then(|p| p.get("errors")).filter(|d| !d.is_null()) {
        normalized = normalized.with_details(details.clone());
    }
    normalized.retry_after = retry_after;
    normalized
}

/// Normalizes failures and reports them.
#[derive(Debug, Clone)]
pub struct ErrorNormalizer {
    bus: Arc<EventBus>,
}

impl ErrorNormalizer {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }

    pub fn normalize(
        &self,
        failure: &TransportFailure,
        context: FailureContext<'_>,
    ) -> NormalizedError {
        let normalized = classify(failure, context.url, context.fallback_message);

        if normalized.is_cancelled() {
            debug!(url = context.url, "request cancelled");
            return normalized;
        }

        match failure {
            TransportFailure::Network { message } => {
                warn!(
                    url = context.url,
                    cause = %message,
                    code = %normalized.code,
                    "request failed without a response"
                );
            }
            TransportFailure::Response { status, .. } if *status >= 500 => {
                error!(
                    url = context.url,
                    status,
                    code = %normalized.code,
                    message = %normalized.message,
                    "server error"
                );
            }
            _ => {
                debug!(
                    url = context.url,
                    status = normalized.status,
                    code = %normalized.code,
                    "request failed"
                );
            }
        }

        if !context.suppress_event {
            self.bus.publish(AuthEvent::Error(normalized.clone()));
        }
        normalized
    }
}
