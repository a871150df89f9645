//! Typed events broadcast by the transport.

use serde::{Deserialize, Serialize};

use super::credentials::CredentialBundle;
use super::failure::NormalizedError;

/// Cross-cutting signals external state containers listen to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum AuthEvent {
    /// `true` while at least one request is in flight.
    LoadingChanged(bool),
    Error(NormalizedError),
    TokenRefreshed(CredentialBundle),
    TokenExpired,
}

impl AuthEvent {
    /// Stable event name, as used in logs.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::LoadingChanged(_) => "http:loading",
            Self::Error(_) => "http:error",
            Self::TokenRefreshed(_) => "auth:token-refreshed",
            Self::TokenExpired => "auth:token-expired",
        }
    }
}
