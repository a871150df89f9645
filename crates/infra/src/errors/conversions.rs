//! Conversions from external infrastructure errors into authwire errors.

use authwire_domain::{AuthWireError, TransportFailure};
use reqwest::Error as HttpError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub AuthWireError);

impl From<InfraError> for AuthWireError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<AuthWireError> for InfraError {
    fn from(value: AuthWireError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoAuthWireError {
    fn into_authwire(self) -> AuthWireError;
}

/* -------------------------------------------------------------------------- */
/* std::io::Error → AuthWireError */
/* -------------------------------------------------------------------------- */

impl IntoAuthWireError for std::io::Error {
    fn into_authwire(self) -> AuthWireError {
        match self.kind() {
            std::io::ErrorKind::PermissionDenied => {
                AuthWireError::Storage(format!("permission denied: {self}"))
            }
            std::io::ErrorKind::NotFound => AuthWireError::Storage(format!("not found: {self}")),
            _ => AuthWireError::Storage(self.to_string()),
        }
    }
}

impl From<std::io::Error> for InfraError {
    fn from(value: std::io::Error) -> Self {
        InfraError(value.into_authwire())
    }
}

/* -------------------------------------------------------------------------- */
/* toml::de::Error → AuthWireError */
/* -------------------------------------------------------------------------- */

impl IntoAuthWireError for toml::de::Error {
    fn into_authwire(self) -> AuthWireError {
        AuthWireError::Config(format!("Invalid TOML format: {}", self.message()))
    }
}

impl From<toml::de::Error> for InfraError {
    fn from(value: toml::de::Error) -> Self {
        InfraError(value.into_authwire())
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → AuthWireError / TransportFailure */
/* -------------------------------------------------------------------------- */

impl IntoAuthWireError for HttpError {
    fn into_authwire(self) -> AuthWireError {
        if self.is_builder() {
            return AuthWireError::Config(format!("invalid HTTP client settings: {self}"));
        }
        AuthWireError::Internal(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_authwire())
    }
}

/// Map a failed exchange to the transport's input type.
///
/// Anything that kept a response from arriving is a network failure;
/// status codes never reach this function because the executor does not
/// call `error_for_status`.
pub fn transport_failure(err: &HttpError) -> TransportFailure {
    if err.is_timeout() {
        return TransportFailure::network("HTTP request timed out");
    }

    #[cfg(not(target_arch = "wasm32"))]
    if err.is_connect() {
        return TransportFailure::network("HTTP connection failure");
    }

    if err.is_decode() || err.is_body() {
        return TransportFailure::network(format!("failed to read response body: {err}"));
    }

    TransportFailure::network(err.to_string())
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
