use std::sync::Arc;

use authwire_common::time::Clock;
use authwire_domain::constants::{
    LOGIN_FAILED_MESSAGE, LOGIN_PATH, LOGOUT_FAILED_MESSAGE, LOGOUT_PATH, REGISTER_FAILED_MESSAGE,
    REGISTER_PATH,
};
use authwire_domain::{
    AuthPayload, AuthSession, CredentialBundle, ErrorCode, LoginCredentials, NormalizedError,
    RequestDescriptor,
};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::store::CredentialStore;
use crate::refresh::RefreshCoordinator;
use crate::transport::{HttpTransport, ResponseCache};

/// Login, registration and logout on top of [`HttpTransport`].
///
/// Token-issuing responses are parsed with [`AuthPayload`] and land in the
/// [`CredentialStore`] as one bundle.
pub struct AuthService {
    transport: Arc<HttpTransport>,
    store: Arc<CredentialStore>,
    coordinator: Arc<RefreshCoordinator>,
    clock: Arc<dyn Clock>,
    cache: Option<Arc<dyn ResponseCache>>,
}

impl AuthService {
    pub fn new(transport: Arc<HttpTransport>, clock: Arc<dyn Clock>) -> Self {
        let store = Arc::clone(transport.store());
        let coordinator = Arc::clone(transport.coordinator());
        Self { transport, store, coordinator, clock, cache: None }
    }

    /// Cache emptied on logout.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub async fn login(
        &self,
        credentials: &LoginCredentials,
    ) -> Result<AuthSession, NormalizedError> {
        let descriptor = RequestDescriptor::post(LOGIN_PATH)
            .with_json(credentials.to_payload())
            .skip_auth_refresh()
            .suppress_error_event()
            .with_fallback_message(LOGIN_FAILED_MESSAGE);

        let raw = self.transport.send(descriptor).await.inspect_err(|err| {
            warn!(code = %err.code, status = err.status, "login rejected");
        })?;

        let mut hints = Map::new();
        if let Some(username) = credentials.username() {
            hints.insert("username".into(), Value::from(username));
        }
        let session = self.establish(&raw, &hints).ok_or_else(|| {
            warn!("login response carried no access token");
            NormalizedError::new(ErrorCode::Unknown, 200, LOGIN_FAILED_MESSAGE)
        })?;
        info!(expires_at = session.credentials.expires_at, "logged in");
        Ok(session)
    }

    /// Register an account. Tokens in the response, if any, start a session.
    pub async fn register(&self, payload: Value) -> Result<AuthSession, NormalizedError> {
        let mut hints = Map::new();
        for key in ["username", "phone", "email"] {
            if let Some(value) = payload.get(key).filter(|v| v.is_string()) {
                hints.insert(key.to_string(), value.clone());
            }
        }

        let descriptor = RequestDescriptor::post(REGISTER_PATH)
            .with_json(payload)
            .skip_auth_refresh()
            .with_fallback_message(REGISTER_FAILED_MESSAGE);
        let raw = self.transport.send(descriptor).await?;

        Ok(self.establish(&raw, &hints).unwrap_or_else(|| {
            debug!("registration returned no tokens");
            AuthSession {
                credentials: self.store.read(),
                user: AuthPayload::from_value(&raw).infer_user(&hints),
            }
        }))
    }

    /// End the session.
    ///
    /// The server call is best-effort: local credentials and cached
    /// responses are dropped whatever it returns. A server failure is still
    /// reported to the caller afterwards.
    pub async fn logout(&self) -> Result<(), NormalizedError> {
        let descriptor = RequestDescriptor::post(LOGOUT_PATH)
            .skip_auth_refresh()
            .with_fallback_message(LOGOUT_FAILED_MESSAGE);
        let outcome = self.transport.send(descriptor).await;

        self.store.clear();
        if let Some(cache) = &self.cache {
            cache.clear().await;
        }

        match outcome {
            Ok(_) => {
                info!("logged out");
                Ok(())
            }
            Err(err) => {
                warn!(
                    code = %err.code,
                    status = err.status,
                    "logout call failed, local session cleared anyway"
                );
                Err(err)
            }
        }
    }

    /// Make a restored session usable, refreshing an expired access token.
    ///
    /// Returns `Ok(false)` when there is no session to restore. A failed
    /// refresh has already ended the session when the error comes back.
    pub async fn restore_session(&self) -> Result<bool, NormalizedError> {
        let current = self.store.read();
        if !current.has_access_token() && !current.has_refresh_token() {
            return Ok(false);
        }
        if !current.is_expired(self.clock.millis_since_epoch()) {
            debug!(expires_at = current.expires_at, "restored session still valid");
            return Ok(true);
        }
        info!("restored session expired, refreshing");
        self.coordinator.ensure_fresh_token().await.map(|_| true)
    }

    pub fn is_authenticated(&self) -> bool {
        self.store.is_authenticated()
    }

    pub fn credentials(&self) -> CredentialBundle {
        self.store.read()
    }

    fn establish(&self, raw: &Value, hints: &Map<String, Value>) -> Option<AuthSession> {
        let payload = AuthPayload::from_value(raw);
        // A new session never inherits the previous session's refresh token;
        // only a CSRF token the server just set is kept.
        let csrf_token = self.store.read().csrf_token;
        let previous = CredentialBundle { csrf_token, ..CredentialBundle::empty() };
        let credentials = payload.into_bundle(&previous, self.clock.millis_since_epoch())?;
        self.store.write(credentials.clone());
        Some(AuthSession { credentials, user: payload.infer_user(hints) })
    }
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("authenticated", &self.is_authenticated())
            .field("cache", &self.cache.is_some())
            .finish_non_exhaustive()
    }
}
