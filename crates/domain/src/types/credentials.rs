//! Credential bundle held by the session store.

use serde::{Deserialize, Serialize};

/// Access/refresh token pair with its expiry and CSRF token.
///
/// The bundle is a value: the store swaps whole bundles, so a reader never
/// sees a token paired with another generation's expiry. Empty strings and a
/// zero `expires_at` mean "absent".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialBundle {
    pub access_token: String,
    pub refresh_token: String,
    /// Epoch milliseconds, `0` when unknown.
    pub expires_at: u64,
    pub csrf_token: String,
}

impl CredentialBundle {
    /// Bundle with no credentials at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a bundle for freshly issued tokens.
    ///
    /// A non-empty access token always gets a non-zero expiry: without one
    /// the token is treated as expiring at `now_ms`.
    pub fn issued(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_at: Option<u64>,
        csrf_token: impl Into<String>,
        now_ms: u64,
    ) -> Self {
        let access_token = access_token.into();
        let expires_at = match expires_at {
            Some(at) if at > 0 => at,
            _ if access_token.is_empty() => 0,
            _ => now_ms.max(1),
        };
        Self {
            access_token,
            refresh_token: refresh_token.into(),
            expires_at,
            csrf_token: csrf_token.into(),
        }
    }

    pub fn has_access_token(&self) -> bool {
        !self.access_token.is_empty()
    }

    pub fn has_refresh_token(&self) -> bool {
        !self.refresh_token.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.access_token.is_empty()
            && self.refresh_token.is_empty()
            && self.expires_at == 0
            && self.csrf_token.is_empty()
    }

    /// `true` when there is no usable token at `now_ms`.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        !self.has_access_token() || self.expires_at == 0 || now_ms >= self.expires_at
    }

    /// Copy of this bundle with a different CSRF token.
    #[must_use]
    pub fn with_csrf_token(&self, csrf_token: impl Into<String>) -> Self {
        Self { csrf_token: csrf_token.into(), ..self.clone() }
    }

    /// Owned, non-empty CSRF token.
    pub fn csrf(&self) -> Option<String> {
        (!self.csrf_token.is_empty()).then(|| self.csrf_token.clone())
    }
}
