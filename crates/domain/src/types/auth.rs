//! Login payloads and tolerant parsing of token-issuing responses.
//!
//! Token endpoints are not consistent about envelope or casing: the fields
//! may sit at the top level or under `data`, in camelCase or snake_case, and
//! `expiresIn` may arrive as a number or a numeric string. [`AuthPayload`]
//! flattens all of that before anything touches the credential store.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::credentials::CredentialBundle;

/// Credentials submitted to the login endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginCredentials {
    /// Username, email or phone; used when `username` is absent.
    pub identifier: Option<String>,
    pub username: Option<String>,
    pub password: String,
    /// Client-side only, never sent.
    pub remember: bool,
}

impl LoginCredentials {
    pub fn new(identifier: impl Into<String>, password: impl Into<String>) -> Self {
        Self { identifier: Some(identifier.into()), password: password.into(), ..Self::default() }
    }

    /// Name the server will see.
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref().filter(|u| !u.is_empty()).or(self.identifier.as_deref())
    }

    /// Wire body: `identifier` folded into `username`, `remember` dropped.
    pub fn to_payload(&self) -> Value {
        json!({ "username": self.username(), "password": self.password })
    }
}

/// Token fields extracted from an auth response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthPayload {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    /// Seconds.
    pub expires_in: Option<u64>,
    /// Epoch milliseconds, wins over `expires_in`.
    pub expires_at: Option<u64>,
    pub csrf_token: Option<String>,
    pub user: Option<Value>,
    profile: Map<String, Value>,
}

impl AuthPayload {
    pub fn from_value(raw: &Value) -> Self {
        let outer = raw.as_object();
        let inner = outer.and_then(|o| o.get("data")).and_then(Value::as_object).or(outer);

        let pick_str = |keys: &[&str], outer_key: &str| {
            inner
                .and_then(|o| first_str(o, keys))
                .or_else(|| outer.and_then(|o| first_str(o, &[outer_key])))
        };

        let access_token = pick_str(&["token", "accessToken", "access_token"], "token");
        let refresh_token = pick_str(&["refreshToken", "refresh_token"], "refreshToken");
        let csrf_token = pick_str(&["csrfToken", "csrf_token"], "csrfToken");
        let expires_in = inner
            .and_then(|o| first_u64(o, &["expiresIn", "expires_in"]))
            .or_else(|| outer.and_then(|o| first_u64(o, &["expiresIn"])));
        let expires_at = inner.and_then(|o| first_u64(o, &["expiresAt", "expires_at"]));
        let user = inner
            .and_then(|o| o.get("user"))
            .or_else(|| outer.and_then(|o| o.get("user")))
            .filter(|u| u.is_object())
            .cloned();

        let mut profile = Map::new();
        for key in ["username", "role", "phone", "email"] {
            let value = inner
                .and_then(|o| o.get(key))
                .or_else(|| outer.and_then(|o| o.get(key)))
                .filter(|v| v.as_str().is_some_and(|s| !s.is_empty()));
            if let Some(value) = value {
                profile.insert(key.to_string(), value.clone());
            }
        }

        Self { access_token, refresh_token, expires_in, expires_at, csrf_token, user, profile }
    }

    /// Absolute expiry in epoch milliseconds, if the response told us.
    pub fn resolve_expires_at(&self, now_ms: u64) -> Option<u64> {
        self.expires_at
            .filter(|at| *at > 0)
            .or_else(|| {
                self.expires_in.map(|secs| now_ms.saturating_add(secs.saturating_mul(1000)))
            })
    }

    /// Build the next credential bundle.
    ///
    /// Fields the response omitted carry over from `previous`, except the
    /// expiry which always belongs to the new access token. Returns `None`
    /// when the response carried no access token.
    pub fn into_bundle(
        &self,
        previous: &CredentialBundle,
        now_ms: u64,
    ) -> Option<CredentialBundle> {
        let access_token = self.access_token.as_deref()?;
        let refresh_token = self.refresh_token.as_deref().unwrap_or(&previous.refresh_token);
        let csrf_token = self.csrf_token.as_deref().unwrap_or(&previous.csrf_token);
        Some(CredentialBundle::issued(
            access_token,
            refresh_token,
            self.resolve_expires_at(now_ms),
            csrf_token,
            now_ms,
        ))
    }

    /// User object from the response, or one synthesized from profile fields.
    ///
    /// `hints` fill in fields the response does not carry (for example the
    /// username that was just submitted).
    pub fn infer_user(&self, hints: &Map<String, Value>) -> Option<Value> {
        if let Some(user) = &self.user {
            return Some(user.clone());
        }
        let mut merged = Map::new();
        for key in ["username", "role", "phone", "email"] {
            let value = hints
                .get(key)
                .filter(|v| v.as_str().is_some_and(|s| !s.is_empty()))
                .or_else(|| self.profile.get(key))
                .cloned()
                .unwrap_or(Value::Null);
            merged.insert(key.to_string(), value);
        }
        let identified = ["username", "email"].iter().any(|key| !merged[*key].is_null());
        identified.then_some(Value::Object(merged))
    }
}

/// Outcome of a successful login or registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub credentials: CredentialBundle,
    pub user: Option<Value>,
}

fn first_str(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| object.get(*key).and_then(Value::as_str))
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

fn first_u64(object: &Map<String, Value>, keys: &[&str]) -> Option<u64> {
    keys.iter().filter_map(|key| object.get(*key)).find_map(|value| match value {
        Value::Number(n) => {
            n.as_u64().or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
        }
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    })
}
