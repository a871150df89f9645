use std::sync::Arc;

use authwire_domain::constants::{
    ACCESS_TOKEN_KEY, CSRF_COOKIE, CSRF_TOKEN_KEY, EXPIRES_AT_KEY, REFRESH_TOKEN_KEY,
};
use authwire_domain::CredentialBundle;
use parking_lot::RwLock;
use tracing::{debug, warn};

use super::ports::{CookieSource, SessionStorage};

/// Holds the current [`CredentialBundle`] and mirrors it into session storage.
///
/// Reads come from an in-memory snapshot. Every write replaces the whole
/// snapshot under the write lock, so a reader sees either the old bundle or
/// the new one and never a mix. Storage failures are logged and do not stop
/// the snapshot from advancing: the session keeps working, it just will not
/// survive a reload.
pub struct CredentialStore {
    storage: Arc<dyn SessionStorage>,
    current: RwLock<CredentialBundle>,
}

impl CredentialStore {
    /// Create a store, hydrating from whatever the session already holds.
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        let current = load_bundle(storage.as_ref());
        if current.has_access_token() {
            debug!(expires_at = current.expires_at, "restored credentials from session storage");
        }
        Self { storage, current: RwLock::new(current) }
    }

    pub fn read(&self) -> CredentialBundle {
        self.current.read().clone()
    }

    /// Replace all four fields at once.
    pub fn write(&self, bundle: CredentialBundle) {
        let mut current = self.current.write();
        persist_bundle(self.storage.as_ref(), &bundle);
        *current = bundle;
    }

    pub fn clear(&self) {
        self.write(CredentialBundle::empty());
    }

    pub fn access_token(&self) -> Option<String> {
        let current = self.current.read();
        current.has_access_token().then(|| current.access_token.clone())
    }

    pub fn refresh_token(&self) -> Option<String> {
        let current = self.current.read();
        current.has_refresh_token().then(|| current.refresh_token.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.current.read().has_access_token()
    }

    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.current.read().is_expired(now_ms)
    }

    /// Store a CSRF token rotated by the server, keeping the other fields.
    pub fn update_csrf_token(&self, csrf_token: &str) {
        let mut current = self.current.write();
        if current.csrf_token == csrf_token {
            return;
        }
        let next = current.with_csrf_token(csrf_token);
        persist_bundle(self.storage.as_ref(), &next);
        *current = next;
    }

    /// CSRF token to send, falling back to the `csrf_token` cookie.
    ///
    /// A token found in the cookie is cached in the bundle so the cookie is
    /// only consulted while the store has none.
    pub fn csrf_token(&self, cookies: Option<&dyn CookieSource>) -> Option<String> {
        if let Some(token) = self.current.read().csrf() {
            return Some(token);
        }
        let token = cookies?.cookie(CSRF_COOKIE).filter(|token| !token.is_empty())?;
        debug!("caching CSRF token read from cookie");
        self.update_csrf_token(&token);
        Some(token)
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let current = self.current.read();
        f.debug_struct("CredentialStore")
            .field("authenticated", &current.has_access_token())
            .field("expires_at", &current.expires_at)
            .finish_non_exhaustive()
    }
}

fn load_bundle(storage: &dyn SessionStorage) -> CredentialBundle {
    let read = |key: &str| match storage.get(key) {
        Ok(value) => value.unwrap_or_default(),
        Err(err) => {
            warn!(key, error = %err, "failed to read credential from session storage");
            String::new()
        }
    };

    let access_token = read(ACCESS_TOKEN_KEY);
    let refresh_token = read(REFRESH_TOKEN_KEY);
    let csrf_token = read(CSRF_TOKEN_KEY);
    let expires_at = read(EXPIRES_AT_KEY).parse::<u64>().unwrap_or(0);

    // A token with no usable expiry is unusable; keep the refresh token so
    // the session can still be recovered.
    if !access_token.is_empty() && expires_at == 0 {
        warn!("stored access token has no expiry, discarding it");
        return CredentialBundle { refresh_token, csrf_token, ..CredentialBundle::empty() };
    }
    CredentialBundle { access_token, refresh_token, expires_at, csrf_token }
}

fn persist_bundle(storage: &dyn SessionStorage, bundle: &CredentialBundle) {
    let expires_at =
        if bundle.expires_at == 0 { String::new() } else { bundle.expires_at.to_string() };
    let changes = [
        (ACCESS_TOKEN_KEY, bundle.access_token.as_str()),
        (REFRESH_TOKEN_KEY, bundle.refresh_token.as_str()),
        (EXPIRES_AT_KEY, expires_at.as_str()),
        (CSRF_TOKEN_KEY, bundle.csrf_token.as_str()),
    ]
    .map(|(key, value)| (key, (!value.is_empty()).then_some(value)));

    if let Err(err) = storage.write_batch(&changes) {
        warn!(error = %err, "failed to persist credentials to session storage");
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use authwire_domain::{AuthWireError, Result};
    use parking_lot::Mutex;

    use super::*;

    #[derive(Default)]
    struct MapStorage {
        entries: Mutex<HashMap<String, String>>,
        fail_writes: bool,
    }

    impl SessionStorage for MapStorage {
        fn get(&self, key: &str) -> Result<Option<String>> {
            Ok(self.entries.lock().get(key).cloned())
        }

        fn set(&self, key: &str, value: &str) -> Result<()> {
            if self.fail_writes {
                return Err(AuthWireError::Storage("quota exceeded".into()));
            }
            self.entries.lock().insert(key.to_string(), value.to_string());
            Ok(())
        }

        fn remove(&self, key: &str) -> Result<()> {
            self.entries.lock().remove(key);
            Ok(())
        }
    }

    /// Records batches and refuses single-key writes.
    #[derive(Default)]
    struct BatchOnlyStorage {
        batches: Mutex<Vec<Vec<(String, Option<String>)>>>,
    }

    impl SessionStorage for BatchOnlyStorage {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Ok(None)
        }

        fn set(&self, key: &str, _value: &str) -> Result<()> {
            panic!("single-key set of {key}");
        }

        fn remove(&self, key: &str) -> Result<()> {
            panic!("single-key remove of {key}");
        }

        fn write_batch(&self, changes: &[(&str, Option<&str>)]) -> Result<()> {
            let batch = changes
                .iter()
                .map(|(key, value)| (key.to_string(), value.map(str::to_string)))
                .collect();
            self.batches.lock().push(batch);
            Ok(())
        }
    }

    struct FixedCookie(Option<&'static str>);

    impl CookieSource for FixedCookie {
        fn cookie(&self, name: &str) -> Option<String> {
            assert_eq!(name, "csrf_token");
            self.0.map(str::to_string)
        }
    }

    fn bundle() -> CredentialBundle {
        CredentialBundle::issued("access", "refresh", Some(9_000), "csrf", 1)
    }

    #[test]
    fn write_persists_all_four_keys() {
        let storage = Arc::new(MapStorage::default());
        let store = CredentialStore::new(storage.clone());

        store.write(bundle());

        let entries = storage.entries.lock();
        assert_eq!(entries.get("auth.token").map(String::as_str), Some("access"));
        assert_eq!(entries.get("auth.refreshToken").map(String::as_str), Some("refresh"));
        assert_eq!(entries.get("auth.expiresAt").map(String::as_str), Some("9000"));
        assert_eq!(entries.get("auth.csrfToken").map(String::as_str), Some("csrf"));
    }

    #[test]
    fn each_write_is_one_storage_batch() {
        let storage = Arc::new(BatchOnlyStorage::default());
        let store = CredentialStore::new(storage.clone());

        store.write(bundle());
        store.update_csrf_token("rotated");
        store.clear();

        let batches = storage.batches.lock();
        assert_eq!(batches.len(), 3);
        assert_eq!(
            batches[0],
            vec![
                ("auth.token".to_string(), Some("access".to_string())),
                ("auth.refreshToken".to_string(), Some("refresh".to_string())),
                ("auth.expiresAt".to_string(), Some("9000".to_string())),
                ("auth.csrfToken".to_string(), Some("csrf".to_string())),
            ]
        );
        assert_eq!(batches[1][3], ("auth.csrfToken".to_string(), Some("rotated".to_string())));
        assert!(batches[2].iter().all(|(_, value)| value.is_none()));
    }

    #[test]
    fn new_store_hydrates_from_storage() {
        let storage = Arc::new(MapStorage::default());
        CredentialStore::new(storage.clone()).write(bundle());

        let reloaded = CredentialStore::new(storage);
        assert_eq!(reloaded.read(), bundle());
        assert!(reloaded.is_authenticated());
    }

    #[test]
    fn hydration_drops_token_without_expiry() {
        let storage = Arc::new(MapStorage::default());
        storage.set("auth.token", "orphan").unwrap();
        storage.set("auth.refreshToken", "refresh").unwrap();

        let store = CredentialStore::new(storage);
        let current = store.read();
        assert!(!current.has_access_token());
        assert_eq!(current.refresh_token, "refresh");
    }

    #[test]
    fn clear_removes_every_key() {
        let storage = Arc::new(MapStorage::default());
        let store = CredentialStore::new(storage.clone());
        store.write(bundle());

        store.clear();

        assert!(storage.entries.lock().is_empty());
        assert!(store.read().is_empty());
        assert_eq!(store.refresh_token(), None);
    }

    #[test]
    fn storage_failure_still_updates_snapshot() {
        let storage = Arc::new(MapStorage { fail_writes: true, ..MapStorage::default() });
        let store = CredentialStore::new(storage);

        store.write(bundle());

        assert_eq!(store.access_token().as_deref(), Some("access"));
    }

    #[test]
    fn update_csrf_token_keeps_tokens() {
        let store = CredentialStore::new(Arc::new(MapStorage::default()));
        store.write(bundle());

        store.update_csrf_token("rotated");

        let current = store.read();
        assert_eq!(current.csrf_token, "rotated");
        assert_eq!(current.access_token, "access");
        assert_eq!(current.expires_at, 9_000);
    }

    #[test]
    fn csrf_token_falls_back_to_cookie_and_caches_it() {
        let store = CredentialStore::new(Arc::new(MapStorage::default()));

        assert_eq!(store.csrf_token(Some(&FixedCookie(Some("from-cookie")))), Some("from-cookie".into()));
        // Cached now, the cookie source is no longer consulted.
        assert_eq!(store.csrf_token(Some(&FixedCookie(None))), Some("from-cookie".into()));
        assert_eq!(store.read().csrf_token, "from-cookie");
    }

    #[test]
    fn csrf_token_absent_everywhere() {
        let store = CredentialStore::new(Arc::new(MapStorage::default()));
        assert_eq!(store.csrf_token(None), None);
        assert_eq!(store.csrf_token(Some(&FixedCookie(Some("")))), None);
    }
}
