//! Composition root
//!
//! One [`ClientContext`] per session: a single event bus, credential store,
//! refresh coordinator, transport and auth service, wired together once
//! and handed out by `Arc`. Two contexts never share credentials or
//! refresh state.

use std::sync::Arc;

use authwire_common::time::{Clock, SystemClock};
use authwire_core::{
    AuthService, CredentialStore, EventBus, HttpExecutor, HttpTransport, RefreshCoordinator,
    SessionStorage,
};
use authwire_domain::constants::REFRESH_PATH;
use authwire_domain::{ClientConfig, Result};
use tracing::info;

use crate::cache::{MokaResponseCache, ResponseCacheConfig};
use crate::http::{CsrfCookieJar, ReqwestExecutor};
use crate::storage::MemorySessionStorage;

pub struct ClientContext {
    config: ClientConfig,
    bus: Arc<EventBus>,
    store: Arc<CredentialStore>,
    coordinator: Arc<RefreshCoordinator>,
    transport: Arc<HttpTransport>,
    auth: Arc<AuthService>,
    cache: Arc<MokaResponseCache>,
    cookies: Arc<CsrfCookieJar>,
}

impl ClientContext {
    /// Context with in-memory session storage and the reqwest executor.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    /// Context configured by [`crate::config::load`].
    pub fn from_env() -> Result<Self> {
        Self::new(crate::config::load()?)
    }

    pub fn builder(config: ClientConfig) -> ClientContextBuilder {
        ClientContextBuilder::new(config)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }

    pub fn transport(&self) -> &Arc<HttpTransport> {
        &self.transport
    }

    pub fn auth(&self) -> &Arc<AuthService> {
        &self.auth
    }

    pub fn cache(&self) -> &Arc<MokaResponseCache> {
        &self.cache
    }

    pub fn cookies(&self) -> &Arc<CsrfCookieJar> {
        &self.cookies
    }
}

impl std::fmt::Debug for ClientContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientContext")
            .field("api_base_url", &self.config.api_base_url)
            .field("authenticated", &self.store.is_authenticated())
            .finish_non_exhaustive()
    }
}

/// Builder for [`ClientContext`].
pub struct ClientContextBuilder {
    config: ClientConfig,
    storage: Option<Arc<dyn SessionStorage>>,
    executor: Option<Arc<dyn HttpExecutor>>,
    clock: Option<Arc<dyn Clock>>,
    cache_config: ResponseCacheConfig,
}

impl ClientContextBuilder {
    fn new(config: ClientConfig) -> Self {
        Self {
            config,
            storage: None,
            executor: None,
            clock: None,
            cache_config: ResponseCacheConfig::default(),
        }
    }

    /// Where credentials persist; defaults to process memory.
    pub fn storage(mut self, storage: Arc<dyn SessionStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Replace the reqwest executor. Cookies are then only captured if the
    /// replacement does it.
    pub fn executor(mut self, executor: Arc<dyn HttpExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn cache_config(mut self, cache_config: ResponseCacheConfig) -> Self {
        self.cache_config = cache_config;
        self
    }

    /// # Errors
    /// Returns `AuthWireError::Config` if the configuration is invalid or
    /// the HTTP client cannot be built.
    pub fn build(self) -> Result<ClientContext> {
        let config = self.config.validated()?;
        let cookies = Arc::new(CsrfCookieJar::new());

        let executor: Arc<dyn HttpExecutor> = match self.executor {
            Some(executor) => executor,
            None => Arc::new(ReqwestExecutor::from_config(&config, Arc::clone(&cookies))?),
        };
        let clock: Arc<dyn Clock> = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let storage: Arc<dyn SessionStorage> =
            self.storage.unwrap_or_else(|| Arc::new(MemorySessionStorage::new()));

        let bus = Arc::new(EventBus::new());
        let store = Arc::new(CredentialStore::new(storage));
        let coordinator = Arc::new(RefreshCoordinator::new(
            Arc::clone(&executor),
            Arc::clone(&store),
            Arc::clone(&bus),
            Arc::clone(&clock),
            config.resolve_url(REFRESH_PATH),
            config.refresh_timeout(),
        ));
        let transport = Arc::new(
            HttpTransport::new(
                executor,
                Arc::clone(&store),
                Arc::clone(&coordinator),
                Arc::clone(&bus),
                config.clone(),
            )
            .with_cookie_source(cookies.clone()),
        );
        let cache = Arc::new(MokaResponseCache::with_clock(self.cache_config, Arc::clone(&clock)));
        let auth = Arc::new(
            AuthService::new(Arc::clone(&transport), clock).with_cache(cache.clone()),
        );

        info!(
            api_base_url = %config.api_base_url,
            authenticated = store.is_authenticated(),
            "client context ready"
        );

        Ok(ClientContext { config, bus, store, coordinator, transport, auth, cache, cookies })
    }
}

#[cfg(test)]
mod tests {
    use authwire_domain::{AuthWireError, CredentialBundle};

    use super::*;

    #[test]
    fn invalid_config_is_rejected() {
        let err = ClientContext::new(ClientConfig::with_base_url("")).unwrap_err();
        assert!(matches!(err, AuthWireError::Config(_)));
    }

    #[test]
    fn contexts_do_not_share_credentials() {
        let first = ClientContext::new(ClientConfig::with_base_url("http://a.test")).unwrap();
        let second = ClientContext::new(ClientConfig::with_base_url("http://a.test")).unwrap();

        first.credentials().write(CredentialBundle::issued("t", "r", Some(u64::MAX), "", 0));

        assert!(first.credentials().is_authenticated());
        assert!(!second.credentials().is_authenticated());
    }

    #[test]
    fn hydrates_from_provided_storage() {
        let storage = Arc::new(MemorySessionStorage::new());
        storage.set("auth.token", "persisted").unwrap();
        storage.set("auth.expiresAt", "99").unwrap();

        let context = ClientContext::builder(ClientConfig::default())
            .storage(storage)
            .build()
            .unwrap();

        assert_eq!(context.credentials().access_token().as_deref(), Some("persisted"));
    }
}
