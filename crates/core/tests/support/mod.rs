//! Shared test helpers for `authwire-core` integration tests.
//!
//! [`ScriptedExecutor`] stands in for the network: each path gets a
//! responder closure, every request is recorded, and a path can be held
//! behind a [`Gate`] so tests control exactly when a response arrives.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use authwire_common::time::MockClock;
use authwire_core::{
    AuthService, CookieSource, CredentialStore, EventBus, HttpExecutor, HttpTransport,
    RefreshCoordinator, ResponseCache, SessionStorage,
};
use authwire_domain::constants::REFRESH_PATH;
use authwire_domain::{
    AuthEvent, ClientConfig, CredentialBundle, OutboundRequest, Result, TransportFailure,
    TransportResponse,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::Semaphore;

pub const BASE_URL: &str = "http://api.test";
pub const NOW_MS: u64 = 1_700_000_000_000;

pub type Reply = std::result::Result<TransportResponse, TransportFailure>;
type Responder = Arc<dyn Fn(&OutboundRequest) -> Reply + Send + Sync>;

/// Holds responses for a path until released.
#[derive(Clone)]
pub struct Gate(Arc<Semaphore>);

impl Gate {
    pub fn release(&self) {
        self.0.add_permits(1_000);
    }
}

#[derive(Default)]
pub struct ScriptedExecutor {
    routes: Mutex<HashMap<String, Responder>>,
    gates: Mutex<HashMap<String, Gate>>,
    log: Mutex<Vec<OutboundRequest>>,
}

impl ScriptedExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn route<F>(&self, path: &str, responder: F)
    where
        F: Fn(&OutboundRequest) -> Reply + Send + Sync + 'static,
    {
        self.routes.lock().insert(path.to_string(), Arc::new(responder));
    }

    /// Responses for `path` wait until the returned gate is released.
    pub fn hold(&self, path: &str) -> Gate {
        let gate = Gate(Arc::new(Semaphore::new(0)));
        self.gates.lock().insert(path.to_string(), gate.clone());
        gate
    }

    pub fn requests(&self) -> Vec<OutboundRequest> {
        self.log.lock().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<OutboundRequest> {
        self.requests().into_iter().filter(|r| path_of(&r.url) == path).collect()
    }

    pub fn count(&self, path: &str) -> usize {
        self.requests_to(path).len()
    }
}

#[async_trait]
impl HttpExecutor for ScriptedExecutor {
    async fn execute(&self, request: OutboundRequest) -> Reply {
        let path = path_of(&request.url).to_string();
        self.log.lock().push(request.clone());

        let gate = self.gates.lock().get(&path).cloned();
        if let Some(gate) = gate {
            let _permit = gate.0.acquire().await.map_err(|_| TransportFailure::Cancelled)?;
        }
        // Yield once so concurrent callers interleave like real I/O.
        tokio::task::yield_now().await;

        let responder = self.routes.lock().get(&path).cloned();
        match responder {
            Some(responder) => responder(&request),
            None => Ok(TransportResponse::new(404).with_body(json!({"message": "no route"}))),
        }
    }
}

pub fn path_of(url: &str) -> &str {
    url.strip_prefix(BASE_URL).unwrap_or(url)
}

pub fn bearer(request: &OutboundRequest) -> Option<&str> {
    request.headers.get("authorization")
}

/// 200 with `body` when the bearer token matches `token`, 401 otherwise.
pub fn requires_token(token: &'static str, body: Value) -> impl Fn(&OutboundRequest) -> Reply {
    let expected = format!("Bearer {token}");
    move |request| {
        if bearer(request) == Some(expected.as_str()) {
            Ok(TransportResponse::new(200).with_body(body.clone()))
        } else {
            Ok(TransportResponse::new(401).with_body(json!({"code": "AUTH_EXPIRED"})))
        }
    }
}

/// Refresh endpoint issuing `token`.
pub fn issues_token(token: &'static str) -> impl Fn(&OutboundRequest) -> Reply {
    move |_| {
        Ok(TransportResponse::new(200).with_body(json!({
            "token": token,
            "refreshToken": format!("{token}-refresh"),
            "expiresIn": 3600
        })))
    }
}

#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.entries.lock().clone()
    }
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

#[derive(Default)]
pub struct StaticCookies(Mutex<HashMap<String, String>>);

impl StaticCookies {
    pub fn set(&self, name: &str, value: &str) {
        self.0.lock().insert(name.to_string(), value.to_string());
    }
}

impl CookieSource for StaticCookies {
    fn cookie(&self, name: &str) -> Option<String> {
        self.0.lock().get(name).cloned()
    }
}

#[derive(Default)]
pub struct MapCache {
    entries: Mutex<HashMap<String, Value>>,
}

impl MapCache {
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

#[async_trait]
impl ResponseCache for MapCache {
    async fn get(&self, key: &str) -> Option<Value> {
        self.entries.lock().get(key).cloned()
    }

    async fn set(&self, key: &str, value: Value, _ttl: Option<Duration>) {
        self.entries.lock().insert(key.to_string(), value);
    }

    async fn remove(&self, key: &str) {
        self.entries.lock().remove(key);
    }

    async fn clear(&self) {
        self.entries.lock().clear();
    }
}

/// Records every published event.
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<AuthEvent>>>);

impl EventLog {
    pub fn attach(bus: &EventBus) -> Self {
        let log = Self::default();
        let sink = Arc::clone(&log.0);
        bus.subscribe(Arc::new(move |event: &AuthEvent| sink.lock().push(event.clone())));
        log
    }

    pub fn events(&self) -> Vec<AuthEvent> {
        self.0.lock().clone()
    }

    pub fn count(&self, predicate: impl Fn(&AuthEvent) -> bool) -> usize {
        self.0.lock().iter().filter(|e| predicate(e)).count()
    }

    pub fn expired_count(&self) -> usize {
        self.count(|e| matches!(e, AuthEvent::TokenExpired))
    }

    pub fn refreshed_count(&self) -> usize {
        self.count(|e| matches!(e, AuthEvent::TokenRefreshed(_)))
    }

    pub fn error_count(&self) -> usize {
        self.count(|e| matches!(e, AuthEvent::Error(_)))
    }
}

/// Fully wired client over a [`ScriptedExecutor`].
pub struct Harness {
    pub executor: Arc<ScriptedExecutor>,
    pub storage: Arc<MemoryStorage>,
    pub cookies: Arc<StaticCookies>,
    pub clock: MockClock,
    pub bus: Arc<EventBus>,
    pub store: Arc<CredentialStore>,
    pub coordinator: Arc<RefreshCoordinator>,
    pub transport: Arc<HttpTransport>,
    pub auth: AuthService,
    pub events: EventLog,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_storage(Arc::new(MemoryStorage::default()))
    }

    pub fn with_storage(storage: Arc<MemoryStorage>) -> Self {
        let executor = ScriptedExecutor::new();
        let cookies = Arc::new(StaticCookies::default());
        let clock = MockClock::at_millis(NOW_MS);
        let bus = Arc::new(EventBus::new());
        let events = EventLog::attach(&bus);
        let config = ClientConfig::with_base_url(BASE_URL);

        let store = Arc::new(CredentialStore::new(storage.clone()));
        let coordinator = Arc::new(RefreshCoordinator::new(
            executor.clone(),
            Arc::clone(&store),
            Arc::clone(&bus),
            Arc::new(clock.clone()),
            config.resolve_url(REFRESH_PATH),
            config.refresh_timeout(),
        ));
        let transport = Arc::new(
            HttpTransport::new(
                executor.clone(),
                Arc::clone(&store),
                Arc::clone(&coordinator),
                Arc::clone(&bus),
                config,
            )
            .with_cookie_source(cookies.clone()),
        );
        let auth = AuthService::new(Arc::clone(&transport), Arc::new(clock.clone()));

        Self { executor, storage, cookies, clock, bus, store, coordinator, transport, auth, events }
    }

    /// Session with an expired access token and a usable refresh token.
    pub fn with_stale_session(self) -> Self {
        self.store.write(CredentialBundle::issued("stale", "refresh-1", Some(NOW_MS - 1), "", NOW_MS));
        self
    }
}

/// Yield until `condition` holds. Panics if it does not within five seconds.
pub async fn wait_until(condition: impl Fn() -> bool) {
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(std::time::Instant::now() < deadline, "condition not reached");
        tokio::task::yield_now().await;
    }
}
