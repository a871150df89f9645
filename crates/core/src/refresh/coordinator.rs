use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use authwire_common::time::Clock;
use authwire_domain::constants::{
    CSRF_HEADER, MISSING_REFRESH_TOKEN_MESSAGE, REFRESH_ABORTED_MESSAGE, REFRESH_FAILED_MESSAGE,
};
use authwire_domain::{
    AuthEvent, AuthPayload, ErrorCode, Headers, HttpMethod, NormalizedError, OutboundRequest,
    TransportFailure,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::ReplayTurn;
use crate::errors::{ErrorNormalizer, FailureContext};
use crate::events::EventBus;
use crate::session::CredentialStore;
use crate::transport::HttpExecutor;

/// New access token, or the error every waiter of a failed cycle shares.
pub type RefreshOutcome = Result<String, NormalizedError>;

#[derive(Default)]
struct RefreshState {
    in_flight: bool,
    /// Non-empty only while `in_flight`.
    waiters: VecDeque<oneshot::Sender<(RefreshOutcome, ReplayTurn)>>,
}

/// Single-flight token refresh.
///
/// However many callers ask for a fresh token while a refresh is running,
/// exactly one call reaches the refresh endpoint. Every caller, the one that
/// started the cycle included, waits in one FIFO queue and receives the same
/// outcome in arrival order, together with a [`ReplayTurn`] that keeps
/// their replays in that order too.
///
/// The cycle runs on its own task, so a caller that gives up (its future is
/// dropped) leaves the refresh and the other waiters untouched.
pub struct RefreshCoordinator {
    executor: Arc<dyn HttpExecutor>,
    store: Arc<CredentialStore>,
    bus: Arc<EventBus>,
    normalizer: ErrorNormalizer,
    clock: Arc<dyn Clock>,
    refresh_url: String,
    timeout: Duration,
    state: Mutex<RefreshState>,
    cycles: AtomicU64,
}

impl RefreshCoordinator {
    pub fn new(
        executor: Arc<dyn HttpExecutor>,
        store: Arc<CredentialStore>,
        bus: Arc<EventBus>,
        clock: Arc<dyn Clock>,
        refresh_url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            executor,
            store,
            normalizer: ErrorNormalizer::new(Arc::clone(&bus)),
            bus,
            clock,
            refresh_url: refresh_url.into(),
            timeout,
            state: Mutex::new(RefreshState::default()),
            cycles: AtomicU64::new(0),
        }
    }

    /// Wait for a usable access token, refreshing if nobody else is.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn ensure_fresh_token(self: &Arc<Self>) -> RefreshOutcome {
        let (outcome, _turn) = self.join_refresh().await;
        outcome
    }

    /// [`RefreshCoordinator::ensure_fresh_token`] for callers that replay a
    /// request with the new token. Wait on the returned turn before sending
    /// the replay and pass it once the replay reached the executor.
    pub async fn join_refresh(self: &Arc<Self>) -> (RefreshOutcome, ReplayTurn) {
        let (tx, rx) = oneshot::channel();

        let starts_cycle = {
            let mut state = self.state.lock();
            state.waiters.push_back(tx);
            let idle = !state.in_flight;
            // Flip before anything can yield, so a concurrent caller queues
            // behind this cycle instead of starting its own.
            state.in_flight = true;
            debug!(waiters = state.waiters.len(), joined = !idle, "awaiting token refresh");
            idle
        };

        if starts_cycle {
            tokio::spawn(Arc::clone(self).run_cycle());
        }

        rx.await.unwrap_or_else(|_| (Err(aborted()), ReplayTurn::default()))
    }

    pub fn is_refreshing(&self) -> bool {
        self.state.lock().in_flight
    }

    pub fn pending_waiters(&self) -> usize {
        self.state.lock().waiters.len()
    }

    /// Number of refresh calls sent to the server so far.
    pub fn refresh_count(&self) -> u64 {
        self.cycles.load(Ordering::SeqCst)
    }

    async fn run_cycle(self: Arc<Self>) {
        let mut guard = SettleGuard { coordinator: &self, armed: true };
        let outcome = self.refresh().await;
        guard.armed = false;
        self.settle(outcome);
    }

    async fn refresh(&self) -> RefreshOutcome {
        let Some(refresh_token) = self.store.refresh_token() else {
            warn!("token refresh requested without a refresh token");
            self.expire_session();
            return Err(NormalizedError::new(
                ErrorCode::AuthExpired,
                401,
                MISSING_REFRESH_TOKEN_MESSAGE,
            )
            .with_details(json!({ "reason": "missing_refresh_token" })));
        };

        self.cycles.fetch_add(1, Ordering::SeqCst);
        let started = Instant::now();
        info!(url = %self.refresh_url, "refreshing access token");

        let mut headers = Headers::new();
        headers.insert("content-type", "application/json");
        let request = OutboundRequest {
            method: HttpMethod::Post,
            url: self.refresh_url.clone(),
            headers,
            body: Some(json!({ "refreshToken": refresh_token })),
            timeout: self.timeout,
        };

        let failure = match self.executor.execute(request).await {
            Ok(response) if response.is_success() => {
                let rotated_csrf = response.headers.get(CSRF_HEADER).map(str::to_string);
                let body = response.body.as_ref().unwrap_or(&Value::Null);
                let payload = AuthPayload::from_value(body);
                let now = self.clock.millis_since_epoch();

                let Some(mut bundle) = payload.into_bundle(&self.store.read(), now) else {
                    warn!(status = response.status, "refresh response carried no access token");
                    self.expire_session();
                    return Err(NormalizedError::new(
                        ErrorCode::AuthExpired,
                        response.status,
                        REFRESH_ABORTED_MESSAGE,
                    ));
                };
                if payload.csrf_token.is_none() {
                    if let Some(csrf) = rotated_csrf.filter(|token| !token.is_empty()) {
                        bundle = bundle.with_csrf_token(csrf);
                    }
                }

                self.store.write(bundle.clone());
                info!(
                    expires_at = bundle.expires_at,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "access token refreshed"
                );
                let access_token = bundle.access_token.clone();
                self.bus.publish(AuthEvent::TokenRefreshed(bundle));
                return Ok(access_token);
            }
            Ok(response) => TransportFailure::response(response.status, response.body),
            Err(failure) => failure,
        };

        warn!(
            cause = %failure,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "token refresh failed, ending session"
        );
        self.expire_session();
        Err(self.normalizer.normalize(
            &failure,
            FailureContext {
                url: &self.refresh_url,
                fallback_message: REFRESH_FAILED_MESSAGE,
                suppress_event: false,
            },
        ))
    }

    fn expire_session(&self) {
        self.store.clear();
        self.bus.publish(AuthEvent::TokenExpired);
    }

    /// Hand `outcome` to every waiter, oldest first, and return to idle.
    ///
    /// The lock is held for the whole drain, so a caller arriving meanwhile
    /// starts a new cycle only after every current waiter was notified.
    fn settle(&self, outcome: RefreshOutcome) {
        let mut state = self.state.lock();
        state.in_flight = false;
        let waiters = std::mem::take(&mut state.waiters);
        debug!(waiters = waiters.len(), ok = outcome.is_ok(), "settling token refresh");
        let turns = ReplayTurn::chain(waiters.len());
        for (waiter, turn) in waiters.into_iter().zip(turns) {
            // A dropped receiver is a caller that stopped waiting; its turn
            // hands over as it drops.
            let _ = waiter.send((outcome.clone(), turn));
        }
    }
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("refresh_url", &self.refresh_url)
            .field("refreshing", &self.is_refreshing())
            .field("refresh_count", &self.refresh_count())
            .finish_non_exhaustive()
    }
}

/// Rejects the queue if a cycle dies before settling.
struct SettleGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    armed: bool,
}

impl Drop for SettleGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            warn!("token refresh task ended before settling");
            self.coordinator.settle(Err(aborted()));
        }
    }
}

fn aborted() -> NormalizedError {
    NormalizedError::new(ErrorCode::AuthExpired, 401, REFRESH_ABORTED_MESSAGE)
}
