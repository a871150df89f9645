use std::sync::atomic::{AtomicUsize, Ordering};
use std::pin::pin;
use std::sync::Arc;
use std::task::Poll;
use std::time::Duration;

use authwire_domain::constants::{
    AUTHORIZATION_HEADER, BEARER_PREFIX, CSRF_HEADER, DEFAULT_FALLBACK_MESSAGE, RETRY_AFTER_HEADER,
};
use authwire_domain::{
    AuthEvent, ClientConfig, ErrorCode, NormalizedError, OutboundRequest, RequestDescriptor,
    TransportFailure, TransportResponse,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::ports::HttpExecutor;
use crate::errors::{ErrorNormalizer, FailureContext};
use crate::events::EventBus;
use crate::refresh::{RefreshCoordinator, ReplayTurn};
use crate::session::{CookieSource, CredentialStore};

/// Result of one pass through the pipeline.
enum Dispatch {
    Payload(Value),
    Unauthorized(TransportResponse),
    Failed(TransportFailure),
}

/// Authenticated HTTP façade.
///
/// Attaches the bearer token and CSRF header, tracks how many requests are
/// in flight, hands 401s to the [`RefreshCoordinator`] and replays the
/// request once with the new token. Every failure reaches the caller as a
/// [`NormalizedError`].
pub struct HttpTransport {
    executor: Arc<dyn HttpExecutor>,
    store: Arc<CredentialStore>,
    coordinator: Arc<RefreshCoordinator>,
    normalizer: ErrorNormalizer,
    bus: Arc<EventBus>,
    cookies: Option<Arc<dyn CookieSource>>,
    config: ClientConfig,
    active: AtomicUsize,
}

impl HttpTransport {
    pub fn new(
        executor: Arc<dyn HttpExecutor>,
        store: Arc<CredentialStore>,
        coordinator: Arc<RefreshCoordinator>,
        bus: Arc<EventBus>,
        config: ClientConfig,
    ) -> Self {
        Self {
            executor,
            store,
            coordinator,
            normalizer: ErrorNormalizer::new(Arc::clone(&bus)),
            bus,
            cookies: None,
            config,
            active: AtomicUsize::new(0),
        }
    }

    /// Where the CSRF cookie fallback reads from.
    #[must_use]
    pub fn with_cookie_source(mut self, cookies: Arc<dyn CookieSource>) -> Self {
        self.cookies = Some(cookies);
        self
    }

    /// Send a request and return the response payload.
    pub async fn send(&self, descriptor: RequestDescriptor) -> Result<Value, NormalizedError> {
        let mut current = descriptor;
        let mut turn = None;
        loop {
            match self.dispatch(&current, turn.take()).await {
                Dispatch::Payload(payload) => return Ok(payload),
                Dispatch::Failed(failure) => return Err(self.normalize(&current, &failure)),
                Dispatch::Unauthorized(response) if !current.is_refresh_eligible() => {
                    debug!(url = current.url(), retry = current.flags().is_retry, "terminal 401");
                    self.store.clear();
                    self.bus.publish(AuthEvent::TokenExpired);
                    return Err(self.normalize(&current, &failure_from(response)));
                }
                Dispatch::Unauthorized(_) => {
                    debug!(url = current.url(), "401 received, waiting for a fresh token");
                    let (outcome, mut replay_turn) = self.coordinator.join_refresh().await;
                    // The coordinator already normalized and reported its failure.
                    let token = outcome?;
                    replay_turn.wait().await;
                    current = current.retried_with_token(&token);
                    turn = Some(replay_turn);
                }
            }
        }
    }

    /// Like [`HttpTransport::send`], but gives up when `cancel` fires.
    ///
    /// Cancelling does not disturb a refresh this request may be waiting on.
    pub async fn send_cancellable(
        &self,
        descriptor: RequestDescriptor,
        cancel: &CancellationToken,
    ) -> Result<Value, NormalizedError> {
        let url = descriptor.url().to_string();
        let suppress_event = descriptor.flags().suppress_error_event;
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(self.normalizer.normalize(
                &TransportFailure::Cancelled,
                FailureContext {
                    url: &url,
                    fallback_message: DEFAULT_FALLBACK_MESSAGE,
                    suppress_event,
                },
            )),
            result = self.send(descriptor) => result,
        }
    }

    /// Send and deserialize the payload into `T`.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        descriptor: RequestDescriptor,
    ) -> Result<T, NormalizedError> {
        let url = descriptor.url().to_string();
        let fallback =
            descriptor.fallback_message().unwrap_or(DEFAULT_FALLBACK_MESSAGE).to_string();
        let payload = self.send(descriptor).await?;
        serde_json::from_value(payload).map_err(|err| {
            debug!(url = %url, error = %err, "unexpected response shape");
            NormalizedError::new(ErrorCode::Unknown, 200, fallback)
        })
    }

    pub async fn get(&self, path: &str) -> Result<Value, NormalizedError> {
        self.send(RequestDescriptor::get(path)).await
    }

    pub async fn post(&self, path: &str, body: Value) -> Result<Value, NormalizedError> {
        self.send(RequestDescriptor::post(path).with_json(body)).await
    }

    pub async fn put(&self, path: &str, body: Value) -> Result<Value, NormalizedError> {
        self.send(RequestDescriptor::put(path).with_json(body)).await
    }

    pub async fn patch(&self, path: &str, body: Value) -> Result<Value, NormalizedError> {
        self.send(RequestDescriptor::patch(path).with_json(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<Value, NormalizedError> {
        self.send(RequestDescriptor::delete(path)).await
    }

    /// Requests currently between "before send" and their outcome.
    pub fn active_requests(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }

    /// One exchange. A replay holds `turn` until the executor has taken its
    /// request, so replays of one refresh cycle go out in arrival order.
    async fn dispatch(&self, descriptor: &RequestDescriptor, turn: Option<ReplayTurn>) -> Dispatch {
        let outcome = {
            let _in_flight = InFlight::enter(self);
            let request = self.prepare(descriptor);
            debug!(
                method = %request.method,
                url = %request.url,
                retry = descriptor.flags().is_retry,
                "sending request"
            );
            let mut exchange = pin!(self.executor.execute(request));
            let first_poll = futures::poll!(exchange.as_mut());
            if let Some(turn) = turn {
                turn.pass();
            }
            match first_poll {
                Poll::Ready(outcome) => outcome,
                Poll::Pending => exchange.await,
            }
        };

        match outcome {
            Err(failure) => Dispatch::Failed(failure),
            Ok(response) if response.is_success() => {
                let rotated = response.headers.get(CSRF_HEADER).filter(|token| !token.is_empty());
                if let Some(csrf) = rotated {
                    if self.store.read().csrf_token != csrf {
                        info!("server rotated CSRF token");
                        self.store.update_csrf_token(csrf);
                    }
                }
                Dispatch::Payload(response.into_payload())
            }
            Ok(response) if response.is_unauthorized() => Dispatch::Unauthorized(response),
            Ok(response) => Dispatch::Failed(failure_from(response)),
        }
    }

    fn prepare(&self, descriptor: &RequestDescriptor) -> OutboundRequest {
        let mut headers = descriptor.headers().clone();

        if !headers.contains(AUTHORIZATION_HEADER) {
            if let Some(token) = self.store.access_token() {
                headers.insert(AUTHORIZATION_HEADER, format!("{BEARER_PREFIX}{token}"));
            }
        }
        if !headers.contains(CSRF_HEADER) {
            if let Some(csrf) = self.store.csrf_token(self.cookies.as_deref()) {
                headers.insert(CSRF_HEADER, csrf);
            }
        }
        if descriptor.body().is_some() && !headers.contains("content-type") {
            headers.insert("content-type", "application/json");
        }

        OutboundRequest {
            method: descriptor.method(),
            url: self.config.resolve_url(descriptor.url()),
            headers,
            body: descriptor.body().cloned(),
            timeout: descriptor.timeout().unwrap_or_else(|| self.config.request_timeout()),
        }
    }

    fn normalize(
        &self,
        descriptor: &RequestDescriptor,
        failure: &TransportFailure,
    ) -> NormalizedError {
        self.normalizer.normalize(
            failure,
            FailureContext {
                url: descriptor.url(),
                fallback_message: descriptor.fallback_message().unwrap_or(DEFAULT_FALLBACK_MESSAGE),
                suppress_event: descriptor.flags().suppress_error_event,
            },
        )
    }

    fn enter(&self) {
        self.active.fetch_add(1, Ordering::SeqCst);
        self.bus.publish(AuthEvent::LoadingChanged(true));
    }

    fn leave(&self) {
        let previous = self.active.fetch_sub(1, Ordering::SeqCst);
        self.bus.publish(AuthEvent::LoadingChanged(previous > 1));
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.config.api_base_url)
            .field("active_requests", &self.active_requests())
            .finish_non_exhaustive()
    }
}

/// Counts a request as in flight until dropped, including when the
/// request future is cancelled mid-exchange.
struct InFlight<'a> {
    transport: &'a HttpTransport,
}

impl<'a> InFlight<'a> {
    fn enter(transport: &'a HttpTransport) -> Self {
        transport.enter();
        Self { transport }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.transport.leave();
    }
}

fn failure_from(response: TransportResponse) -> TransportFailure {
    let retry_after = response
        .headers
        .get(RETRY_AFTER_HEADER)
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs);
    TransportFailure::Response { status: response.status, body: response.body, retry_after }
}
