//! Port interfaces for the network and the response cache

use std::time::Duration;

use async_trait::async_trait;
use authwire_domain::{OutboundRequest, TransportFailure, TransportResponse};
use serde_json::Value;

/// Performs exactly one HTTP exchange.
///
/// Any status code is a successful exchange and comes back as a
/// [`TransportResponse`]; only the absence of a response is a
/// [`TransportFailure`]. Implementations never retry.
#[async_trait]
pub trait HttpExecutor: Send + Sync {
    async fn execute(
        &self,
        request: OutboundRequest,
    ) -> Result<TransportResponse, TransportFailure>;
}

/// Key-value cache for response payloads.
#[async_trait]
pub trait ResponseCache: Send + Sync {
    /// Cached value, `None` when absent or expired.
    async fn get(&self, key: &str) -> Option<Value>;

    /// Store `value`; `None` uses the cache's default TTL.
    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>);

    async fn remove(&self, key: &str);

    /// Drop every entry.
    async fn clear(&self);
}
