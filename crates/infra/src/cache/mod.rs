//! Response caching with moka
//!
//! Bounded in-memory cache for response payloads, used by
//! `HttpTransport::get_cached` and cleared on logout.
//!
//! # Expiry
//!
//! Every entry records its own deadline, computed from the injected
//! [`Clock`] when it is written. Reads compare the deadline with the same
//! clock, so expiry follows `MockClock` in tests instead of wall time.
//! Moka only bounds the number of entries.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use authwire_common::time::{Clock, SystemClock};
use authwire_core::transport::cache_key;
use authwire_core::ResponseCache;
use authwire_domain::constants::{DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL_MS};
use moka::future::Cache;
use serde_json::Value;

/// Response cache configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseCacheConfig {
    /// Time-to-live for entries written without an explicit TTL
    pub default_ttl: Duration,

    /// Maximum number of entries
    pub max_capacity: u64,
}

impl Default for ResponseCacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_millis(DEFAULT_CACHE_TTL_MS),
            max_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl ResponseCacheConfig {
    /// Create config with custom TTL (useful for testing)
    pub fn with_ttl(default_ttl: Duration) -> Self {
        Self { default_ttl, ..Self::default() }
    }
}

#[derive(Debug, Clone)]
struct CachedEntry {
    value: Value,
    expires_at_ms: u64,
}

pub struct MokaResponseCache {
    entries: Cache<String, CachedEntry>,
    clock: Arc<dyn Clock>,
    default_ttl: Duration,
}

impl MokaResponseCache {
    /// Cache with the system clock.
    pub fn new(config: ResponseCacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Cache with a custom clock (for testing)
    pub fn with_clock(config: ResponseCacheConfig, clock: Arc<dyn Clock>) -> Self {
        tracing::info!(
            ttl_ms = config.default_ttl.as_millis() as u64,
            max_capacity = config.max_capacity,
            "response cache configured"
        );
        let entries = Cache::builder().max_capacity(config.max_capacity).build();
        Self { entries, clock, default_ttl: config.default_ttl }
    }

    /// Number of live entries, after pending evictions are applied.
    pub async fn len(&self) -> u64 {
        self.entries.run_pending_tasks().await;
        self.entries.entry_count()
    }
}

impl Default for MokaResponseCache {
    fn default() -> Self {
        Self::new(ResponseCacheConfig::default())
    }
}

impl std::fmt::Debug for MokaResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaResponseCache").field("default_ttl", &self.default_ttl).finish()
    }
}

#[async_trait]
impl ResponseCache for MokaResponseCache {
    async fn get(&self, key: &str) -> Option<Value> {
        let key = cache_key(key);
        let entry = self.entries.get(&key).await?;
        if self.clock.millis_since_epoch() >= entry.expires_at_ms {
            tracing::trace!(key = %key, "response cache entry expired");
            self.entries.invalidate(&key).await;
            return None;
        }
        Some(entry.value)
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        let expires_at_ms = self.clock.millis_since_epoch().saturating_add(ttl_ms);
        self.entries.insert(cache_key(key), CachedEntry { value, expires_at_ms }).await;
    }

    async fn remove(&self, key: &str) {
        self.entries.invalidate(&cache_key(key)).await;
    }

    async fn clear(&self) {
        self.entries.invalidate_all();
        tracing::debug!("response cache cleared");
    }
}

#[cfg(test)]
mod tests {
    use authwire_common::time::MockClock;
    use serde_json::json;

    use super::*;

    fn cache_at(clock: &MockClock) -> MokaResponseCache {
        MokaResponseCache::with_clock(ResponseCacheConfig::default(), Arc::new(clock.clone()))
    }

    #[tokio::test]
    async fn entries_expire_by_the_injected_clock() {
        let clock = MockClock::at_millis(1_000);
        let cache = cache_at(&clock);
        cache.set("profile", json!({"name": "ada"}), Some(Duration::from_secs(60))).await;

        clock.advance(Duration::from_secs(59));
        assert_eq!(cache.get("profile").await, Some(json!({"name": "ada"})));

        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.get("profile").await, None);
    }

    #[tokio::test]
    async fn default_ttl_applies_without_explicit_ttl() {
        let clock = MockClock::at_millis(0);
        let cache = cache_at(&clock);
        cache.set("list", json!([1, 2]), None).await;

        clock.advance(Duration::from_millis(DEFAULT_CACHE_TTL_MS - 1));
        assert!(cache.get("list").await.is_some());
        clock.advance(Duration::from_millis(1));
        assert!(cache.get("list").await.is_none());
    }

    #[tokio::test]
    async fn prefixed_and_bare_keys_address_the_same_entry() {
        let cache = cache_at(&MockClock::at_millis(0));
        cache.set("profile", json!(1), None).await;

        assert_eq!(cache.get("cache:profile").await, Some(json!(1)));
        cache.remove("cache:profile").await;
        assert!(cache.get("profile").await.is_none());
    }

    #[tokio::test]
    async fn clear_drops_everything() {
        let cache = cache_at(&MockClock::at_millis(0));
        cache.set("a", json!(1), None).await;
        cache.set("b", json!(2), None).await;
        assert_eq!(cache.len().await, 2);

        cache.clear().await;
        assert!(cache.get("a").await.is_none());
        assert_eq!(cache.len().await, 0);
    }
}
