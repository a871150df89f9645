use std::time::Duration;

use authwire_domain::constants::CACHE_KEY_PREFIX;
use authwire_domain::{NormalizedError, RequestDescriptor};
use serde_json::Value;
use tracing::debug;

use super::ports::ResponseCache;
use super::service::HttpTransport;

impl HttpTransport {
    /// GET `path`, serving from `cache` unless `force` is set.
    ///
    /// Only successful payloads are cached; failures always go back to the
    /// caller and leave the cache untouched.
    pub async fn get_cached(
        &self,
        path: &str,
        cache: &dyn ResponseCache,
        key: &str,
        ttl: Option<Duration>,
        force: bool,
    ) -> Result<Value, NormalizedError> {
        let key = cache_key(key);
        if !force {
            if let Some(hit) = cache.get(&key).await {
                debug!(key = %key, "response cache hit");
                return Ok(hit);
            }
        }

        let payload = self.send(RequestDescriptor::get(path)).await?;
        cache.set(&key, payload.clone(), ttl).await;
        Ok(payload)
    }
}

/// Namespaced cache key.
pub fn cache_key(key: &str) -> String {
    if key.starts_with(CACHE_KEY_PREFIX) {
        key.to_string()
    } else {
        format!("{CACHE_KEY_PREFIX}{key}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_is_prefixed_once() {
        assert_eq!(cache_key("profile"), "cache:profile");
        assert_eq!(cache_key("cache:profile"), "cache:profile");
    }
}
