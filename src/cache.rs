//! Resolution Cache
//!
//! Time-bounded memoization for directory listings and resolved endpoints.
//!
//! Entries carry an absolute expiry and are dropped lazily when a read finds them stale;
//! there is no background eviction. Misses are never cached. Concurrent misses on the same
//! key may both fetch; the last write wins.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::Result;

/// Lifetime of cached directory listings and endpoints
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// Namespace tag for cluster directory listings
pub const CLUSTERS_NAMESPACE: &str = "quarry_clusters";

/// Namespace tag for resolved cluster endpoints
pub const ENDPOINTS_NAMESPACE: &str = "quarry_endpoints";

#[derive(Debug, Clone)]
struct CacheEntry<T> {
    value: T,
    expires_at: Instant,
}

/// String-keyed cache with a fixed time-to-live
#[derive(Debug)]
pub struct ResolutionCache<T> {
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry<T>>>,
}

impl<T: Clone> ResolutionCache<T> {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entries: RwLock::new(HashMap::new()) }
    }

    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Live value for `key`, if any
    pub fn get(&self, key: &str) -> Option<T> {
        let now = Instant::now();
        {
            let entries = self.entries.read();
            match entries.get(key) {
                Some(entry) if entry.expires_at > now => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        // Stale: drop it unless a refill replaced it in the meantime.
        let mut entries = self.entries.write();
        if entries.get(key).is_some_and(|entry| entry.expires_at <= now) {
            entries.remove(key);
        }
        None
    }

    /// Store `value` under `key`, expiring `ttl` from now
    pub fn set(&self, key: impl Into<String>, value: T) {
        let entry = CacheEntry { value, expires_at: Instant::now() + self.ttl };
        self.entries.write().insert(key.into(), entry);
    }

    /// Store `value` under `key` with an explicit expiry
    ///
    /// Used when a value is derived from another cached value and must not outlive it.
    pub fn set_until(&self, key: impl Into<String>, value: T, expires_at: Instant) {
        let entry = CacheEntry { value, expires_at };
        self.entries.write().insert(key.into(), entry);
    }

    /// Cached value for `key`, or the result of `fetch` (stored only on success)
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, fetch: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(value) = self.get(key) {
            tracing::debug!(key, "cache hit");
            return Ok(value);
        }

        tracing::debug!(key, "cache miss");
        let value = fetch().await?;
        self.set(key, value.clone());
        Ok(value)
    }

    /// Number of stored entries, including stale ones not yet read
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<T: Clone> Default for ResolutionCache<T> {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

/// Build a cache key from a namespace, a subscription, and an optional tenant
///
/// Each part is escaped with [`key_part`], so the separators in a key are never ambiguous
/// and requests scoped to different tenants never share a key.
#[must_use]
pub fn cache_key(namespace: &str, subscription: &str, tenant: Option<&str>) -> String {
    let subscription = key_part(subscription);
    match tenant.filter(|t| !t.is_empty()) {
        Some(tenant) => format!("{namespace}_{subscription}_{}", key_part(tenant)),
        None => format!("{namespace}_{subscription}"),
    }
}

/// Escape one key component so `_` and `/` only ever appear as separators
#[must_use]
pub fn key_part(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '_' | '/') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
