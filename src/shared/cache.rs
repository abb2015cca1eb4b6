//! Read-through cache with per-entry time-to-live.
//!
//! Entries leave the cache only when their TTL elapses or when a write path
//! invalidates them by key or by `*` pattern. There is no size bound.
//!
//! Every invalidation bumps a generation counter. A fetch that overlaps an
//! invalidation returns its value but does not store it, so a write that lands
//! while a read is in flight cannot be masked by the older result.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::core::config::CacheConfig;

struct CacheEntry {
    value: Arc<dyn Any + Send + Sync>,
    expires_at: Instant,
}

pub struct TtlCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    generation: AtomicU64,
    enabled: bool,
    default_ttl: Duration,
}

impl TtlCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
            enabled: config.enabled,
            default_ttl: config.default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Return the live value for `key`, or run `fetch` and store its result for `ttl`.
    ///
    /// Errors from `fetch` are returned as-is and nothing is stored.
    pub async fn cached<T, E, F, Fut>(&self, key: &str, ttl: Duration, fetch: F) -> Result<T, E>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.enabled || ttl.is_zero() {
            return fetch().await;
        }

        if let Some(value) = self.get::<T>(key).await {
            debug!("Cache hit: {}", key);
            return Ok(value);
        }

        debug!("Cache miss: {}", key);
        let generation = self.generation.load(Ordering::SeqCst);
        let value = fetch().await?;

        let mut entries = self.entries.write().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!("Invalidated during fetch, not storing: {}", key);
            return Ok(value);
        }
        entries.insert(
            key.to_string(),
            CacheEntry {
                value: Arc::new(value.clone()),
                expires_at: Instant::now() + ttl,
            },
        );

        Ok(value)
    }

    async fn get<T: Clone + 'static>(&self, key: &str) -> Option<T> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;

        if entry.expires_at <= Instant::now() {
            return None;
        }

        match entry.value.downcast_ref::<T>() {
            Some(value) => Some(value.clone()),
            None => {
                warn!("Cache entry '{}' holds a different type, treating as miss", key);
                None
            }
        }
    }

    /// Drop a single entry
    pub async fn invalidate(&self, key: &str) {
        let mut entries = self.entries.write().await;
        self.generation.fetch_add(1, Ordering::SeqCst);
        if entries.remove(key).is_some() {
            debug!("Cache invalidated: {}", key);
        }
    }

    /// Drop every entry whose key matches a glob where `*` matches any run of characters
    pub async fn invalidate_pattern(&self, pattern: &str) -> usize {
        let matcher = glob_to_regex(pattern);

        let mut entries = self.entries.write().await;
        self.generation.fetch_add(1, Ordering::SeqCst);
        let before = entries.len();
        entries.retain(|key, _| !matcher.is_match(key));
        let removed = before - entries.len();

        if removed > 0 {
            debug!("Cache invalidated {} entries matching '{}'", removed, pattern);
        }
        removed
    }

    /// Remove entries whose TTL has elapsed
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

fn glob_to_regex(pattern: &str) -> Regex {
    let escaped = regex::escape(pattern).replace(r"\*", ".*");
    // An escaped literal with `.*` substitutions is always a valid expression
    Regex::new(&format!("^{}$", escaped)).unwrap_or_else(|_| Regex::new("$^").unwrap())
}
