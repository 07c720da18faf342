//! Cache coordinator: read-through/write-through access to the backend
//! cache, with hit/miss/error accounting.
//!
//! A cache miss never stalls more than the store's own read latency --
//! every coordinator call is a single backend round trip. A backend error
//! is never fatal: it is counted and logged, and the call returns as if it
//! had been a miss, so the caller always falls through to the store.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use configd_core::Result;
use parking_lot::Mutex;

use crate::backend::CacheBackend;

pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Monotonically increasing counters for cache effectiveness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub hits: u64,
    pub misses: u64,
    pub errors: u64,
}

pub struct CacheCoordinator {
    backend: Box<dyn CacheBackend>,
    default_ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    errors: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl CacheCoordinator {
    pub fn new(backend: Box<dyn CacheBackend>, default_ttl: Duration) -> Self {
        Self {
            backend,
            default_ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            last_error: Mutex::new(None),
        }
    }

    fn record_error(&self, context: &str, err: &configd_core::Error) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        *self.last_error.lock() = Some(err.to_string());
        tracing::warn!(%context, error = %err, "cache operation failed, falling through");
    }

    /// Fetch raw bytes for `key`. Returns `(bytes, hit)`; a backend error or
    /// absent key both surface as `(None, false)`.
    pub async fn get(&self, key: &str) -> (Option<Vec<u8>>, bool) {
        match self.backend.get(key).await {
            Ok(Some(bytes)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                (Some(bytes), true)
            }
            Ok(None) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                (None, false)
            }
            Err(e) => {
                self.record_error("get", &e);
                (None, false)
            }
        }
    }

    /// Populate `key` with `bytes` using the default TTL. Best-effort:
    /// errors are recorded, never propagated.
    pub async fn set(&self, key: &str, bytes: Vec<u8>) {
        self.set_with_ttl(key, bytes, self.default_ttl).await;
    }

    pub async fn set_with_ttl(&self, key: &str, bytes: Vec<u8>, ttl: Duration) {
        if let Err(e) = self.backend.set(key, bytes, ttl).await {
            self.record_error("set", &e);
        }
    }

    /// Delete a single key. Best-effort.
    pub async fn delete(&self, key: &str) {
        if let Err(e) = self.backend.delete(key).await {
            self.record_error("delete", &e);
        }
    }

    /// Delete every key matching a glob `pattern`. Returns the number of
    /// keys erased (0 on a backend error, which is recorded but not fatal).
    pub async fn invalidate_pattern(&self, pattern: &str) -> usize {
        let keys = match self.backend.scan_keys(pattern).await {
            Ok(keys) => keys,
            Err(e) => {
                self.record_error("invalidate_pattern.scan", &e);
                return 0;
            }
        };
        let mut erased = 0;
        for key in &keys {
            if self.backend.delete(key).await.is_ok() {
                erased += 1;
            } else {
                tracing::debug!(key, "failed to delete key during pattern invalidation");
            }
        }
        erased
    }

    pub fn stats(&self) -> Stats {
        Stats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }
}

/// Cache key for a config fetched by organization/application/environment slugs.
pub fn key_by_slugs(org: &str, app: &str, env: &str) -> String {
    format!("config:{org}:{app}:{env}")
}

/// Cache key for a config fetched by application API key.
pub fn key_by_api_key(api_key: &str, env: &str) -> String {
    format!("config:api:{api_key}:{env}")
}
