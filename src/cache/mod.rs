//! Result Cache (C9): caches the eligible-combination bitmap for a given
//! base-condition-set fingerprint, with at-most-one-build-per-key
//! coalescing so a thundering herd of identical events only evaluates the
//! underlying base conditions once.

mod adaptive;
mod caffeine;
mod in_memory;
mod noop;
mod remote;

pub use adaptive::AdaptiveCache;
pub use caffeine::CaffeineCache;
pub use in_memory::InMemoryCache;
pub use noop::NoOpCache;
pub use remote::RemoteCache;

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::bitmap::CombinationBitmap;
use crate::config::{CacheBackendKind, CacheConfig};
use crate::error::CacheError;

/// A cached result: the eligible-combination bitmap plus bookkeeping used
/// by size-adaptive eviction. `created_at` anchors the per-entry TTL;
/// `last_accessed` is touched on every hit and drives LRU eviction
/// ordering independently of TTL expiry.
#[derive(Debug, Clone)]
pub struct Entry {
    pub bitmap: CombinationBitmap,
    pub created_at: Instant,
    pub last_accessed: Instant,
    pub hit_count: u64,
}

impl Entry {
    pub fn new(bitmap: CombinationBitmap) -> Self {
        let now = Instant::now();
        Self {
            bitmap,
            created_at: now,
            last_accessed: now,
            hit_count: 0,
        }
    }

    pub fn is_expired(&self, ttl: std::time::Duration) -> bool {
        self.created_at.elapsed() >= ttl
    }
}

/// Running counters exposed by every backend, per §4.8's observability
/// requirement.
#[derive(Debug, Default)]
pub struct CacheMetrics {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub evictions: AtomicU64,
    pub coalesced_waits: AtomicU64,
    get_nanos_total: AtomicU64,
    get_samples: AtomicU64,
    put_nanos_total: AtomicU64,
    put_samples: AtomicU64,
}

impl CacheMetrics {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }
    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }
    pub fn record_coalesced_wait(&self) {
        self.coalesced_waits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_get_timing(&self, nanos: u64) {
        self.get_nanos_total.fetch_add(nanos, Ordering::Relaxed);
        self.get_samples.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_put_timing(&self, nanos: u64) {
        self.put_nanos_total.fetch_add(nanos, Ordering::Relaxed);
        self.put_samples.fetch_add(1, Ordering::Relaxed);
    }

    pub fn requests(&self) -> u64 {
        self.hits.load(Ordering::Relaxed) + self.misses.load(Ordering::Relaxed)
    }

    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed) as f64;
        let misses = self.misses.load(Ordering::Relaxed) as f64;
        if hits + misses == 0.0 {
            0.0
        } else {
            hits / (hits + misses)
        }
    }

    pub fn avg_get_nanos(&self) -> f64 {
        let samples = self.get_samples.load(Ordering::Relaxed);
        if samples == 0 {
            0.0
        } else {
            self.get_nanos_total.load(Ordering::Relaxed) as f64 / samples as f64
        }
    }

    pub fn avg_put_nanos(&self) -> f64 {
        let samples = self.put_samples.load(Ordering::Relaxed);
        if samples == 0 {
            0.0
        } else {
            self.put_nanos_total.load(Ordering::Relaxed) as f64 / samples as f64
        }
    }
}

/// A point-in-time read of a backend's observability surface, per §4.8:
/// `requests, hits, misses, evictions, current_size, hit_rate,
/// avg_get_nanos, avg_put_nanos`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheSnapshot {
    pub requests: u64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub current_size: usize,
    pub hit_rate: f64,
    pub avg_get_nanos: f64,
    pub avg_put_nanos: f64,
}

pub type BuildFuture = Pin<Box<dyn Future<Output = Result<CombinationBitmap, CacheError>> + Send>>;

/// The contract every cache backend implements. `get_with` guarantees at
/// most one concurrent `build` call per key within a single backend
/// instance — concurrent callers for the same key await the in-flight
/// build rather than each recomputing it, per §4.8's coalescing
/// requirement.
#[async_trait::async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: u128) -> Option<CombinationBitmap>;

    async fn get_with(
        &self,
        key: u128,
        build: Box<dyn FnOnce() -> BuildFuture + Send>,
    ) -> Result<CombinationBitmap, CacheError>;

    fn metrics(&self) -> &CacheMetrics;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The full §4.8 observability surface in one read.
    fn snapshot(&self) -> CacheSnapshot {
        let metrics = self.metrics();
        CacheSnapshot {
            requests: metrics.requests(),
            hits: metrics.hits.load(Ordering::Relaxed),
            misses: metrics.misses.load(Ordering::Relaxed),
            evictions: metrics.evictions.load(Ordering::Relaxed),
            current_size: self.len(),
            hit_rate: metrics.hit_rate(),
            avg_get_nanos: metrics.avg_get_nanos(),
            avg_put_nanos: metrics.avg_put_nanos(),
        }
    }
}

/// Constructs the configured backend.
pub fn build_cache(config: &CacheConfig) -> Arc<dyn Cache> {
    match config.backend {
        CacheBackendKind::InMemory => Arc::new(InMemoryCache::new(config.max_size, config.ttl_seconds)),
        CacheBackendKind::CaffeineLike => Arc::new(CaffeineCache::new(config.max_size, config.ttl_seconds)),
        CacheBackendKind::Adaptive => Arc::new(AdaptiveCache::new(config.clone())),
        CacheBackendKind::Remote => Arc::new(RemoteCache::new(config.max_size, config.ttl_seconds)),
        CacheBackendKind::NoOp => Arc::new(NoOpCache::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_cache_respects_backend_kind() {
        let mut config = CacheConfig::default();
        config.backend = CacheBackendKind::NoOp;
        let cache = build_cache(&config);
        assert_eq!(cache.len(), 0);
    }
}
