//! Size-adaptive cache (§4.8.1): wraps the same bounded-map strategy as
//! [`super::InMemoryCache`] but periodically widens or shrinks its
//! capacity target between `min_size` and `max_size` based on the
//! observed hit rate, rather than holding a fixed capacity for the life
//! of the process.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::Mutex as AsyncMutex;

use super::{BuildFuture, Cache, CacheMetrics, Entry};
use crate::bitmap::CombinationBitmap;
use crate::config::CacheConfig;
use crate::error::CacheError;

pub struct AdaptiveCache {
    entries: DashMap<u128, Entry>,
    in_flight: DashMap<u128, Arc<AsyncMutex<()>>>,
    current_target: AtomicUsize,
    min_size: usize,
    max_size: usize,
    low_threshold: f64,
    high_threshold: f64,
    ttl: Duration,
    metrics: CacheMetrics,
}

impl AdaptiveCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            in_flight: DashMap::new(),
            current_target: AtomicUsize::new(config.min_size.max(1)),
            min_size: config.min_size.max(1),
            max_size: config.max_size.max(config.min_size),
            low_threshold: config.low_threshold,
            high_threshold: config.high_threshold,
            ttl: Duration::from_secs(config.ttl_seconds),
            metrics: CacheMetrics::default(),
        }
    }

    fn evict_expired(&self, key: &u128) {
        if self.entries.get(key).is_some_and(|e| e.is_expired(self.ttl)) {
            self.entries.remove(key);
        }
    }

    /// Re-evaluates the capacity target against the current hit rate.
    /// Called on `tuning_interval_seconds` by the owning Model Manager (or
    /// a dedicated background task); exposed here so it can also be
    /// invoked directly in tests without a timer.
    pub fn tune(&self) {
        let hit_rate = self.metrics.hit_rate();
        let current = self.current_target.load(Ordering::Relaxed);
        let next = if hit_rate < self.low_threshold {
            (current + current / 4 + 1).min(self.max_size)
        } else if hit_rate > self.high_threshold {
            (current - current / 8).max(self.min_size)
        } else {
            current
        };
        self.current_target.store(next, Ordering::Relaxed);
        self.evict_if_needed();
    }

    fn evict_if_needed(&self) {
        let target = self.current_target.load(Ordering::Relaxed);
        while self.entries.len() > target {
            let lru_key = self.entries.iter().min_by_key(|e| e.last_accessed).map(|e| *e.key());
            match lru_key {
                Some(key) => {
                    self.entries.remove(&key);
                    self.metrics.record_eviction();
                }
                None => break,
            }
        }
    }

    pub fn current_capacity(&self) -> usize {
        self.current_target.load(Ordering::Relaxed)
    }
}

#[async_trait::async_trait]
impl Cache for AdaptiveCache {
    async fn get(&self, key: u128) -> Option<CombinationBitmap> {
        let start = Instant::now();
        self.evict_expired(&key);
        let result = if let Some(mut entry) = self.entries.get_mut(&key) {
            entry.hit_count += 1;
            entry.last_accessed = Instant::now();
            self.metrics.record_hit();
            Some(entry.bitmap.clone())
        } else {
            self.metrics.record_miss();
            None
        };
        self.metrics.record_get_timing(start.elapsed().as_nanos() as u64);
        result
    }

    async fn get_with(
        &self,
        key: u128,
        build: Box<dyn FnOnce() -> BuildFuture + Send>,
    ) -> Result<CombinationBitmap, CacheError> {
        if let Some(bitmap) = self.get(key).await {
            return Ok(bitmap);
        }

        let lock = self.in_flight.entry(key).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone();
        let _guard = lock.lock().await;

        if let Some(bitmap) = self.get(key).await {
            self.metrics.record_coalesced_wait();
            return Ok(bitmap);
        }

        let bitmap = build().await?;
        let put_start = Instant::now();
        self.entries.insert(key, Entry::new(bitmap.clone()));
        self.evict_if_needed();
        self.metrics.record_put_timing(put_start.elapsed().as_nanos() as u64);
        self.in_flight.remove(&key);
        Ok(bitmap)
    }

    fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
