//! A bounded in-memory cache with true LRU eviction (recency tracked on
//! every hit via `last_accessed`, independent of per-entry TTL) and
//! `dashmap`-backed build coalescing.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::Mutex as AsyncMutex;

use super::{BuildFuture, Cache, CacheMetrics, Entry};
use crate::bitmap::CombinationBitmap;
use crate::error::CacheError;

pub struct InMemoryCache {
    entries: DashMap<u128, Entry>,
    in_flight: DashMap<u128, Arc<AsyncMutex<()>>>,
    max_size: usize,
    ttl: Duration,
    metrics: CacheMetrics,
}

impl InMemoryCache {
    pub fn new(max_size: usize, ttl_seconds: u64) -> Self {
        Self {
            entries: DashMap::new(),
            in_flight: DashMap::new(),
            max_size,
            ttl: Duration::from_secs(ttl_seconds),
            metrics: CacheMetrics::default(),
        }
    }

    fn evict_expired(&self, key: &u128) {
        if self.entries.get(key).is_some_and(|e| e.is_expired(self.ttl)) {
            self.entries.remove(key);
        }
    }

    fn evict_if_needed(&self) {
        while self.entries.len() > self.max_size {
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
}

#[async_trait::async_trait]
impl Cache for InMemoryCache {
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
