//! Remote cache stand-in: simulates a networked cache tier (e.g. a shared
//! Redis-like cluster) with artificial latency on every operation. The
//! wire protocol itself is out of scope (§2 non-goals); this exists so
//! the Model Manager and evaluator can exercise the same `Cache` contract
//! against a backend with realistic miss/latency characteristics in
//! integration tests.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::Mutex as AsyncMutex;

use super::{BuildFuture, Cache, CacheMetrics, Entry};
use crate::bitmap::CombinationBitmap;
use crate::error::CacheError;

const SIMULATED_ROUND_TRIP: Duration = Duration::from_micros(200);

pub struct RemoteCache {
    entries: DashMap<u128, Entry>,
    in_flight: DashMap<u128, Arc<AsyncMutex<()>>>,
    max_size: usize,
    ttl: Duration,
    metrics: CacheMetrics,
}

impl RemoteCache {
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
}

#[async_trait::async_trait]
impl Cache for RemoteCache {
    async fn get(&self, key: u128) -> Option<CombinationBitmap> {
        let start = Instant::now();
        tokio::time::sleep(SIMULATED_ROUND_TRIP).await;
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
        tokio::time::sleep(SIMULATED_ROUND_TRIP).await;
        if self.entries.len() >= self.max_size {
            if let Some(lru) = self.entries.iter().min_by_key(|e| e.last_accessed).map(|e| *e.key()) {
                self.entries.remove(&lru);
                self.metrics.record_eviction();
            }
        }
        self.entries.insert(key, Entry::new(bitmap.clone()));
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

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip_through_remote_cache() {
        let cache = RemoteCache::new(10, 300);
        let bitmap: CombinationBitmap = [1u32].into_iter().collect();
        let result = cache
            .get_with(1, Box::new(move || Box::pin(async move { Ok(bitmap) })))
            .await
            .unwrap();
        assert_eq!(result.cardinality(), 1);
        assert_eq!(cache.get(1).await.unwrap().cardinality(), 1);
    }
}
