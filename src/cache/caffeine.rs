//! A `moka`-backed cache: a TinyLFU-admission, segmented LRU cache
//! modeled on Java's Caffeine library, as named in §4.8.

use std::time::{Duration, Instant};

use moka::future::Cache as MokaCache;

use super::{BuildFuture, Cache, CacheMetrics, Entry};
use crate::bitmap::CombinationBitmap;
use crate::error::CacheError;

pub struct CaffeineCache {
    inner: MokaCache<u128, Entry>,
    metrics: CacheMetrics,
}

impl CaffeineCache {
    pub fn new(max_size: usize, ttl_seconds: u64) -> Self {
        let inner = MokaCache::builder()
            .max_capacity(max_size as u64)
            .time_to_live(Duration::from_secs(ttl_seconds))
            .build();
        Self {
            inner,
            metrics: CacheMetrics::default(),
        }
    }
}

#[async_trait::async_trait]
impl Cache for CaffeineCache {
    async fn get(&self, key: u128) -> Option<CombinationBitmap> {
        let start = Instant::now();
        let result = match self.inner.get(&key).await {
            Some(entry) => {
                self.metrics.record_hit();
                Some(entry.bitmap)
            }
            None => {
                self.metrics.record_miss();
                None
            }
        };
        self.metrics.record_get_timing(start.elapsed().as_nanos() as u64);
        result
    }

    /// `moka::Cache::try_get_with` already guarantees at most one concurrent
    /// init per key; other waiters for the same key block on the same
    /// future instead of recomputing it.
    async fn get_with(
        &self,
        key: u128,
        build: Box<dyn FnOnce() -> BuildFuture + Send>,
    ) -> Result<CombinationBitmap, CacheError> {
        let was_present = self.inner.contains_key(&key);
        let start = Instant::now();
        let entry = self
            .inner
            .try_get_with(key, async move {
                let bitmap = build().await?;
                Ok::<Entry, CacheError>(Entry::new(bitmap))
            })
            .await
            .map_err(|e: std::sync::Arc<CacheError>| (*e).clone())?;
        let elapsed = start.elapsed().as_nanos() as u64;

        if was_present {
            self.metrics.record_hit();
            self.metrics.record_get_timing(elapsed);
        } else {
            self.metrics.record_miss();
            self.metrics.record_put_timing(elapsed);
        }
        Ok(entry.bitmap)
    }

    fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }

    fn len(&self) -> usize {
        self.inner.entry_count() as usize
    }
}
