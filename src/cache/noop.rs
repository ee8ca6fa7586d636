//! A cache that never stores anything: every lookup misses and every
//! `get_with` call invokes `build` directly. Useful as a baseline for
//! benchmarking cache effectiveness and for tests that want to force the
//! evaluator's cache-miss path.

use std::time::Instant;

use super::{BuildFuture, Cache, CacheMetrics};
use crate::bitmap::CombinationBitmap;
use crate::error::CacheError;

#[derive(Default)]
pub struct NoOpCache {
    metrics: CacheMetrics,
}

impl NoOpCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl Cache for NoOpCache {
    async fn get(&self, _key: u128) -> Option<CombinationBitmap> {
        let start = Instant::now();
        self.metrics.record_miss();
        self.metrics.record_get_timing(start.elapsed().as_nanos() as u64);
        None
    }

    async fn get_with(
        &self,
        _key: u128,
        build: Box<dyn FnOnce() -> BuildFuture + Send>,
    ) -> Result<CombinationBitmap, CacheError> {
        self.metrics.record_miss();
        let start = Instant::now();
        let result = build().await;
        self.metrics.record_put_timing(start.elapsed().as_nanos() as u64);
        result
    }

    fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }

    fn len(&self) -> usize {
        0
    }
}
