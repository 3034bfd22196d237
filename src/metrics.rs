use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Prometheus-style counters for observability.
/// All metrics are atomic so they can be read from any thread.
#[derive(Clone, Default)]
pub struct Metrics {
    /// Aggregator cache hits (blob or day already present)
    pub cache_hit_count: Arc<AtomicU64>,
    /// Aggregator cache misses (fetch issued)
    pub cache_miss_count: Arc<AtomicU64>,
    /// Individual backend requests issued
    pub fetch_count: Arc<AtomicU64>,
    /// Per-id fetch failures substituted with defaults
    pub fetch_failure_count: Arc<AtomicU64>,
    /// Batch merges committed to the cache
    pub batch_commit_count: Arc<AtomicU64>,
    /// Navigation cursor moves (select or advance)
    pub cursor_moves: Arc<AtomicU64>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cache_hit(&self) {
        self.cache_hit_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_miss_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fetch(&self) {
        self.fetch_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fetch_failure(&self) {
        self.fetch_failure_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_batch_commit(&self) {
        self.batch_commit_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cursor_move(&self) {
        self.cursor_moves.fetch_add(1, Ordering::Relaxed);
    }
}
