use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

#[derive(Debug, Default)]
struct InnerMetrics {
    rows_written: AtomicU64,
    batches_flushed: AtomicU64,
    failure_count: AtomicU64,
    rollback_count: AtomicU64,
    checkpoint_count: AtomicU64,
}

#[derive(Debug, Clone)]
pub struct SinkMetrics {
    inner: Arc<InnerMetrics>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkMetricsSnapshot {
    pub rows_written: u64,
    pub batches_flushed: u64,
    pub failure_count: u64,
    pub rollback_count: u64,
    pub checkpoint_count: u64,
}

impl SinkMetrics {
    pub fn new() -> Self {
        SinkMetrics {
            inner: Arc::new(InnerMetrics::default()),
        }
    }

    pub fn increment_rows(&self, count: u64) {
        self.inner.rows_written.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_batches(&self, count: u64) {
        self.inner
            .batches_flushed
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_failures(&self, count: u64) {
        self.inner.failure_count.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_rollbacks(&self, count: u64) {
        self.inner.rollback_count.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_checkpoints(&self, count: u64) {
        self.inner
            .checkpoint_count
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SinkMetricsSnapshot {
        SinkMetricsSnapshot {
            rows_written: self.inner.rows_written.load(Ordering::Relaxed),
            batches_flushed: self.inner.batches_flushed.load(Ordering::Relaxed),
            failure_count: self.inner.failure_count.load(Ordering::Relaxed),
            rollback_count: self.inner.rollback_count.load(Ordering::Relaxed),
            checkpoint_count: self.inner.checkpoint_count.load(Ordering::Relaxed),
        }
    }
}

impl Default for SinkMetrics {
    fn default() -> Self {
        Self::new()
    }
}
