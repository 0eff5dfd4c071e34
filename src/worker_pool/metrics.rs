use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Metrics for a worker pool
///
/// All counters are relaxed atomics; a [`PoolStats`] snapshot is consistent
/// per field, not across fields.
#[derive(Debug, Default)]
pub struct WorkerPoolMetrics {
    /// Jobs accepted onto the queue
    pub queued_count: AtomicU64,
    /// Jobs run on the submitting context because the queue was full or closed
    pub inline_count: AtomicU64,
    /// Jobs whose handler returned normally
    pub completed_count: AtomicU64,
    /// Jobs whose handler panicked
    pub panicked_count: AtomicU64,
    /// Jobs dropped at shutdown before any worker started them
    pub abandoned_count: AtomicU64,
    /// Workers currently running a job
    pub active_workers: AtomicUsize,
    /// Inline jobs currently running
    pub inline_in_flight: AtomicUsize,
    /// Highest `inline_in_flight` seen
    pub inline_peak: AtomicUsize,
    /// Sum of queue wait for dequeued jobs, microseconds
    pub queue_wait_total_us: AtomicU64,
    /// Longest queue wait seen, microseconds
    pub queue_wait_max_us: AtomicU64,
}

impl WorkerPoolMetrics {
    /// Create new metrics
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_queued(&self) {
        self.queued_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the start of an inline job, returning how many are now running.
    pub fn record_inline_start(&self) -> usize {
        self.inline_count.fetch_add(1, Ordering::Relaxed);
        let now = self.inline_in_flight.fetch_add(1, Ordering::Relaxed) + 1;
        self.inline_peak.fetch_max(now, Ordering::Relaxed);
        now
    }

    pub fn record_inline_end(&self) {
        self.inline_in_flight.fetch_sub(1, Ordering::Relaxed);
    }

    /// Record a job leaving the queue after waiting `wait`.
    pub fn record_dequeue(&self, wait: Duration) {
        let us = u64::try_from(wait.as_micros()).unwrap_or(u64::MAX);
        self.queue_wait_total_us.fetch_add(us, Ordering::Relaxed);
        self.queue_wait_max_us.fetch_max(us, Ordering::Relaxed);
    }

    pub fn worker_busy(&self) {
        self.active_workers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn worker_idle(&self) {
        self.active_workers.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_completion(&self) {
        self.completed_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_panic(&self) {
        self.panicked_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_abandoned(&self, n: usize) {
        self.abandoned_count.fetch_add(n as u64, Ordering::Relaxed);
    }

    /// Get total queued count
    pub fn get_queued_count(&self) -> u64 {
        self.queued_count.load(Ordering::Relaxed)
    }

    /// Get total inline count
    pub fn get_inline_count(&self) -> u64 {
        self.inline_count.load(Ordering::Relaxed)
    }

    /// Get total completed count
    pub fn get_completed_count(&self) -> u64 {
        self.completed_count.load(Ordering::Relaxed)
    }

    pub fn get_panicked_count(&self) -> u64 {
        self.panicked_count.load(Ordering::Relaxed)
    }

    pub fn get_abandoned_count(&self) -> u64 {
        self.abandoned_count.load(Ordering::Relaxed)
    }

    pub fn get_active_workers(&self) -> usize {
        self.active_workers.load(Ordering::Relaxed)
    }

    pub fn get_inline_peak(&self) -> usize {
        self.inline_peak.load(Ordering::Relaxed)
    }

    /// Point-in-time view; `queue_depth` comes from the queue itself.
    #[must_use]
    pub fn snapshot(&self, queue_depth: usize) -> PoolStats {
        let queued = self.get_queued_count();
        let wait_total = self.queue_wait_total_us.load(Ordering::Relaxed);
        PoolStats {
            queued,
            inline: self.get_inline_count(),
            completed: self.get_completed_count(),
            panicked: self.get_panicked_count(),
            abandoned: self.get_abandoned_count(),
            queue_depth,
            active_workers: self.get_active_workers(),
            inline_in_flight: self.inline_in_flight.load(Ordering::Relaxed),
            inline_peak: self.get_inline_peak(),
            avg_queue_wait_us: if queued == 0 { 0 } else { wait_total / queued },
            max_queue_wait_us: self.queue_wait_max_us.load(Ordering::Relaxed),
        }
    }
}

/// Serializable snapshot of [`WorkerPoolMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub queued: u64,
    pub inline: u64,
    pub completed: u64,
    pub panicked: u64,
    pub abandoned: u64,
    pub queue_depth: usize,
    pub active_workers: usize,
    pub inline_in_flight: usize,
    pub inline_peak: usize,
    pub avg_queue_wait_us: u64,
    pub max_queue_wait_us: u64,
}
