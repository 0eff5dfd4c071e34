use super::config::WorkerPoolConfig;
use super::job::{panic_message, Job};
use super::metrics::{PoolStats, WorkerPoolMetrics};
use super::queue::{JobQueue, Refusal};
use super::signal::{Completion, JobOutcome, WaitGroup};
use crate::dispatcher::{BoxedHandler, HandlerRequest};
use crate::response_buffer::ResponseSink;
use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// How long `start` waits for freshly spawned workers to park.
const READY_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of [`WorkerPool::submit`].
#[derive(Debug, Clone)]
pub struct Submitted {
    /// `true` if a worker will run the job; `false` if it already ran inline.
    pub queued: bool,
    /// Fires when the job's output has been flushed.
    pub done: Completion,
}

/// What [`WorkerPool::shutdown`] managed to do before returning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShutdownReport {
    /// Every worker exited before the deadline.
    pub drained: bool,
    /// Queued jobs dropped without running. Each got a `503`.
    pub abandoned_jobs: usize,
    /// Workers still running a job when the deadline passed.
    pub workers_remaining: usize,
}

/// A fixed set of worker coroutines consuming one bounded FIFO queue.
///
/// When the queue has no room the job runs inline on the submitting coroutine
/// instead of being rejected, so the pool bounds concurrency on the queued path
/// without ever refusing work.
pub struct WorkerPool {
    name: String,
    config: WorkerPoolConfig,
    queue: Arc<JobQueue>,
    metrics: Arc<WorkerPoolMetrics>,
    workers: Arc<WaitGroup>,
    started: AtomicBool,
    shut_down: AtomicBool,
}

impl WorkerPool {
    /// Build a pool. No workers run until [`start`](Self::start).
    pub fn new(name: impl Into<String>, config: WorkerPoolConfig) -> Self {
        let name = name.into();
        let mut config = config;
        if config.num_workers == 0 {
            warn!(pool = %name, "Worker pool configured with zero workers, using one");
            config.num_workers = 1;
        }
        Self {
            queue: Arc::new(JobQueue::new(config.queue_capacity)),
            metrics: Arc::new(WorkerPoolMetrics::new()),
            workers: Arc::new(WaitGroup::new()),
            started: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
            name,
            config,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn config(&self) -> &WorkerPoolConfig {
        &self.config
    }

    /// Get metrics for this worker pool
    #[must_use]
    pub fn metrics(&self) -> &Arc<WorkerPoolMetrics> {
        &self.metrics
    }

    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.metrics.snapshot(self.queue.depth())
    }

    /// Workers that have not exited yet.
    #[must_use]
    pub fn live_workers(&self) -> usize {
        self.workers.count()
    }

    /// Workers parked waiting for a job.
    #[must_use]
    pub fn idle_workers(&self) -> usize {
        self.queue.idle_workers()
    }

    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Spawn the worker coroutines.
    ///
    /// Returns once every worker is parked waiting for work. Calling `start`
    /// again is a no-op. If a worker cannot be spawned the queue is closed, so
    /// the ones already running exit, and the error is returned.
    pub fn start(&self) -> Result<()> {
        if self.started.swap(true, Ordering::AcqRel) {
            warn!(pool = %self.name, "Worker pool already started");
            return Ok(());
        }
        if self.is_shut_down() {
            bail!("worker pool '{}' was shut down before it started", self.name);
        }

        info!(
            pool = %self.name,
            num_workers = self.config.num_workers,
            queue_capacity = self.config.queue_capacity,
            stack_size = self.config.stack_size,
            "Starting worker pool"
        );

        for worker_id in 0..self.config.num_workers {
            let worker = Worker {
                id: worker_id,
                pool: self.name.clone(),
                queue: Arc::clone(&self.queue),
                metrics: Arc::clone(&self.metrics),
                alive: Arc::clone(&self.workers),
            };
            self.workers.add(1);

            // SAFETY: may::coroutine::Builder::spawn() is marked unsafe by the may runtime.
            // The closure owns everything it touches (Arc handles and a String), so it
            // cannot outlive borrowed data, and the worker never blocks its carrier
            // thread: all waiting goes through may's Mutex/Condvar.
            #[allow(unsafe_code)]
            let spawned = unsafe {
                may::coroutine::Builder::new()
                    .name(format!("{}-worker-{}", self.name, worker_id))
                    .stack_size(self.config.stack_size)
                    .spawn(move || worker.run())
            };

            if let Err(e) = spawned {
                self.workers.done();
                error!(
                    pool = %self.name,
                    worker_id = worker_id,
                    error = %e,
                    "Failed to spawn worker coroutine"
                );
                self.abandon_queued();
                return Err(e).with_context(|| {
                    format!("failed to spawn worker {worker_id} for pool '{}'", self.name)
                });
            }
        }

        if !self
            .queue
            .wait_for_idle(self.config.num_workers, READY_TIMEOUT)
        {
            warn!(
                pool = %self.name,
                idle_workers = self.queue.idle_workers(),
                num_workers = self.config.num_workers,
                "Not every worker was idle when start returned"
            );
        }
        Ok(())
    }

    /// Hand a job to the pool without ever blocking for queue space.
    ///
    /// The job is queued when there is room (a waiting worker counts as room).
    /// Otherwise, and always after shutdown, it runs right here and
    /// `done` has already fired when this returns.
    pub fn submit<S>(&self, sink: S, request: HandlerRequest, handler: BoxedHandler) -> Submitted
    where
        S: ResponseSink + 'static,
    {
        let request_id = request.request_id;
        let done = Completion::new();
        let job = Job::new(Box::new(sink), request, handler, done.clone());

        match self.queue.try_push(job) {
            Ok(depth) => {
                self.metrics.record_queued();
                debug!(
                    request_id = %request_id,
                    pool = %self.name,
                    queue_depth = depth,
                    "Job queued"
                );
                Submitted { queued: true, done }
            }
            Err((job, refusal)) => {
                self.run_inline(job, refusal);
                Submitted {
                    queued: false,
                    done,
                }
            }
        }
    }

    fn run_inline(&self, job: Job, refusal: Refusal) {
        let in_flight = self.metrics.record_inline_start();
        let _slot = InlineSlot(&self.metrics);

        debug!(
            request_id = %job.id(),
            pool = %self.name,
            reason = refusal.as_str(),
            inline_in_flight = in_flight,
            "Running job inline"
        );
        // Warn on the crossing only, not for every job above it
        if in_flight == self.config.inline_warn_threshold.saturating_add(1) {
            warn!(
                pool = %self.name,
                inline_in_flight = in_flight,
                threshold = self.config.inline_warn_threshold,
                "Inline executions above threshold, pool is saturated"
            );
        }

        let outcome = job.run();
        record_outcome(&self.metrics, outcome);
    }

    /// Stop the pool, waiting up to `timeout` for busy workers to finish.
    ///
    /// Jobs still in the queue are dropped: each flushes a `503` and completes
    /// as [`JobOutcome::Abandoned`]. Jobs already running are never interrupted;
    /// past the deadline they keep running detached and this returns anyway.
    pub fn shutdown(&self, timeout: Duration) -> ShutdownReport {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            debug!(pool = %self.name, "Worker pool already shut down");
            let remaining = self.workers.count();
            return ShutdownReport {
                drained: remaining == 0,
                abandoned_jobs: 0,
                workers_remaining: remaining,
            };
        }

        let start = Instant::now();
        info!(
            pool = %self.name,
            timeout_ms = timeout.as_millis() as u64,
            active_workers = self.metrics.get_active_workers(),
            "Shutting down worker pool"
        );

        let abandoned_jobs = self.abandon_queued();
        let drained = self.workers.wait_timeout(timeout);
        let workers_remaining = self.workers.count();

        if drained {
            info!(
                pool = %self.name,
                abandoned_jobs = abandoned_jobs,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Worker pool stopped"
            );
        } else {
            warn!(
                pool = %self.name,
                workers_remaining = workers_remaining,
                timeout_ms = timeout.as_millis() as u64,
                "Shutdown deadline exceeded, in-flight jobs continue detached"
            );
        }

        ShutdownReport {
            drained,
            abandoned_jobs,
            workers_remaining,
        }
    }

    /// Close the queue and drop whatever was still waiting in it.
    fn abandon_queued(&self) -> usize {
        let stranded = self.queue.close();
        let count = stranded.len();
        if count > 0 {
            warn!(
                pool = %self.name,
                abandoned_jobs = count,
                "Dropping queued jobs that never started"
            );
            self.metrics.record_abandoned(count);
        }
        drop(stranded);
        count
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if !self.shut_down.load(Ordering::Acquire) {
            self.abandon_queued();
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("live_workers", &self.workers.count())
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}

struct Worker {
    id: usize,
    pool: String,
    queue: Arc<JobQueue>,
    metrics: Arc<WorkerPoolMetrics>,
    alive: Arc<WaitGroup>,
}

impl Worker {
    fn run(self) {
        let _alive = Liveness(&self.alive);
        debug!(pool = %self.pool, worker_id = self.id, "Worker coroutine started");

        let mut processed: u64 = 0;
        while let Some(job) = self.queue.pop() {
            let request_id = job.id();
            let wait = job.queue_wait();
            self.metrics.record_dequeue(wait);
            debug!(
                request_id = %request_id,
                pool = %self.pool,
                worker_id = self.id,
                queue_wait_us = wait.as_micros() as u64,
                "Worker processing job"
            );

            self.metrics.worker_busy();
            // Job::run recovers handler panics; this catches anything that
            // escapes it so the worker survives.
            let result = panic::catch_unwind(AssertUnwindSafe(|| job.run()));
            self.metrics.worker_idle();

            match result {
                Ok(outcome) => record_outcome(&self.metrics, outcome),
                Err(payload) => {
                    error!(
                        request_id = %request_id,
                        pool = %self.pool,
                        worker_id = self.id,
                        panic_message = %panic_message(payload.as_ref()),
                        "Job panicked outside the handler - CRITICAL"
                    );
                    self.metrics.record_panic();
                }
            }
            processed += 1;
        }

        debug!(
            pool = %self.pool,
            worker_id = self.id,
            processed = processed,
            "Worker coroutine exiting"
        );
    }
}

fn record_outcome(metrics: &WorkerPoolMetrics, outcome: JobOutcome) {
    match outcome {
        JobOutcome::Completed => metrics.record_completion(),
        JobOutcome::Panicked => metrics.record_panic(),
        JobOutcome::Abandoned => metrics.record_abandoned(1),
    }
}

/// Marks a worker as exited however its loop ends.
struct Liveness<'a>(&'a WaitGroup);

impl Drop for Liveness<'_> {
    fn drop(&mut self) {
        self.0.done();
    }
}

struct InlineSlot<'a>(&'a WorkerPoolMetrics);

impl Drop for InlineSlot<'_> {
    fn drop(&mut self) {
        self.0.record_inline_end();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response_buffer::SharedResponse;
    use http::Method;

    fn ok_handler() -> BoxedHandler {
        Arc::new(|res: &mut dyn ResponseSink, _req: &HandlerRequest| {
            res.write_status(204);
        })
    }

    #[test]
    fn test_zero_workers_is_clamped() {
        let pool = WorkerPool::new("clamp", WorkerPoolConfig::new(0, 1));
        assert_eq!(pool.config().num_workers, 1);
    }

    #[test]
    fn test_unstarted_pool_with_no_capacity_runs_inline() {
        let pool = WorkerPool::new("inline", WorkerPoolConfig::new(1, 0));
        let out = SharedResponse::new();
        let submitted = pool.submit(
            out.clone(),
            HandlerRequest::new(Method::GET, "/"),
            ok_handler(),
        );

        assert!(!submitted.queued);
        assert_eq!(submitted.done.outcome(), Some(JobOutcome::Completed));
        assert_eq!(out.snapshot().status, Some(204));

        let stats = pool.stats();
        assert_eq!(stats.inline, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.inline_in_flight, 0);
    }

    #[test]
    fn test_shutdown_abandons_queued_jobs() {
        let pool = WorkerPool::new("abandon", WorkerPoolConfig::new(1, 2));
        let out = SharedResponse::new();
        let submitted = pool.submit(
            out.clone(),
            HandlerRequest::new(Method::GET, "/"),
            ok_handler(),
        );
        assert!(submitted.queued);

        let report = pool.shutdown(Duration::from_millis(10));
        assert!(report.drained);
        assert_eq!(report.abandoned_jobs, 1);
        assert_eq!(submitted.done.outcome(), Some(JobOutcome::Abandoned));
        assert_eq!(out.snapshot().status, Some(503));

        // Second call changes nothing
        let again = pool.shutdown(Duration::from_millis(10));
        assert_eq!(again.abandoned_jobs, 0);
    }

    #[test]
    fn test_start_after_shutdown_fails() {
        let pool = WorkerPool::new("late", WorkerPoolConfig::new(1, 0));
        pool.shutdown(Duration::from_millis(10));
        assert!(pool.start().is_err());
    }

    #[test]
    fn test_huge_queue_capacity_is_accepted() {
        let config = WorkerPoolConfig::new(1, usize::MAX);
        assert!(config.validate().is_ok());

        let pool = WorkerPool::new("huge", config);
        let submitted = pool.submit(
            SharedResponse::new(),
            HandlerRequest::new(Method::GET, "/"),
            ok_handler(),
        );
        assert!(submitted.queued);
        assert_eq!(pool.stats().queue_depth, 1);
    }
}
