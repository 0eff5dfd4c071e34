//! # Worker Pool Module
//!
//! Bounded-concurrency execution for handlers. A [`WorkerPool`] owns N worker
//! coroutines that consume one bounded FIFO queue of jobs.
//!
//! ## Features
//!
//! - **Bounded queue**: at most `queue_capacity` jobs wait for a worker; a job
//!   handed straight to an idle worker does not use a slot
//! - **Inline fallback**: when the queue is full (or the pool is shut down) the
//!   job runs on the submitting coroutine instead of being rejected
//! - **Panic recovery**: a panicking handler produces a `500` and the worker
//!   keeps going
//! - **Bounded drain**: [`WorkerPool::shutdown`] waits for busy workers up to a
//!   deadline and answers still-queued jobs with `503`
//! - **Metrics**: queued/inline/completed/panicked/abandoned counters, queue
//!   wait, active workers and inline pressure
//!
//! ## Configuration
//!
//! - `GATEPOOL_WORKERS`: Number of worker coroutines (default: 4)
//! - `GATEPOOL_QUEUE_CAPACITY`: Jobs that may wait for a worker (default: 1024)
//! - `GATEPOOL_STACK_SIZE`: Worker coroutine stack size, decimal or `0x` hex (default: `0x10000`)
//! - `GATEPOOL_INLINE_WARN_THRESHOLD`: Inline jobs in flight before a warning (default: 256)
//!
//! ## Worker lifecycle
//!
//! A worker is idle until it takes a job, runs it to completion and goes back
//! to idle. It exits only when it observes shutdown while idle; a running job
//! is never cut short.

mod config;
mod core;
mod job;
mod metrics;
mod queue;
mod signal;

pub use config::{parse_stack_size, WorkerPoolConfig, MIN_STACK_SIZE};
pub use core::{ShutdownReport, Submitted, WorkerPool};
pub use metrics::{PoolStats, WorkerPoolMetrics};
pub use signal::{Completion, JobOutcome};
