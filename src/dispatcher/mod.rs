//! # Dispatcher Module
//!
//! The dispatcher module defines what a handler is and how a request reaches
//! one through the worker pool.
//!
//! ## Overview
//!
//! - [`Handler`] is the single capability the pool consumes: write a response
//!   for a request into a [`ResponseSink`](crate::response_buffer::ResponseSink).
//!   Any `Fn(&mut dyn ResponseSink, &HandlerRequest)` closure is a handler.
//! - [`HandlerRequest`] is the owned request a job carries between coroutines.
//! - [`PooledHandler`] wraps a handler so every request becomes a job submitted
//!   to a [`WorkerPool`](crate::worker_pool::WorkerPool), and the calling
//!   coroutine blocks until that job completes.
//!
//! ## Request Flow
//!
//! 1. The transport builds a `HandlerRequest` and calls `PooledHandler::serve`
//! 2. The adapter derives a child context and submits a job
//! 3. The pool queues the job, or runs it inline when the queue is full
//! 4. The job's handler writes into a fresh response buffer, flushed once
//! 5. The completion signal fires and `serve` replays the output to the
//!    transport's sink
//!
//! ```rust,ignore
//! use gatepool::dispatcher::{HandlerRequest, PooledHandler};
//! use gatepool::response_buffer::ResponseSink;
//! use gatepool::worker_pool::{WorkerPool, WorkerPoolConfig};
//! use std::sync::Arc;
//!
//! let pool = Arc::new(WorkerPool::new("api", WorkerPoolConfig::default()));
//! pool.start()?;
//!
//! let handler = PooledHandler::new(
//!     |res: &mut dyn ResponseSink, req: &HandlerRequest| {
//!         res.write_json(200, &serde_json::json!({ "path": req.path }));
//!     },
//!     Arc::clone(&pool),
//! );
//! ```

mod core;
mod pooled;

pub use core::{
    BoxedHandler, Handler, HandlerRequest, HeaderVec, ParamVec, MAX_INLINE_HEADERS,
    MAX_INLINE_PARAMS,
};
pub use pooled::PooledHandler;
