//! # gatepool
//!
//! **gatepool** is a bounded-concurrency dispatcher for coroutine HTTP handlers. It sits
//! between the `may_minihttp` transport and request-handling logic, caps how many requests
//! run at once, and under overload degrades to running work on the caller instead of
//! rejecting it.
//!
//! ## Overview
//!
//! - **[`worker_pool`]** - N worker coroutines over one bounded FIFO queue, inline
//!   fallback, panic recovery and a deadline-bounded drain
//! - **[`response_buffer`]** - Buffers a handler's status, headers and body and flushes
//!   them exactly once
//! - **[`dispatcher`]** - The [`Handler`](dispatcher::Handler) contract and
//!   [`PooledHandler`](dispatcher::PooledHandler), which routes any handler through a pool
//! - **[`context`]** - Cancellable, deadline-aware request contexts
//! - **[`server`]** - `may_minihttp` service and server handle
//! - **[`handlers`]** - Health, pool stats and demo handlers plus a small routing table
//! - **[`config`]** / **[`logging`]** / **[`cli`]** - The `gatepool` binary's plumbing
//!
//! ### Request Handling Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Client
//!     participant Server as GatewayService<br/>(may_minihttp)
//!     participant Adapter as PooledHandler
//!     participant Pool as WorkerPool
//!     participant Worker as Worker<br/>(Coroutine)
//!     participant Handler
//!
//!     Client->>Server: HTTP Request
//!     Server->>Adapter: serve(sink, request)
//!     Adapter->>Adapter: Child context (cancelled on return)
//!     Adapter->>Pool: submit(job)
//!
//!     alt Room in queue (or an idle worker)
//!         Pool->>Worker: FIFO hand-off
//!         Worker->>Handler: serve(ResponseBuffer, request)
//!         Worker->>Worker: flush once, fire completion
//!     else Queue full or pool shut down
//!         Pool->>Handler: run inline on the caller
//!         Pool->>Pool: flush once, fire completion
//!     end
//!
//!     Adapter->>Adapter: wait for completion
//!     Adapter-->>Server: captured response
//!     Server-->>Client: HTTP Response
//! ```
//!
//! ### Shutdown
//!
//! [`WorkerPool::shutdown`](worker_pool::WorkerPool::shutdown) closes the queue. Jobs that
//! were still waiting are answered with `503`; jobs already running finish normally. The
//! call returns when every worker has exited or the deadline passes, whichever comes first.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use gatepool::dispatcher::PooledHandler;
//! use gatepool::handlers::{echo, health, Routes};
//! use gatepool::server::{GatewayService, HttpServer};
//! use gatepool::worker_pool::{WorkerPool, WorkerPoolConfig};
//! use http::Method;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let pool = Arc::new(WorkerPool::new("api", WorkerPoolConfig::from_env()));
//! pool.start()?;
//!
//! let routes = Routes::new()
//!     .route(Method::GET, "/health", health)
//!     .route(Method::POST, "/echo", PooledHandler::new(echo, Arc::clone(&pool)));
//!
//! let handle = HttpServer(GatewayService::new(Arc::new(routes))).start("0.0.0.0:8080")?;
//! // ... until shutdown
//! handle.stop();
//! pool.shutdown(Duration::from_secs(30));
//! ```
//!
//! ## Running the binary
//!
//! ```bash
//! gatepool serve --workers 8 --queue-capacity 64
//!
//! curl http://localhost:8080/health
//! curl -X POST -d '{"hello":"world"}' http://localhost:8080/echo
//! curl 'http://localhost:8080/sleep?ms=250'
//! curl http://localhost:8080/pool/stats
//! ```

pub mod cli;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod handlers;
pub mod ids;
pub mod logging;
pub mod response_buffer;
pub mod server;
pub mod worker_pool;

pub use config::AppConfig;
pub use dispatcher::{Handler, HandlerRequest, PooledHandler};
pub use response_buffer::{ResponseBuffer, ResponseSink};
pub use worker_pool::{WorkerPool, WorkerPoolConfig};
