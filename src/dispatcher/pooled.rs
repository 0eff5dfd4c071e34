use super::core::{BoxedHandler, Handler, HandlerRequest};
use crate::response_buffer::{ResponseSink, SharedResponse};
use crate::worker_pool::WorkerPool;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Puts a [`WorkerPool`] in front of any handler.
///
/// `PooledHandler` is itself a [`Handler`], so it drops into any place a plain
/// handler is expected. From the caller's side a request is still handled
/// synchronously: `serve` returns only once the job has finished, whether it
/// ran on a pool worker or inline.
///
/// Each request runs under a child of the inbound request's context. The child
/// is cancelled when `serve` returns, so work the handler started on behalf of
/// the request can observe that the caller has gone away.
#[derive(Clone)]
pub struct PooledHandler {
    inner: BoxedHandler,
    pool: Arc<WorkerPool>,
}

impl PooledHandler {
    pub fn new<H: Handler + 'static>(handler: H, pool: Arc<WorkerPool>) -> Self {
        Self::from_arc(Arc::new(handler), pool)
    }

    #[must_use]
    pub fn from_arc(handler: BoxedHandler, pool: Arc<WorkerPool>) -> Self {
        Self {
            inner: handler,
            pool,
        }
    }

    #[must_use]
    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }
}

impl Handler for PooledHandler {
    fn serve(&self, res: &mut dyn ResponseSink, req: &HandlerRequest) {
        let context = req.context().child();
        let _cancel = context.cancel_on_drop();
        // The job outlives this borrow, so it gets its own copy of the request
        // (body included) carrying the child context.
        let request = req.clone().with_context(context);
        let request_id = request.request_id;

        // The job owns its sink; the borrowed transport sink is fed from the
        // captured copy after completion.
        let relay = SharedResponse::new();
        let start = Instant::now();
        let submitted = self
            .pool
            .submit(relay.clone(), request, Arc::clone(&self.inner));
        let outcome = submitted.done.wait();

        debug!(
            request_id = %request_id,
            pool = %self.pool.name(),
            queued = submitted.queued,
            outcome = ?outcome,
            latency_us = start.elapsed().as_micros() as u64,
            "Pooled request finished"
        );

        relay.replay(res);
    }
}

impl std::fmt::Debug for PooledHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledHandler")
            .field("pool", &self.pool.name())
            .finish_non_exhaustive()
    }
}
