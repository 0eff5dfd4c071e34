use super::signal::{Completion, JobOutcome};
use crate::dispatcher::{BoxedHandler, HandlerRequest};
use crate::ids::RequestId;
use crate::response_buffer::{ResponseBuffer, ResponseSink};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};
use tracing::error;

/// One unit of dispatchable work.
///
/// Nothing about a job changes after it is built except its completion
/// signal. Running consumes the job; a job dropped without running flushes a
/// `503` and completes as [`JobOutcome::Abandoned`], so no caller is left
/// waiting on a job that will never run.
pub(crate) struct Job {
    request: HandlerRequest,
    handler: BoxedHandler,
    /// Taken by `run`; still present on drop only if the job never ran.
    sink: Option<Box<dyn ResponseSink>>,
    done: Completion,
    enqueued_at: Instant,
}

impl Job {
    pub(crate) fn new(
        sink: Box<dyn ResponseSink>,
        request: HandlerRequest,
        handler: BoxedHandler,
        done: Completion,
    ) -> Self {
        Self {
            request,
            handler,
            sink: Some(sink),
            done,
            enqueued_at: Instant::now(),
        }
    }

    #[must_use]
    pub(crate) fn id(&self) -> RequestId {
        self.request.request_id
    }

    #[cfg(test)]
    pub(crate) fn request(&self) -> &HandlerRequest {
        &self.request
    }

    /// Time since the job was submitted.
    #[must_use]
    pub(crate) fn queue_wait(&self) -> Duration {
        self.enqueued_at.elapsed()
    }

    /// Run the handler against a fresh buffer, flush it, fire completion.
    ///
    /// A handler panic is converted into a `500` flush and
    /// [`JobOutcome::Panicked`]. If flushing itself unwinds, the completion
    /// guard still fires the signal before the panic leaves this frame.
    pub(crate) fn run(mut self) -> JobOutcome {
        let Some(sink) = self.sink.take() else {
            return self.done.outcome().unwrap_or(JobOutcome::Abandoned);
        };
        let guard = CompletionGuard::new(&self.done);
        let mut buffer = ResponseBuffer::new(sink);

        let served = panic::catch_unwind(AssertUnwindSafe(|| {
            self.handler.serve(&mut buffer, &self.request);
        }));

        let outcome = match served {
            Ok(()) => {
                buffer.flush();
                JobOutcome::Completed
            }
            Err(payload) => {
                error!(
                    request_id = %self.request.request_id,
                    method = %self.request.method,
                    path = %self.request.path,
                    panic_message = %panic_message(payload.as_ref()),
                    "Handler panicked - CRITICAL"
                );
                buffer.fail(500);
                JobOutcome::Panicked
            }
        };
        guard.finish(outcome);
        outcome
    }
}

impl Drop for Job {
    fn drop(&mut self) {
        if let Some(sink) = self.sink.take() {
            ResponseBuffer::new(sink).fail(503);
            self.done.complete(JobOutcome::Abandoned);
        }
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("request_id", &self.request.request_id)
            .field("method", &self.request.method)
            .field("path", &self.request.path)
            .field("enqueued_at", &self.enqueued_at)
            .field("done", &self.done)
            .finish()
    }
}

/// Fires the completion signal when dropped, unless `finish` already did.
struct CompletionGuard<'a> {
    done: &'a Completion,
    finished: bool,
}

impl<'a> CompletionGuard<'a> {
    fn new(done: &'a Completion) -> Self {
        Self {
            done,
            finished: false,
        }
    }

    fn finish(mut self, outcome: JobOutcome) {
        self.done.complete(outcome);
        self.finished = true;
    }
}

impl Drop for CompletionGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.done.complete(JobOutcome::Panicked);
        }
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
