//! # Request Context
//!
//! A cancellable, optionally deadline-bound execution context that travels with
//! every [`HandlerRequest`](crate::dispatcher::HandlerRequest).
//!
//! A job may run long after it was submitted and on a different coroutine than
//! the one that received the request. Handlers that want to stop early check
//! [`RequestContext::is_cancelled`]; the worker pool itself never interrupts a
//! running job.
//!
//! Contexts form a tree. A child is cancelled when its parent is, and its
//! effective deadline is the earlier of its own and its ancestors'.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Default)]
struct ContextInner {
    cancelled: AtomicBool,
    deadline: Option<Instant>,
    parent: Option<RequestContext>,
}

/// Cloneable handle to a node in the context tree.
#[derive(Clone, Default)]
pub struct RequestContext {
    inner: Arc<ContextInner>,
}

impl RequestContext {
    /// Root context: never cancelled unless [`cancel`](Self::cancel) is called.
    #[must_use]
    pub fn background() -> Self {
        Self::default()
    }

    /// Root context that reports cancelled once `deadline` has passed.
    #[must_use]
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                deadline: Some(deadline),
                ..ContextInner::default()
            }),
        }
    }

    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// Derive a child that is cancelled when `self` is.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                parent: Some(self.clone()),
                ..ContextInner::default()
            }),
        }
    }

    /// Cancel this context and, transitively, every descendant.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        let mut node = Some(self);
        while let Some(ctx) = node {
            if ctx.inner.cancelled.load(Ordering::Acquire) {
                return true;
            }
            node = ctx.inner.parent.as_ref();
        }
        self.deadline().is_some_and(|d| Instant::now() >= d)
    }

    /// Earliest deadline along the ancestor chain.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        let own = self.inner.deadline;
        let inherited = self.inner.parent.as_ref().and_then(RequestContext::deadline);
        match (own, inherited) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Time left before the deadline, `None` when there is no deadline.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline()
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Guard that cancels this context when dropped.
    #[must_use = "the context is cancelled as soon as the guard is dropped"]
    pub fn cancel_on_drop(&self) -> CancelOnDrop {
        CancelOnDrop(self.clone())
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("cancelled", &self.is_cancelled())
            .field("deadline", &self.deadline())
            .finish()
    }
}

/// Cancels the wrapped context on drop.
#[derive(Debug)]
pub struct CancelOnDrop(RequestContext);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}
