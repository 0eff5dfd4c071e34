//! One-shot completion signal and the worker liveness tracker.
//!
//! Both are a may `Mutex` + `Condvar` pair, so waiting parks a coroutine
//! instead of its carrier thread, and plain OS threads can wait too.

use may::sync::{Condvar, Mutex};
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, PoisonError};
use std::time::{Duration, Instant};

/// How a job left the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOutcome {
    /// The handler returned and its output was flushed.
    Completed,
    /// The handler panicked; a `500` was flushed instead.
    Panicked,
    /// The job was dropped before it started (pool shut down); a `503` was flushed.
    Abandoned,
}

struct CompletionInner {
    state: Mutex<Option<JobOutcome>>,
    cond: Condvar,
}

/// One-shot, multi-waiter completion signal.
///
/// Moves from pending to done exactly once. Every waiter, whenever it starts
/// waiting, observes the same [`JobOutcome`].
#[derive(Clone)]
pub struct Completion {
    inner: Arc<CompletionInner>,
}

impl Completion {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CompletionInner {
                state: Mutex::new(None),
                cond: Condvar::new(),
            }),
        }
    }

    /// Perform the pending -> done transition.
    ///
    /// Returns `false` (and changes nothing) if the signal already fired.
    pub fn complete(&self, outcome: JobOutcome) -> bool {
        let mut state = self
            .inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if state.is_some() {
            return false;
        }
        *state = Some(outcome);
        drop(state);
        self.inner.cond.notify_all();
        true
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.outcome().is_some()
    }

    #[must_use]
    pub fn outcome(&self) -> Option<JobOutcome> {
        *self
            .inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until the signal fires.
    pub fn wait(&self) -> JobOutcome {
        let mut state = self
            .inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(outcome) = *state {
                return outcome;
            }
            state = self
                .inner
                .cond
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Block until the signal fires or `timeout` elapses.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<JobOutcome> {
        let deadline = Instant::now() + timeout;
        let mut state = self
            .inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(outcome) = *state {
                return Some(outcome);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let (guard, _) = self
                .inner
                .cond
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            state = guard;
        }
    }
}

impl Default for Completion {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Completion").field(&self.outcome()).finish()
    }
}

/// Counts live workers so shutdown can wait for them with a deadline.
pub(crate) struct WaitGroup {
    count: Mutex<usize>,
    cond: Condvar,
}

impl WaitGroup {
    pub(crate) fn new() -> Self {
        Self {
            count: Mutex::new(0),
            cond: Condvar::new(),
        }
    }

    pub(crate) fn add(&self, n: usize) {
        *self.count.lock().unwrap_or_else(PoisonError::into_inner) += n;
    }

    pub(crate) fn done(&self) {
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        *count = count.saturating_sub(1);
        if *count == 0 {
            drop(count);
            self.cond.notify_all();
        }
    }

    pub(crate) fn count(&self) -> usize {
        *self.count.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait for the count to reach zero. Returns `false` on timeout.
    pub(crate) fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        while *count > 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .cond
                .wait_timeout(count, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            count = guard;
        }
        true
    }
}
