//! Bounded FIFO job queue shared by the pool's workers.
//!
//! A lock-protected `VecDeque` plus two condition variables: one wakes workers
//! when a job arrives or the queue closes, the other lets `start` wait until
//! every worker is parked and ready.
//!
//! Admission mirrors a buffered channel: a job handed to a worker that is
//! already waiting does not take up a queue slot. A job is accepted while
//! `jobs.len() < capacity + idle_workers`.

use super::job::Job;
use may::sync::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::PoisonError;
use std::time::{Duration, Instant};

/// Upper bound on slots reserved up front; larger queues grow on demand.
const PREALLOCATED_SLOTS: usize = 1024;

/// Why a job was not queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Refusal {
    Full,
    Closed,
}

impl Refusal {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Refusal::Full => "queue_full",
            Refusal::Closed => "pool_shut_down",
        }
    }
}

struct QueueState {
    jobs: VecDeque<Job>,
    /// Workers parked in `pop` with nothing to run.
    idle: usize,
    closed: bool,
}

pub(crate) struct JobQueue {
    capacity: usize,
    state: Mutex<QueueState>,
    available: Condvar,
    idle_changed: Condvar,
}

impl JobQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(QueueState {
                jobs: VecDeque::with_capacity(capacity.min(PREALLOCATED_SLOTS)),
                idle: 0,
                closed: false,
            }),
            available: Condvar::new(),
            idle_changed: Condvar::new(),
        }
    }

    /// Non-blocking enqueue. Hands the job back when it cannot be accepted.
    ///
    /// On success returns the number of jobs waiting, this one included.
    pub(crate) fn try_push(&self, job: Job) -> Result<usize, (Job, Refusal)> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.closed {
            return Err((job, Refusal::Closed));
        }
        if state.jobs.len() >= self.capacity.saturating_add(state.idle) {
            return Err((job, Refusal::Full));
        }
        state.jobs.push_back(job);
        let depth = state.jobs.len();
        drop(state);
        self.available.notify_one();
        Ok(depth)
    }

    /// Block until a job is available or the queue closes.
    ///
    /// Closing wins over pending jobs: a worker that finds the queue closed
    /// exits without draining it.
    pub(crate) fn pop(&self) -> Option<Job> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if state.closed {
                return None;
            }
            if let Some(job) = state.jobs.pop_front() {
                return Some(job);
            }
            state.idle += 1;
            self.idle_changed.notify_all();
            state = self
                .available
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
            state.idle -= 1;
        }
    }

    /// Close the queue, wake every worker, and hand back jobs nobody started.
    pub(crate) fn close(&self) -> Vec<Job> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.closed = true;
        let stranded: Vec<Job> = state.jobs.drain(..).collect();
        drop(state);
        self.available.notify_all();
        self.idle_changed.notify_all();
        stranded
    }

    /// Wait until at least `n` workers are parked. Returns `false` on timeout
    /// or if the queue closes first.
    pub(crate) fn wait_for_idle(&self, n: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        while state.idle < n {
            let now = Instant::now();
            if state.closed || now >= deadline {
                return false;
            }
            let (guard, _) = self
                .idle_changed
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            state = guard;
        }
        true
    }

    pub(crate) fn depth(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .jobs
            .len()
    }

    pub(crate) fn idle_workers(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .idle
    }

    #[cfg(test)]
    pub(crate) fn is_closed(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .closed
    }
}
