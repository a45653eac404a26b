//! Ready queue: admitted jobs waiting for a worker.
//!
//! The queue itself is plain data. It lives inside the registry's lock so that
//! admission can insert into the dedup index and push here in one step; the
//! blocking side (waiting for an item, closing, cancellation) is driven by
//! [`crate::registry::JobRegistry::next_ready`].

use std::collections::VecDeque;

use crate::job::SharedJob;

/// FIFO of jobs not yet picked up, plus the "no more items" flag.
#[derive(Debug, Default)]
pub struct ReadyQueue {
    items: VecDeque<SharedJob>,
    closed: bool,
}

/// Result of trying to take the next job without waiting.
#[derive(Debug)]
pub enum TryPop {
    Job(SharedJob),
    /// Open but currently empty; the caller should wait for a wakeup.
    Empty,
    /// Closed and empty; consumers should exit.
    Finished,
}

impl ReadyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a job. Returns the job back if the queue is closed.
    pub fn push(&mut self, job: SharedJob) -> Result<(), SharedJob> {
        if self.closed {
            return Err(job);
        }
        self.items.push_back(job);
        Ok(())
    }

    pub fn try_pop(&mut self) -> TryPop {
        match self.items.pop_front() {
            Some(job) => TryPop::Job(job),
            None if self.closed => TryPop::Finished,
            None => TryPop::Empty,
        }
    }

    /// Marks that no further items will be added. Queued items stay.
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
