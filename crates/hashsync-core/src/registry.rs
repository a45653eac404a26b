//! Job registry: dedup index, ready queue and lifecycle buckets.
//!
//! Everything lives behind one lock so that admission (dedup check, index
//! insert, queue push) is a single step, and so that dequeue-time pause checks
//! and pause/resume broadcasts cannot interleave.

use std::collections::{BTreeMap, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::error::EngineError;
use crate::job::{ContentHash, JobOutcome, SharedJob};
use crate::pool::panic_message;
use crate::queue::{ReadyQueue, TryPop};

/// Result of [`JobRegistry::admit`].
#[derive(Debug, Clone)]
pub enum Admission {
    /// New hash; the job is queued.
    Accepted(SharedJob),
    /// Hash already admitted; carries the original job.
    Duplicate(SharedJob),
    /// The registry no longer accepts jobs (drained). Carries the resident job
    /// for that hash, if any.
    Closed { existing: Option<SharedJob> },
}

impl Admission {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Admission::Accepted(_))
    }

    /// The job now registered under the hash, if there is one.
    pub fn resident(&self) -> Option<&SharedJob> {
        match self {
            Admission::Accepted(job) | Admission::Duplicate(job) => Some(job),
            Admission::Closed { existing } => existing.as_ref(),
        }
    }
}

/// Where an admitted hash currently sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Active,
    Completed,
    Failed,
    Cancelled,
}

/// Outcome of waiting for the next ready job.
#[derive(Debug)]
pub enum Dequeue {
    Job(SharedJob),
    /// Queue closed and empty.
    Drained,
    Cancelled,
}

#[derive(Debug, Clone)]
pub(crate) struct FailedEntry {
    pub(crate) job: SharedJob,
    pub(crate) detail: Option<String>,
}

#[derive(Debug)]
pub(crate) struct Books {
    pub(crate) accepting: bool,
    pub(crate) admitted: HashMap<ContentHash, SharedJob>,
    pub(crate) queue: ReadyQueue,
    pub(crate) active: HashMap<ContentHash, SharedJob>,
    pub(crate) completed: BTreeMap<ContentHash, SharedJob>,
    pub(crate) failed: BTreeMap<ContentHash, FailedEntry>,
    pub(crate) cancelled: BTreeMap<ContentHash, SharedJob>,
}

impl Books {
    fn new() -> Self {
        Self {
            accepting: true,
            admitted: HashMap::new(),
            queue: ReadyQueue::new(),
            active: HashMap::new(),
            completed: BTreeMap::new(),
            failed: BTreeMap::new(),
            cancelled: BTreeMap::new(),
        }
    }
}

/// Shared bookkeeping for one manager instance.
#[derive(Debug)]
pub struct JobRegistry {
    books: Mutex<Books>,
    ready: Notify,
    paused: AtomicBool,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            books: Mutex::new(Books::new()),
            ready: Notify::new(),
            paused: AtomicBool::new(false),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Books> {
        self.books.lock()
    }

    /// Admits a job unless its hash is known or the registry is closed.
    pub fn admit(&self, job: SharedJob) -> Admission {
        let hash = job.hash().clone();
        let mut books = self.lock();
        if !books.accepting {
            return Admission::Closed {
                existing: books.admitted.get(&hash).cloned(),
            };
        }
        if let Some(existing) = books.admitted.get(&hash) {
            tracing::debug!(hash = %hash, "duplicate job rejected");
            return Admission::Duplicate(Arc::clone(existing));
        }
        // accepting and queue-open flip together under this lock
        if books.queue.push(Arc::clone(&job)).is_err() {
            return Admission::Closed { existing: None };
        }
        books.admitted.insert(hash.clone(), Arc::clone(&job));
        drop(books);

        self.ready.notify_one();
        tracing::debug!(hash = %hash, "job admitted");
        Admission::Accepted(job)
    }

    pub fn lookup(&self, hash: &ContentHash) -> Option<SharedJob> {
        self.lock().admitted.get(hash).cloned()
    }

    pub fn status(&self, hash: &ContentHash) -> Option<JobStatus> {
        let books = self.lock();
        if !books.admitted.contains_key(hash) {
            return None;
        }
        let status = if books.active.contains_key(hash) {
            JobStatus::Active
        } else if books.completed.contains_key(hash) {
            JobStatus::Completed
        } else if books.failed.contains_key(hash) {
            JobStatus::Failed
        } else if books.cancelled.contains_key(hash) {
            JobStatus::Cancelled
        } else {
            JobStatus::Queued
        };
        Some(status)
    }

    pub fn is_accepting(&self) -> bool {
        self.lock().accepting
    }

    /// Stops admissions for good and closes the ready queue.
    pub fn close(&self) {
        {
            let mut books = self.lock();
            books.accepting = false;
            books.queue.close();
        }
        self.ready.notify_waiters();
    }

    /// Waits for the next ready job and moves it into the active set.
    ///
    /// If the registry is paused and the job can pause, the job is paused
    /// before being returned.
    pub async fn next_ready(&self, cancel: &CancellationToken) -> Result<Dequeue, EngineError> {
        loop {
            if cancel.is_cancelled() {
                return Ok(Dequeue::Cancelled);
            }
            let notified = self.ready.notified();
            tokio::pin!(notified);
            // register before checking so a push between check and await is not lost
            notified.as_mut().enable();
            {
                let mut books = self.lock();
                match books.queue.try_pop() {
                    TryPop::Job(job) => return self.activate(&mut books, job).map(Dequeue::Job),
                    TryPop::Finished => return Ok(Dequeue::Drained),
                    TryPop::Empty => {}
                }
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(Dequeue::Cancelled),
                _ = &mut notified => {}
            }
        }
    }

    fn activate(&self, books: &mut Books, job: SharedJob) -> Result<SharedJob, EngineError> {
        let hash = job.hash().clone();
        if books.active.insert(hash.clone(), Arc::clone(&job)).is_some() {
            return Err(EngineError::AlreadyActive(hash));
        }
        if self.paused.load(Ordering::Acquire) && job.can_pause() {
            if let Err(reason) = call_hook(&job, true) {
                let outcome = JobOutcome::failed(format!("pause hook panicked: {}", reason));
                books.settle(&job, &hash, &outcome);
                tracing::warn!(hash = %hash, "pause hook panicked on dequeue, job failed");
                return Err(EngineError::PauseHook { hash, reason });
            }
        }
        Ok(job)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Sets the pause flag. On an actual change every active pausable job gets
    /// exactly one `pause()`/`resume()`. Returns whether the flag changed.
    pub fn set_paused(&self, paused: bool) -> bool {
        let books = self.lock();
        if self.paused.swap(paused, Ordering::AcqRel) == paused {
            return false;
        }
        let mut touched = 0usize;
        for job in books.active.values().filter(|j| j.can_pause()) {
            match call_hook(job, paused) {
                Ok(()) => touched += 1,
                Err(reason) => {
                    tracing::warn!(hash = %job.hash(), paused, "pause hook panicked: {}", reason)
                }
            }
        }
        tracing::debug!(paused, jobs = touched, "pause state changed");
        true
    }

    pub fn active_len(&self) -> usize {
        self.lock().active.len()
    }

    pub fn queued_len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn admitted_len(&self) -> usize {
        self.lock().admitted.len()
    }

    pub fn active_hashes(&self) -> Vec<ContentHash> {
        let mut v: Vec<_> = self.lock().active.keys().cloned().collect();
        v.sort();
        v
    }

    /// Snapshot of jobs that finished successfully, ordered by hash.
    pub fn completed_jobs(&self) -> Vec<SharedJob> {
        self.lock().completed.values().cloned().collect()
    }

    pub fn failed_jobs(&self) -> Vec<SharedJob> {
        self.lock().failed.values().map(|e| Arc::clone(&e.job)).collect()
    }

    pub fn cancelled_jobs(&self) -> Vec<SharedJob> {
        self.lock().cancelled.values().cloned().collect()
    }

    /// Failed hashes with the detail their job reported.
    pub fn failures(&self) -> Vec<(ContentHash, Option<String>)> {
        self.lock()
            .failed
            .iter()
            .map(|(h, e)| (h.clone(), e.detail.clone()))
            .collect()
    }
}

/// Runs a job's `pause` or `resume` hook with its panic contained.
fn call_hook(job: &SharedJob, pause: bool) -> Result<(), String> {
    panic::catch_unwind(AssertUnwindSafe(|| {
        if pause {
            job.pause()
        } else {
            job.resume()
        }
    }))
    .map_err(panic_message)
}
