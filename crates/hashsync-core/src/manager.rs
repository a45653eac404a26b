//! Download manager: lifecycle control over the registry and worker pool.
//!
//! One `DownloadManager` owns its registry, pause flag and cancellation token;
//! there is no process-wide state. Typical use:
//!
//! ```ignore
//! let manager = DownloadManager::new(cfg.concurrent_downloads);
//! manager.start(&shutdown);
//! for job in jobs {
//!     manager.admit(job);
//! }
//! let summary = manager.drain_and_join().await?;
//! for job in manager.completed_jobs() { /* persist history */ }
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::completion::RunSummary;
use crate::config::SyncConfig;
use crate::error::EngineError;
use crate::job::{ContentHash, SharedJob};
use crate::pool::{self, WorkerHandle};
use crate::registry::{Admission, JobRegistry, JobStatus};

#[derive(Debug, Default)]
struct Lifecycle {
    running: bool,
    cancel: Option<CancellationToken>,
    workers: Vec<WorkerHandle>,
}

#[derive(Debug)]
pub struct DownloadManager {
    registry: Arc<JobRegistry>,
    concurrency: usize,
    lifecycle: Mutex<Lifecycle>,
}

impl DownloadManager {
    /// Creates a manager running at most `concurrent_downloads` jobs at once
    /// (values below 1 are treated as 1).
    pub fn new(concurrent_downloads: usize) -> Self {
        Self {
            registry: Arc::new(JobRegistry::new()),
            concurrency: concurrent_downloads.max(1),
            lifecycle: Mutex::new(Lifecycle::default()),
        }
    }

    pub fn from_config(cfg: &SyncConfig) -> Self {
        Self::new(cfg.concurrent_downloads)
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle.lock().running
    }

    pub fn is_accepting(&self) -> bool {
        self.registry.is_accepting()
    }

    pub fn is_paused(&self) -> bool {
        self.registry.is_paused()
    }

    /// Starts the worker pool. No-op if already running.
    ///
    /// Workers stop taking jobs once `external` (or [`Self::stop`]) is
    /// cancelled; jobs receive the same token.
    pub fn start(&self, external: &CancellationToken) {
        let mut lc = self.lifecycle.lock();
        if lc.running {
            return;
        }
        lc.running = true;
        let cancel = match &lc.cancel {
            Some(token) if !token.is_cancelled() => token.clone(),
            _ => external.child_token(),
        };
        lc.cancel = Some(cancel.clone());
        let workers = pool::spawn_workers(self.concurrency, &self.registry, &cancel);
        lc.workers.extend(workers);
        tracing::info!(workers = self.concurrency, "download manager started");
    }

    /// Cancels the workers and in-flight jobs that observe cancellation.
    /// Does not wait for anything to exit.
    pub fn stop(&self) {
        let mut lc = self.lifecycle.lock();
        lc.running = false;
        if let Some(cancel) = lc.cancel.take() {
            cancel.cancel();
            tracing::info!("download manager stopping");
        }
    }

    /// [`Self::stop`], then waits for every worker loop to exit.
    pub async fn stop_and_join(&self) -> Result<(), EngineError> {
        self.stop();
        let handles = std::mem::take(&mut self.lifecycle.lock().workers);
        pool::join_workers(handles).await
    }

    /// Stops accepting jobs. Already queued jobs still run.
    pub fn drain(&self) {
        self.registry.close();
        tracing::debug!(queued = self.registry.queued_len(), "admissions closed");
    }

    /// [`Self::drain`], then, if running, waits for the queue to empty and
    /// every worker loop to exit.
    ///
    /// Workers only exit once the queue is closed and empty (or on
    /// cancellation), so joining them covers the queue wait. Worker faults are
    /// returned as [`EngineError::WorkersFailed`] after all workers are done.
    pub async fn drain_and_join(&self) -> Result<RunSummary, EngineError> {
        self.drain();
        let handles = {
            let mut lc = self.lifecycle.lock();
            if !lc.running {
                return Ok(self.summary());
            }
            std::mem::take(&mut lc.workers)
        };
        let joined = pool::join_workers(handles).await;
        self.lifecycle.lock().running = false;
        joined?;
        let summary = self.summary();
        tracing::info!(
            completed = summary.completed,
            failed = summary.failed,
            cancelled = summary.cancelled,
            "download manager drained"
        );
        Ok(summary)
    }

    /// Pauses active pausable jobs; jobs started later begin paused.
    /// Returns false if already paused.
    pub fn pause(&self) -> bool {
        let changed = self.registry.set_paused(true);
        if changed && self.is_running() {
            tracing::info!("pausing downloads");
        }
        changed
    }

    /// Returns false if not paused.
    pub fn resume(&self) -> bool {
        let changed = self.registry.set_paused(false);
        if changed && self.is_running() {
            tracing::info!("resuming downloads");
        }
        changed
    }

    pub fn admit(&self, job: SharedJob) -> Admission {
        self.registry.admit(job)
    }

    /// The job admitted under `hash`, whatever its state.
    pub fn lookup(&self, hash: &ContentHash) -> Option<SharedJob> {
        self.registry.lookup(hash)
    }

    pub fn status(&self, hash: &ContentHash) -> Option<JobStatus> {
        self.registry.status(hash)
    }

    pub fn summary(&self) -> RunSummary {
        self.registry.summary()
    }

    pub fn active_len(&self) -> usize {
        self.registry.active_len()
    }

    pub fn active_hashes(&self) -> Vec<ContentHash> {
        self.registry.active_hashes()
    }

    pub fn completed_jobs(&self) -> Vec<SharedJob> {
        self.registry.completed_jobs()
    }

    pub fn failed_jobs(&self) -> Vec<SharedJob> {
        self.registry.failed_jobs()
    }

    pub fn cancelled_jobs(&self) -> Vec<SharedJob> {
        self.registry.cancelled_jobs()
    }

    pub fn failures(&self) -> Vec<(ContentHash, Option<String>)> {
        self.registry.failures()
    }
}

impl Drop for DownloadManager {
    fn drop(&mut self) {
        // workers hold the registry, not the manager; wake them so they exit
        if let Some(cancel) = self.lifecycle.get_mut().cancel.take() {
            cancel.cancel();
        }
    }
}
