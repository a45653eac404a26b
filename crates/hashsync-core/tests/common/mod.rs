//! Scriptable job used by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hashsync_core::{CancellationToken, ContentHash, DownloadJob, JobOutcome};

/// Counts how many test jobs are inside `run` at once.
#[derive(Debug, Default)]
pub struct ConcurrencyTracker {
    current: AtomicUsize,
    max: AtomicUsize,
}

impl ConcurrencyTracker {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn max_seen(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct TestJob {
    hash: ContentHash,
    outcome: JobOutcome,
    delay: Duration,
    pausable: bool,
    honours_cancel: bool,
    panics: bool,
    panics_on_pause: bool,
    gate: Option<CancellationToken>,
    tracker: Option<Arc<ConcurrencyTracker>>,
    pub started: AtomicBool,
    pub pauses: AtomicUsize,
    pub resumes: AtomicUsize,
}

impl TestJob {
    pub fn new(hash: &str) -> Self {
        Self {
            hash: ContentHash::parse(hash).expect("test hash"),
            outcome: JobOutcome::success(),
            delay: Duration::ZERO,
            pausable: false,
            honours_cancel: true,
            panics: false,
            panics_on_pause: false,
            gate: None,
            tracker: None,
            started: AtomicBool::new(false),
            pauses: AtomicUsize::new(0),
            resumes: AtomicUsize::new(0),
        }
    }

    pub fn outcome(mut self, outcome: JobOutcome) -> Self {
        self.outcome = outcome;
        self
    }

    pub fn delay_ms(mut self, ms: u64) -> Self {
        self.delay = Duration::from_millis(ms);
        self
    }

    pub fn pausable(mut self) -> Self {
        self.pausable = true;
        self
    }

    /// Keeps running after the cancel token fires.
    pub fn ignores_cancel(mut self) -> Self {
        self.honours_cancel = false;
        self
    }

    pub fn panics(mut self) -> Self {
        self.panics = true;
        self
    }

    pub fn panics_on_pause(mut self) -> Self {
        self.panics_on_pause = true;
        self
    }

    /// Blocks in `run` until `gate` is cancelled.
    pub fn gated(mut self, gate: &CancellationToken) -> Self {
        self.gate = Some(gate.clone());
        self
    }

    pub fn tracked(mut self, tracker: &Arc<ConcurrencyTracker>) -> Self {
        self.tracker = Some(Arc::clone(tracker));
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn pause_count(&self) -> usize {
        self.pauses.load(Ordering::SeqCst)
    }

    pub fn resume_count(&self) -> usize {
        self.resumes.load(Ordering::SeqCst)
    }

    async fn work(&self) {
        if let Some(gate) = &self.gate {
            gate.cancelled().await;
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

#[async_trait]
impl DownloadJob for TestJob {
    fn hash(&self) -> &ContentHash {
        &self.hash
    }

    fn can_pause(&self) -> bool {
        self.pausable
    }

    fn pause(&self) {
        if self.panics_on_pause {
            panic!("test job {} refused to pause", self.hash);
        }
        self.pauses.fetch_add(1, Ordering::SeqCst);
    }

    fn resume(&self) {
        self.resumes.fetch_add(1, Ordering::SeqCst);
    }

    async fn run(&self, cancel: CancellationToken) -> JobOutcome {
        self.started.store(true, Ordering::SeqCst);
        if self.panics {
            panic!("test job {} exploded", self.hash);
        }
        if let Some(t) = &self.tracker {
            t.enter();
        }
        let outcome = if self.honours_cancel {
            tokio::select! {
                _ = cancel.cancelled() => JobOutcome::cancelled(),
                _ = self.work() => self.outcome.clone(),
            }
        } else {
            self.work().await;
            self.outcome.clone()
        };
        if let Some(t) = &self.tracker {
            t.exit();
        }
        outcome
    }
}

/// Polls `cond` every millisecond; panics after five seconds.
pub async fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !cond() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

pub fn hash(s: &str) -> ContentHash {
    ContentHash::parse(s).expect("test hash")
}

/// Hash strings of a job snapshot, sorted.
pub fn hashes(jobs: &[hashsync_core::SharedJob]) -> Vec<String> {
    let mut v: Vec<String> = jobs.iter().map(|j| j.hash().to_string()).collect();
    v.sort();
    v
}
