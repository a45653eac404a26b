//! Completion aggregation: moves a finished job from active into its bucket.

use std::sync::Arc;

use serde::Serialize;

use crate::job::{ContentHash, JobFinished, JobOutcome, ResultKind, SharedJob};
use crate::registry::{Books, FailedEntry, JobRegistry};

/// Per-bucket counts for one manager, suitable for a report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub admitted: usize,
    pub queued: usize,
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl RunSummary {
    /// Jobs that reached a terminal bucket.
    pub fn finished(&self) -> usize {
        self.completed + self.failed + self.cancelled
    }
}

impl Books {
    /// Moves `hash` out of Active into the bucket matching `outcome`. Returns
    /// false if the hash was not active.
    pub(crate) fn settle(&mut self, job: &SharedJob, hash: &ContentHash, outcome: &JobOutcome) -> bool {
        let was_active = self.active.remove(hash).is_some();
        let job = Arc::clone(job);
        match outcome.kind {
            ResultKind::Success => {
                self.completed.insert(hash.clone(), job);
            }
            ResultKind::Cancelled => {
                self.cancelled.insert(hash.clone(), job);
            }
            ResultKind::Failed => {
                self.failed.insert(
                    hash.clone(),
                    FailedEntry {
                        job,
                        detail: outcome.detail.clone(),
                    },
                );
            }
        }
        was_active
    }
}

impl JobRegistry {
    /// Records a job's terminal result. Safe to call from any number of
    /// workers at once.
    pub fn record_finished(&self, job: &SharedJob, finished: JobFinished) {
        let JobFinished { hash, outcome } = finished;
        if !self.lock().settle(job, &hash, &outcome) {
            tracing::warn!(hash = %hash, "finished job was not in the active set");
        }

        match outcome.kind {
            ResultKind::Success => tracing::info!(hash = %hash, "job completed"),
            ResultKind::Cancelled => tracing::info!(hash = %hash, "job cancelled"),
            ResultKind::Failed => tracing::warn!(
                hash = %hash,
                detail = outcome.detail.as_deref().unwrap_or("-"),
                "job failed"
            ),
        }
    }

    pub fn summary(&self) -> RunSummary {
        let books = self.lock();
        RunSummary {
            admitted: books.admitted.len(),
            queued: books.queue.len(),
            active: books.active.len(),
            completed: books.completed.len(),
            failed: books.failed.len(),
            cancelled: books.cancelled.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::job::DownloadJob;
    use crate::registry::{Dequeue, JobStatus};

    #[derive(Debug)]
    struct Nop(ContentHash);

    #[async_trait]
    impl DownloadJob for Nop {
        fn hash(&self) -> &ContentHash {
            &self.0
        }

        async fn run(&self, _cancel: CancellationToken) -> JobOutcome {
            JobOutcome::success()
        }
    }

    async fn admit_and_take(reg: &JobRegistry, h: &str) -> SharedJob {
        let job: SharedJob = Arc::new(Nop(ContentHash::parse(h).unwrap()));
        assert!(reg.admit(job).is_accepted());
        match reg.next_ready(&CancellationToken::new()).await.unwrap() {
            Dequeue::Job(j) => j,
            other => panic!("expected job, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn outcomes_land_in_matching_bucket() {
        let reg = JobRegistry::new();
        for (h, outcome) in [
            ("01", JobOutcome::success()),
            ("02", JobOutcome::failed("404")),
            ("03", JobOutcome::cancelled()),
        ] {
            let job = admit_and_take(&reg, h).await;
            let hash = job.hash().clone();
            reg.record_finished(&job, JobFinished { hash, outcome });
        }
        let s = reg.summary();
        assert_eq!((s.completed, s.failed, s.cancelled, s.active), (1, 1, 1, 0));
        assert_eq!(s.finished(), 3);
        assert_eq!(
            reg.status(&ContentHash::parse("02").unwrap()),
            Some(JobStatus::Failed)
        );
        let failures = reg.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].1.as_deref(), Some("404"));
    }

    #[test]
    fn finishing_an_inactive_job_still_records_it() {
        let reg = JobRegistry::new();
        let job: SharedJob = Arc::new(Nop(ContentHash::parse("aa").unwrap()));
        reg.record_finished(
            &job,
            JobFinished {
                hash: job.hash().clone(),
                outcome: JobOutcome::success(),
            },
        );
        assert_eq!(reg.completed_jobs().len(), 1);
        assert_eq!(reg.summary().active, 0);
    }
}
