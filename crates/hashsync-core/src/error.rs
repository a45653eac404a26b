//! Engine fault type.
//!
//! These are faults of the manager's own bookkeeping, not job failures: a job
//! that fails reports `ResultKind::Failed` through its outcome instead.

use crate::job::ContentHash;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A dequeued hash was already in the active set.
    #[error("job {0} dequeued while already active")]
    AlreadyActive(ContentHash),
    /// The job's `pause` hook panicked when it was handed to a worker. The
    /// job is recorded as failed before this is returned.
    #[error("pause hook of job {hash} panicked: {reason}")]
    PauseHook { hash: ContentHash, reason: String },
    /// The task running a job was aborted before producing an outcome
    /// (e.g. the runtime is shutting down).
    #[error("task for job {hash} ended without an outcome: {reason}")]
    JobTask { hash: ContentHash, reason: String },
    /// One or more worker loops ended with a fault or panic. Reported once all
    /// workers have exited.
    #[error("{failed} worker loop(s) ended with a fault (first: {first})")]
    WorkersFailed { failed: usize, first: String },
}
