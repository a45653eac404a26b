//! Worker pool: N loops pulling from the ready queue, one job at a time each.

use std::any::Any;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::EngineError;
use crate::job::{JobFinished, JobOutcome, SharedJob};
use crate::registry::{Dequeue, JobRegistry};

pub(crate) type WorkerHandle = JoinHandle<Result<(), EngineError>>;

/// Spawns `count` worker loops on the current runtime.
pub(crate) fn spawn_workers(
    count: usize,
    registry: &Arc<JobRegistry>,
    cancel: &CancellationToken,
) -> Vec<WorkerHandle> {
    (0..count)
        .map(|id| {
            let registry = Arc::clone(registry);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let res = worker_loop(id, &registry, &cancel).await;
                if let Err(ref e) = res {
                    tracing::warn!(worker = id, "worker loop terminated early: {}", e);
                    tracing::debug!(worker = id, error = ?e, "worker loop fault detail");
                }
                res
            })
        })
        .collect()
}

async fn worker_loop(
    id: usize,
    registry: &JobRegistry,
    cancel: &CancellationToken,
) -> Result<(), EngineError> {
    tracing::debug!(worker = id, "worker started");
    loop {
        let job = match registry.next_ready(cancel).await? {
            Dequeue::Job(job) => job,
            Dequeue::Drained => {
                tracing::debug!(worker = id, "queue drained, worker exiting");
                return Ok(());
            }
            Dequeue::Cancelled => {
                tracing::debug!(worker = id, "worker cancelled");
                return Ok(());
            }
        };
        let hash = job.hash().clone();
        tracing::debug!(worker = id, hash = %hash, "running job");
        match run_job(&job, cancel.clone()).await {
            Ok(outcome) => registry.record_finished(&job, JobFinished { hash, outcome }),
            Err(reason) => {
                // keep the job out of the active set before giving up the loop
                registry.record_finished(
                    &job,
                    JobFinished {
                        hash: hash.clone(),
                        outcome: JobOutcome::failed(reason.clone()),
                    },
                );
                return Err(EngineError::JobTask { hash, reason });
            }
        }
    }
}

/// Runs the job on its own task so a panicking job is contained.
async fn run_job(job: &SharedJob, cancel: CancellationToken) -> Result<JobOutcome, String> {
    let task_job = Arc::clone(job);
    let handle = tokio::spawn(async move { task_job.run(cancel).await });
    match handle.await {
        Ok(outcome) => Ok(outcome),
        Err(e) if e.is_panic() => Ok(JobOutcome::failed(format!(
            "job panicked: {}",
            panic_message(e.into_panic())
        ))),
        Err(e) => Err(e.to_string()),
    }
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Waits for every worker to exit. Faults are logged and reported after all
/// workers are done.
pub(crate) async fn join_workers(handles: Vec<WorkerHandle>) -> Result<(), EngineError> {
    let mut failed = 0usize;
    let mut first: Option<String> = None;
    for (id, handle) in handles.into_iter().enumerate() {
        let message = match handle.await {
            Ok(Ok(())) => continue,
            // already logged by the worker wrapper
            Ok(Err(e)) => e.to_string(),
            Err(e) => {
                tracing::warn!(worker = id, "worker task failed: {}", e);
                e.to_string()
            }
        };
        failed += 1;
        first.get_or_insert(message);
    }
    match first {
        None => Ok(()),
        Some(first) => Err(EngineError::WorkersFailed { failed, first }),
    }
}
