//! hashsync core: a deduplicating, pausable download manager.
//!
//! Jobs are keyed by content hash, admitted at most once, and run by a fixed
//! pool of workers. See [`manager::DownloadManager`] for the lifecycle.

pub mod config;
pub mod logging;

pub mod completion;
pub mod control;
pub mod error;
pub mod job;
pub mod manager;
pub mod manifest;
mod pool;
pub mod queue;
pub mod registry;

pub use completion::RunSummary;
pub use error::EngineError;
pub use job::{ContentHash, DownloadJob, JobFinished, JobOutcome, ResultKind, SharedJob};
pub use manager::DownloadManager;
pub use registry::{Admission, JobStatus};

pub use tokio_util::sync::CancellationToken;
