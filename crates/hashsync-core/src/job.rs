//! Job contract: the unit of work the manager schedules.
//!
//! A job is identified by the content hash of what it acquires. The manager
//! never looks inside a job; it only asks for the hash, toggles pause, and
//! awaits `run` for the terminal outcome.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Error returned when a string is not a usable content hash.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HashError {
    #[error("content hash is empty")]
    Empty,
    #[error("content hash contains non-hex character {0:?}")]
    InvalidChar(char),
}

/// Stable identifier of a piece of content, used to deduplicate jobs.
///
/// Stored upper-cased so that `ab12` and `AB12` name the same content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    /// Parses a hex hash, trimming surrounding whitespace.
    pub fn parse(s: &str) -> Result<Self, HashError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(HashError::Empty);
        }
        if let Some(c) = s.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(HashError::InvalidChar(c));
        }
        Ok(Self(s.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ContentHash {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ContentHash {
    type Error = HashError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<ContentHash> for String {
    fn from(h: ContentHash) -> Self {
        h.0
    }
}

/// Terminal classification a job reports when its run ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultKind {
    Success,
    Cancelled,
    Failed,
}

/// What a job's `run` resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub kind: ResultKind,
    /// Human-readable reason, mostly set for failures.
    pub detail: Option<String>,
}

impl JobOutcome {
    pub fn success() -> Self {
        Self {
            kind: ResultKind::Success,
            detail: None,
        }
    }

    pub fn cancelled() -> Self {
        Self {
            kind: ResultKind::Cancelled,
            detail: None,
        }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            kind: ResultKind::Failed,
            detail: Some(detail.into()),
        }
    }
}

/// Finished signal handed to the completion aggregator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFinished {
    pub hash: ContentHash,
    pub outcome: JobOutcome,
}

/// A download job as seen by the manager.
///
/// `pause` and `resume` are invoked while the manager's registry lock is held:
/// they must return quickly and must not call back into the manager. A panic in
/// `pause` as the job is handed to a worker fails the job.
#[async_trait]
pub trait DownloadJob: Send + Sync + fmt::Debug {
    /// Content hash; must not change over the job's lifetime.
    fn hash(&self) -> &ContentHash;

    /// Whether `pause`/`resume` do anything for this job.
    fn can_pause(&self) -> bool {
        false
    }

    fn pause(&self) {}

    fn resume(&self) {}

    /// Performs the transfer. Jobs that want to honour stop requests should
    /// watch `cancel` and return [`JobOutcome::cancelled`].
    async fn run(&self, cancel: CancellationToken) -> JobOutcome;
}

/// Shared handle stored by the registry and returned to callers.
pub type SharedJob = Arc<dyn DownloadJob>;
