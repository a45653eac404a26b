//! File-copy job: fetches one manifest entry from a local or mounted source.
//!
//! Content is written to `<dest>/<HASH><.ext>.part` and renamed into place
//! once fully copied, so a cancelled or failed copy never leaves a file that
//! looks complete.

use anyhow::{Context, Result};
use async_trait::async_trait;
use hashsync_core::manifest::ManifestEntry;
use hashsync_core::{CancellationToken, ContentHash, DownloadJob, JobOutcome};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::watch;

pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Path for the temp file: appends `.part` to the final path.
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(".part");
    PathBuf::from(o)
}

/// Destination for an entry: the hash, keeping the source's extension.
pub fn final_path(dest_dir: &Path, entry: &ManifestEntry) -> PathBuf {
    let mut name = entry.hash.to_string();
    if let Some(ext) = entry.source.extension() {
        name.push('.');
        name.push_str(&ext.to_string_lossy());
    }
    dest_dir.join(name)
}

enum CopyEnd {
    Done(u64),
    Cancelled,
}

#[derive(Debug)]
pub struct CopyJob {
    hash: ContentHash,
    label: String,
    source: PathBuf,
    dest: PathBuf,
    chunk_size: usize,
    paused: watch::Sender<bool>,
}

impl CopyJob {
    pub fn new(entry: &ManifestEntry, dest_dir: &Path, chunk_size: Option<usize>) -> Self {
        Self {
            hash: entry.hash.clone(),
            label: entry.label(),
            source: entry.source.clone(),
            dest: final_path(dest_dir, entry),
            chunk_size: chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE).max(1),
            paused: watch::Sender::new(false),
        }
    }

    pub fn dest(&self) -> &Path {
        &self.dest
    }

    async fn copy(&self, cancel: &CancellationToken) -> Result<CopyEnd> {
        let part = temp_path(&self.dest);
        let mut src = tokio::fs::File::open(&self.source)
            .await
            .with_context(|| format!("open source {}", self.source.display()))?;
        let mut out = tokio::fs::File::create(&part)
            .await
            .with_context(|| format!("create temp file {}", part.display()))?;

        let mut paused = self.paused.subscribe();
        let mut buf = vec![0u8; self.chunk_size];
        let mut copied = 0u64;
        loop {
            if *paused.borrow_and_update() {
                tracing::debug!(hash = %self.hash, "copy paused");
                tokio::select! {
                    _ = cancel.cancelled() => return Ok(CopyEnd::Cancelled),
                    res = paused.wait_for(|p| !*p) => {
                        res.context("pause signal closed")?;
                    }
                }
            }
            if cancel.is_cancelled() {
                return Ok(CopyEnd::Cancelled);
            }
            let n = src
                .read(&mut buf)
                .await
                .with_context(|| format!("read {}", self.source.display()))?;
            if n == 0 {
                break;
            }
            out.write_all(&buf[..n])
                .await
                .with_context(|| format!("write {}", part.display()))?;
            copied += n as u64;
        }

        out.flush().await?;
        out.sync_all().await?;
        drop(out);
        tokio::fs::rename(&part, &self.dest).await.with_context(|| {
            format!("failed to rename {} to {}", part.display(), self.dest.display())
        })?;
        Ok(CopyEnd::Done(copied))
    }

    async fn discard_partial(&self) {
        let part = temp_path(&self.dest);
        if let Err(e) = tokio::fs::remove_file(&part).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::debug!(path = %part.display(), "could not remove partial file: {}", e);
            }
        }
    }
}

#[async_trait]
impl DownloadJob for CopyJob {
    fn hash(&self) -> &ContentHash {
        &self.hash
    }

    fn can_pause(&self) -> bool {
        true
    }

    fn pause(&self) {
        self.paused.send_replace(true);
    }

    fn resume(&self) {
        self.paused.send_replace(false);
    }

    async fn run(&self, cancel: CancellationToken) -> JobOutcome {
        tracing::info!(hash = %self.hash, "fetching {}", self.label);
        match self.copy(&cancel).await {
            Ok(CopyEnd::Done(bytes)) => {
                tracing::info!(hash = %self.hash, bytes, "saved to {}", self.dest().display());
                JobOutcome::success()
            }
            Ok(CopyEnd::Cancelled) => {
                self.discard_partial().await;
                JobOutcome::cancelled()
            }
            Err(e) => {
                self.discard_partial().await;
                JobOutcome::failed(format!("{:#}", e))
            }
        }
    }
}
