//! `hashsync run` – fetch everything in a manifest through the download manager.

use anyhow::{Context, Result};
use hashsync_core::config::{self, SyncConfig};
use hashsync_core::manifest::{self, Manifest};
use hashsync_core::{Admission, CancellationToken, ContentHash, DownloadManager, RunSummary};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cli::control_socket;
use crate::cli::copy_job::CopyJob;

#[derive(Debug)]
pub struct SyncArgs {
    pub manifest: PathBuf,
    pub jobs: Option<usize>,
    pub dest: Option<PathBuf>,
    pub report: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct FailedItem {
    hash: ContentHash,
    detail: Option<String>,
}

/// Written with `--report`: what landed where after the run.
#[derive(Debug, Serialize)]
struct RunReport {
    summary: RunSummary,
    duplicates_skipped: usize,
    completed: Vec<ContentHash>,
    failed: Vec<FailedItem>,
    cancelled: Vec<ContentHash>,
}

impl RunReport {
    fn collect(manager: &DownloadManager, summary: RunSummary, duplicates_skipped: usize) -> Self {
        let hashes = |jobs: Vec<hashsync_core::SharedJob>| {
            jobs.iter().map(|j| j.hash().clone()).collect::<Vec<_>>()
        };
        Self {
            summary,
            duplicates_skipped,
            completed: hashes(manager.completed_jobs()),
            failed: manager
                .failures()
                .into_iter()
                .map(|(hash, detail)| FailedItem { hash, detail })
                .collect(),
            cancelled: hashes(manager.cancelled_jobs()),
        }
    }
}

/// Admits one copy job per manifest entry. Returns how many were duplicates.
fn admit_all(
    manager: &DownloadManager,
    manifest: &Manifest,
    dest_dir: &Path,
    chunk_size: Option<usize>,
) -> usize {
    let mut duplicates = 0usize;
    for entry in &manifest.entries {
        let job = Arc::new(CopyJob::new(entry, dest_dir, chunk_size));
        match manager.admit(job) {
            Admission::Accepted(_) => {}
            Admission::Duplicate(existing) => {
                duplicates += 1;
                println!("skip {}: {} already queued", entry.label(), existing.hash());
            }
            Admission::Closed { .. } => {
                tracing::warn!(hash = %entry.hash, "manager closed before admission");
            }
        }
    }
    duplicates
}

/// `--dest` (relative to `cwd`, `~` expanded), else the configured
/// `download_dir` (already resolved at config load), else `cwd`.
fn destination(cfg: &SyncConfig, dest: Option<&Path>, cwd: &Path) -> Result<PathBuf> {
    match (dest, &cfg.download_dir) {
        (Some(dest), _) => config::expand_path(dest, cwd).context("--dest"),
        (None, Some(dir)) => Ok(dir.clone()),
        (None, None) => Ok(cwd.to_path_buf()),
    }
}

pub async fn run_sync(cfg: &SyncConfig, args: SyncArgs) -> Result<()> {
    let manifest = manifest::load(&args.manifest)?;
    let cwd = std::env::current_dir()?;
    let dest_dir = destination(cfg, args.dest.as_deref(), &cwd)?;
    tracing::debug!(dest = %dest_dir.display(), "destination directory");
    tokio::fs::create_dir_all(&dest_dir)
        .await
        .with_context(|| format!("create destination {}", dest_dir.display()))?;

    let manager = Arc::new(DownloadManager::new(
        args.jobs.unwrap_or(cfg.concurrent_downloads),
    ));
    let shutdown = CancellationToken::new();

    let interrupt = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received, cancelling run");
                shutdown.cancel();
            }
        })
    };

    let socket_path = hashsync_core::control::default_control_socket_path().ok();
    let listener = socket_path
        .as_ref()
        .map(|p| control_socket::spawn_control_listener(Arc::clone(&manager), p));

    manager.start(&shutdown);
    let duplicates = admit_all(&manager, &manifest, &dest_dir, cfg.chunk_size_bytes);
    let drained = manager.drain_and_join().await;

    interrupt.abort();
    if let Some(handle) = listener {
        handle.abort();
    }
    if let Some(path) = &socket_path {
        let _ = std::fs::remove_file(path);
    }

    let summary = drained?;
    println!(
        "{} completed, {} failed, {} cancelled ({} duplicate(s) skipped)",
        summary.completed, summary.failed, summary.cancelled, duplicates
    );
    if summary.queued > 0 {
        println!("{} job(s) not started", summary.queued);
    }
    for (hash, detail) in manager.failures() {
        println!("  failed {}: {}", hash, detail.as_deref().unwrap_or("unknown error"));
    }

    if let Some(path) = &args.report {
        let report = RunReport::collect(&manager, summary, duplicates);
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json)
            .with_context(|| format!("write report {}", path.display()))?;
        tracing::info!("wrote run report to {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn duplicates_are_admitted_once_and_copied() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.bin"), b"alpha").unwrap();
        std::fs::write(dir.path().join("b.bin"), b"beta").unwrap();
        let manifest = Manifest::parse(&format!(
            r#"
            [[job]]
            hash = "aa"
            source = "{a}"

            [[job]]
            hash = "bb"
            source = "{b}"

            [[job]]
            hash = "AA"
            source = "{b}"
            "#,
            a = dir.path().join("a.bin").display(),
            b = dir.path().join("b.bin").display(),
        ))
        .unwrap();
        let out = dir.path().join("out");
        std::fs::create_dir(&out).unwrap();

        let manager = DownloadManager::new(2);
        manager.start(&CancellationToken::new());
        let dups = admit_all(&manager, &manifest, &out, None);
        let summary = manager.drain_and_join().await.unwrap();

        assert_eq!(dups, 1);
        assert_eq!(summary.completed, 2);
        assert_eq!(std::fs::read(out.join("AA.bin")).unwrap(), b"alpha");
        assert_eq!(std::fs::read(out.join("BB.bin")).unwrap(), b"beta");

        let report = RunReport::collect(&manager, summary, dups);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["completed"], serde_json::json!(["AA", "BB"]));
        assert_eq!(json["summary"]["failed"], 0);
        assert_eq!(json["duplicates_skipped"], 1);
    }

    #[test]
    fn destination_prefers_flag_then_config_then_cwd() {
        let cwd = Path::new("/work");
        let mut cfg = SyncConfig::default();
        assert_eq!(destination(&cfg, None, cwd).unwrap(), PathBuf::from("/work"));

        cfg.download_dir = Some(PathBuf::from("/srv/songs"));
        assert_eq!(destination(&cfg, None, cwd).unwrap(), PathBuf::from("/srv/songs"));
        assert_eq!(
            destination(&cfg, Some(Path::new("out")), cwd).unwrap(),
            PathBuf::from("/work/out")
        );
        assert_eq!(
            destination(&cfg, Some(Path::new("/abs")), cwd).unwrap(),
            PathBuf::from("/abs")
        );
    }

    #[test]
    fn empty_dest_flag_is_rejected() {
        let err = destination(&SyncConfig::default(), Some(Path::new("")), Path::new("/work"))
            .unwrap_err();
        assert!(format!("{:#}", err).contains("--dest"));
    }

    #[tokio::test]
    async fn missing_sources_are_reported_as_failures() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = Manifest::parse(&format!(
            "[[job]]\nhash = \"0c\"\nsource = \"{}\"\n",
            dir.path().join("gone.zip").display()
        ))
        .unwrap();
        let manager = DownloadManager::new(1);
        manager.start(&CancellationToken::new());
        admit_all(&manager, &manifest, dir.path(), None);
        let summary = manager.drain_and_join().await.unwrap();
        assert_eq!(summary.failed, 1);

        let report = RunReport::collect(&manager, summary, 0);
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].detail.as_deref().unwrap().contains("gone.zip"));
    }
}
