//! `hashsync check` – validate a manifest without fetching anything.

use anyhow::Result;
use hashsync_core::manifest;
use std::path::Path;

pub async fn run_check(manifest_path: &Path) -> Result<()> {
    let manifest = manifest::load(manifest_path)?;
    println!("{} entries", manifest.entries.len());

    let duplicates = manifest.duplicates();
    for (hash, count) in &duplicates {
        println!("duplicate  {hash}  listed {count} times (fetched once)");
    }

    let mut missing = 0usize;
    for entry in &manifest.entries {
        if !tokio::fs::try_exists(&entry.source).await.unwrap_or(false) {
            println!("missing    {}  {}", entry.hash, entry.source.display());
            missing += 1;
        }
    }

    if duplicates.is_empty() && missing == 0 {
        println!("Manifest OK.");
    }
    Ok(())
}
