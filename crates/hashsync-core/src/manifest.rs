//! Job manifest: the list of content the `run` command should acquire.
//!
//! ```toml
//! [[job]]
//! hash = "3fa2..."
//! source = "/mnt/share/pack.zip"
//! name = "optional label"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::job::ContentHash;

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("read manifest {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse manifest {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// One content item to fetch.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ManifestEntry {
    pub hash: ContentHash,
    pub source: PathBuf,
    #[serde(default)]
    pub name: Option<String>,
}

impl ManifestEntry {
    /// Label for logs and output: the name if given, else the hash.
    pub fn label(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.hash.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Manifest {
    #[serde(default, rename = "job")]
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn parse(data: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(data)
    }

    /// Hashes listed more than once, with how many times each appears.
    pub fn duplicates(&self) -> Vec<(ContentHash, usize)> {
        let mut counts: BTreeMap<&ContentHash, usize> = BTreeMap::new();
        for e in &self.entries {
            *counts.entry(&e.hash).or_default() += 1;
        }
        counts
            .into_iter()
            .filter(|(_, n)| *n > 1)
            .map(|(h, n)| (h.clone(), n))
            .collect()
    }
}

/// Reads and parses a manifest file. Relative `source` paths are resolved
/// against the manifest's directory.
pub fn load(path: &Path) -> Result<Manifest, ManifestError> {
    let data = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut manifest = Manifest::parse(&data).map_err(|source| ManifestError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    if let Some(base) = path.parent() {
        for e in &mut manifest.entries {
            if e.source.is_relative() {
                e.source = base.join(&e.source);
            }
        }
    }
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [[job]]
        hash = "aa01"
        source = "/data/a.zip"
        name = "first"

        [[job]]
        hash = "BB02"
        source = "b.zip"

        [[job]]
        hash = "AA01"
        source = "/data/a-again.zip"
    "#;

    #[test]
    fn parse_entries_and_labels() {
        let m = Manifest::parse(SAMPLE).unwrap();
        assert_eq!(m.entries.len(), 3);
        assert_eq!(m.entries[0].label(), "first");
        assert_eq!(m.entries[1].label(), "BB02");
    }

    #[test]
    fn duplicates_are_case_insensitive() {
        let m = Manifest::parse(SAMPLE).unwrap();
        let dups = m.duplicates();
        assert_eq!(dups.len(), 1);
        assert_eq!(dups[0].0.as_str(), "AA01");
        assert_eq!(dups[0].1, 2);
    }

    #[test]
    fn empty_manifest_is_valid() {
        let m = Manifest::parse("").unwrap();
        assert!(m.entries.is_empty());
        assert!(m.duplicates().is_empty());
    }

    #[test]
    fn bad_hash_is_a_parse_error() {
        let bad = r#"
            [[job]]
            hash = "not-hex"
            source = "x"
        "#;
        assert!(Manifest::parse(bad).is_err());
    }

    #[test]
    fn load_resolves_relative_sources() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        let m = load(&path).unwrap();
        assert_eq!(m.entries[1].source, dir.path().join("b.zip"));
        assert_eq!(m.entries[0].source, PathBuf::from("/data/a.zip"));
    }

    #[test]
    fn load_missing_file_reports_path() {
        let err = load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ManifestError::Read { .. }));
        assert!(err.to_string().contains("/definitely/not/here.toml"));
    }
}
