use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default number of jobs run at once.
pub const DEFAULT_CONCURRENT_DOWNLOADS: usize = 3;

/// Global configuration loaded from `~/.config/hashsync/config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Maximum jobs executing at once (values below 1 are treated as 1).
    pub concurrent_downloads: usize,
    /// Where downloaded content is placed (None = current directory).
    #[serde(default)]
    pub download_dir: Option<PathBuf>,
    /// Copy buffer size for file jobs in bytes (None = built-in default).
    #[serde(default)]
    pub chunk_size_bytes: Option<usize>,
    /// Tracing filter directive used when neither `RUST_LOG` nor `-v` is given.
    #[serde(default)]
    pub log_filter: Option<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            concurrent_downloads: DEFAULT_CONCURRENT_DOWNLOADS,
            download_dir: None,
            chunk_size_bytes: None,
            log_filter: None,
        }
    }
}

impl SyncConfig {
    /// Expands `~` in `download_dir` and anchors a relative value at `base`
    /// (the directory holding the config file).
    pub fn resolve_paths(&mut self, base: &Path) -> Result<()> {
        if let Some(dir) = self.download_dir.take() {
            let resolved = expand_path(&dir, base).context("download_dir")?;
            self.download_dir = Some(resolved);
        }
        Ok(())
    }
}

/// Expands a leading `~` to the home directory and joins relative paths onto
/// `base`. Empty paths are an error.
pub fn expand_path(raw: &Path, base: &Path) -> Result<PathBuf> {
    expand_path_with_home(raw, base, dirs::home_dir().as_deref())
}

fn expand_path_with_home(raw: &Path, base: &Path, home: Option<&Path>) -> Result<PathBuf> {
    if raw.as_os_str().to_string_lossy().trim().is_empty() {
        bail!("path is empty");
    }
    let expanded = match raw.strip_prefix("~") {
        Ok(rest) => {
            let home = home.context("cannot expand `~`: home directory unknown")?;
            if rest.as_os_str().is_empty() {
                home.to_path_buf()
            } else {
                home.join(rest)
            }
        }
        Err(_) => raw.to_path_buf(),
    };
    if expanded.is_absolute() {
        Ok(expanded)
    } else {
        Ok(base.join(expanded))
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("hashsync")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<SyncConfig> {
    load_or_init_at(&config_path()?)
}

/// Same as [`load_or_init`] for an explicit path.
pub fn load_or_init_at(path: &Path) -> Result<SyncConfig> {
    if !path.exists() {
        let default_cfg = SyncConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)
            .with_context(|| format!("write default config {}", path.display()))?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    let mut cfg: SyncConfig =
        toml::from_str(&data).with_context(|| format!("parse config {}", path.display()))?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    cfg.resolve_paths(base)
        .with_context(|| format!("config {}", path.display()))?;
    Ok(cfg)
}
