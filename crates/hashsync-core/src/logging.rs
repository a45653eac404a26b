//! Tracing setup for the `hashsync` binary.
//!
//! Log lines go to `$XDG_STATE_HOME/hashsync/hashsync.log`, or to stderr when
//! that file cannot be opened. The filter is picked in this order: `RUST_LOG`,
//! the `-v` count, `log_filter` from the config file, [`DEFAULT_FILTER`].

use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

use crate::config::SyncConfig;

pub const DEFAULT_FILTER: &str = "info,hashsync=debug,hashsync_core=debug";

/// Where log output ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    File(PathBuf),
    Stderr,
}

/// Filter inputs gathered from the command line and config.
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    /// Number of `-v` flags.
    pub verbosity: u8,
    pub config_filter: Option<String>,
}

/// Filter directive to install, plus a configured one that was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Selected {
    directive: String,
    rejected: Option<String>,
}

impl LogOptions {
    pub fn new(cfg: &SyncConfig, verbosity: u8) -> Self {
        Self {
            verbosity,
            config_filter: cfg.log_filter.clone(),
        }
    }

    fn select(&self, env: Option<&str>) -> Selected {
        let mut rejected = None;
        let mut candidates: Vec<String> = Vec::new();
        if let Some(env) = env.filter(|e| !e.trim().is_empty()) {
            candidates.push(env.to_string());
        }
        match self.verbosity {
            0 => {}
            1 => candidates.push("info,hashsync=trace,hashsync_core=trace".to_string()),
            _ => candidates.push("trace".to_string()),
        }
        if let Some(cfg) = self.config_filter.as_deref().filter(|f| !f.trim().is_empty()) {
            candidates.push(cfg.to_string());
        }
        for directive in candidates {
            if directive.parse::<EnvFilter>().is_ok() {
                return Selected {
                    directive,
                    rejected,
                };
            }
            rejected.get_or_insert(directive);
        }
        Selected {
            directive: DEFAULT_FILTER.to_string(),
            rejected,
        }
    }
}

pub fn log_file_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("hashsync")?;
    Ok(xdg_dirs.place_state_file("hashsync.log")?)
}

fn open_log_file() -> Result<(PathBuf, File)> {
    let path = log_file_path()?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("open log file {}", path.display()))?;
    Ok((path, file))
}

fn install<W>(directive: &str, writer: W)
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    // a subscriber may already be set (e.g. by a test harness); keep it
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(directive))
        .with_writer(writer)
        .with_ansi(false)
        .try_init();
}

/// Installs the global subscriber. Never fails: without a usable log file it
/// logs to stderr and says why.
pub fn init(opts: &LogOptions) -> LogTarget {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let selected = opts.select(env.as_deref());

    let (target, file_error) = match open_log_file() {
        Ok((path, file)) => {
            install(&selected.directive, Mutex::new(file));
            (LogTarget::File(path), None)
        }
        Err(e) => {
            install(&selected.directive, std::io::stderr);
            (LogTarget::Stderr, Some(e))
        }
    };

    if let Some(e) = file_error {
        tracing::warn!("log file unavailable, logging to stderr: {:#}", e);
    }
    if let Some(bad) = &selected.rejected {
        tracing::warn!(filter = %bad, "ignoring invalid log filter");
    }
    if let LogTarget::File(path) = &target {
        tracing::info!(filter = %selected.directive, "hashsync logging to {}", path.display());
    }
    target
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(verbosity: u8, config_filter: Option<&str>) -> LogOptions {
        LogOptions {
            verbosity,
            config_filter: config_filter.map(str::to_string),
        }
    }

    #[test]
    fn default_filter_parses() {
        assert!(DEFAULT_FILTER.parse::<EnvFilter>().is_ok());
    }

    #[test]
    fn nothing_set_uses_default() {
        let s = opts(0, None).select(None);
        assert_eq!(s.directive, DEFAULT_FILTER);
        assert!(s.rejected.is_none());
    }

    #[test]
    fn env_beats_verbosity_and_config() {
        let s = opts(2, Some("warn")).select(Some("error"));
        assert_eq!(s.directive, "error");
    }

    #[test]
    fn verbosity_beats_config() {
        assert_eq!(
            opts(1, Some("warn")).select(None).directive,
            "info,hashsync=trace,hashsync_core=trace"
        );
        assert_eq!(opts(3, Some("warn")).select(None).directive, "trace");
    }

    #[test]
    fn config_filter_used_when_no_flags() {
        let s = opts(0, Some("warn,hashsync_core=debug")).select(Some("   "));
        assert_eq!(s.directive, "warn,hashsync_core=debug");
    }

    #[test]
    fn invalid_config_filter_falls_back_and_is_reported() {
        let s = opts(0, Some("hashsync=loud")).select(None);
        assert_eq!(s.directive, DEFAULT_FILTER);
        assert_eq!(s.rejected.as_deref(), Some("hashsync=loud"));
    }

    #[test]
    fn from_config_copies_filter() {
        let cfg = SyncConfig {
            log_filter: Some("debug".into()),
            ..SyncConfig::default()
        };
        let o = LogOptions::new(&cfg, 0);
        assert_eq!(o.config_filter.as_deref(), Some("debug"));
    }
}
