//! CLI for the hashsync content downloader.

mod commands;
mod control_socket;
mod copy_job;

use anyhow::Result;
use clap::{Parser, Subcommand};
use hashsync_core::config;
use hashsync_core::control::ControlCommand;
use hashsync_core::logging::{self, LogOptions};
use std::path::PathBuf;

use commands::{run_check, run_control, run_sync, SyncArgs};

/// Top-level CLI for hashsync.
#[derive(Debug, Parser)]
#[command(name = "hashsync")]
#[command(about = "hashsync: fetch content by hash, once, in parallel", long_about = None)]
pub struct Cli {
    /// More log detail (-v: hashsync at trace, -vv: everything at trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Fetch every item listed in a manifest; repeated hashes are fetched once.
    Run {
        /// Path to the job manifest (TOML).
        #[arg(long, short)]
        manifest: PathBuf,
        /// Run up to N jobs concurrently (default from config).
        #[arg(long, value_name = "N")]
        jobs: Option<usize>,
        /// Destination directory (default from config, else the current directory).
        #[arg(long)]
        dest: Option<PathBuf>,
        /// Write a JSON report of the run to this file.
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Validate a manifest and list duplicate hashes and missing sources.
    Check {
        /// Path to the job manifest (TOML).
        #[arg(long, short)]
        manifest: PathBuf,
    },

    /// Pause the active `hashsync run`.
    Pause,

    /// Resume a paused `hashsync run`.
    Resume,

    /// Stop the active `hashsync run`; in-flight copies are cancelled.
    Stop,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        logging::init(&LogOptions::new(&cfg, cli.verbose));
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Run {
                manifest,
                jobs,
                dest,
                report,
            } => {
                run_sync(
                    &cfg,
                    SyncArgs {
                        manifest,
                        jobs,
                        dest,
                        report,
                    },
                )
                .await?;
            }
            CliCommand::Check { manifest } => run_check(&manifest).await?,
            CliCommand::Pause => run_control(ControlCommand::Pause).await?,
            CliCommand::Resume => run_control(ControlCommand::Resume).await?,
            CliCommand::Stop => run_control(ControlCommand::Stop).await?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
