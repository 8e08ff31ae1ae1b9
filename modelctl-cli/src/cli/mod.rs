//! CLI for the modelctl model install coordinator.

mod commands;

use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use modelctl_core::ModelInstaller;

use commands::{run_cancel, run_delete, run_import, run_list, run_prune, run_status};

/// Top-level CLI for the modelctl model install coordinator.
#[derive(Debug, Parser)]
#[command(name = "modelctl")]
#[command(about = "modelctl: model install coordinator", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Import a model from a local path, hub repo ID, or URL.
    Import {
        /// Local path, `owner/repo[:variant][/subfolder]`, or bare URL.
        source: String,
        /// Access token for the remote (overrides any configured token regex).
        #[arg(long)]
        token: Option<String>,
        /// Register the file in place instead of copying it into the managed tree.
        #[arg(long)]
        inplace: bool,
        /// Block until the job reaches a terminal state (or `--timeout-secs` elapses).
        #[arg(long)]
        wait: bool,
        /// Timeout in seconds for `--wait` (default: wait forever).
        #[arg(long, value_name = "SECS")]
        timeout_secs: Option<u64>,
    },

    /// List every tracked install job.
    List,

    /// Show one job's status by ID.
    Status {
        /// Job identifier.
        id: i64,
    },

    /// Cancel a job by ID.
    Cancel {
        /// Job identifier.
        id: i64,
    },

    /// Drop every job in a terminal state from the in-memory job table.
    Prune,

    /// Unregister a model by its records-store key, deleting the backing
    /// file if it is managed (lives under the models root).
    Delete {
        /// Records-store key.
        key: String,
        /// Delete the backing file even if it is not managed.
        #[arg(long)]
        force: bool,
    },
}

impl CliCommand {
    pub fn run_from_args(installer: &ModelInstaller) -> Result<()> {
        let cli = Cli::parse();
        match cli.command {
            CliCommand::Import {
                source,
                token,
                inplace,
                wait,
                timeout_secs,
            } => run_import(installer, &source, token, inplace, wait, timeout_secs.map(Duration::from_secs))?,
            CliCommand::List => run_list(installer)?,
            CliCommand::Status { id } => run_status(installer, id)?,
            CliCommand::Cancel { id } => run_cancel(installer, id)?,
            CliCommand::Prune => run_prune(installer)?,
            CliCommand::Delete { key, force } => run_delete(installer, &key, force)?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
