use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Expand parameterised API jobs and run them in batches.
#[derive(Parser, Debug)]
#[command(name = "harvester")]
#[command(version)]
pub(crate) struct Cli {
    /// Config file (falls back to HARVESTER_CONFIG, then ~/.harvester/harvester.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Check a cron expression; exits 1 when it is invalid
    ValidateCron {
        /// Quoted expression, e.g. "0 0 2 * * ?"
        expression: String,
    },

    /// Print the parameter combinations and batch layout of a job file
    Expand {
        job_file: PathBuf,
    },

    /// Run a job once and record the outcome
    Run {
        job_file: PathBuf,

        /// Do not write an execution log row
        #[arg(long)]
        no_log: bool,
    },

    /// Show recent execution logs
    Logs {
        /// Only this job code
        #[arg(long)]
        job: Option<String>,

        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Show run counts per job and status
    Stats {
        /// Only runs started at or after this date or RFC 3339 timestamp
        #[arg(long)]
        since: Option<String>,
    },
}
