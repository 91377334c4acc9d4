//! Command-line definitions, shared by the binary and the docs generator

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::IngestConfig;

/// aisync-ingest - NOAA AIS archive ingestion
#[derive(Parser, Debug)]
#[command(name = "aisync-ingest")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Processed-set ledger file
    #[arg(long, env = "AISYNC_LEDGER_PATH", global = true)]
    pub ledger: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest every archive published for a range of years
    Run(RunArgs),

    /// Show what the ledger has recorded
    Status {
        /// Check whether this archive id is recorded
        #[arg(long)]
        id: Option<String>,
    },
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// First year to ingest (inclusive)
    #[arg(long)]
    pub year_start: u16,

    /// Last year to ingest (inclusive)
    #[arg(long)]
    pub year_end: u16,

    /// Skip archives of the matching year whose id sorts at or before this one
    #[arg(long)]
    pub resume_from: Option<String>,

    /// Archives processed in parallel within a year
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Publish into this directory instead of the S3 bucket
    #[arg(long)]
    pub local_store: Option<PathBuf>,

    /// Exit non-zero if any archive or listing failed
    #[arg(long)]
    pub strict: bool,

    /// Write the run summary as JSON to this file
    #[arg(long)]
    pub summary: Option<PathBuf>,

    /// Directory for downloaded archives
    #[arg(long)]
    pub work_dir: Option<PathBuf>,

    /// Root directory for extracted content
    #[arg(long)]
    pub scratch_root: Option<PathBuf>,

    /// Disable download progress bars
    #[arg(long)]
    pub no_progress: bool,
}

impl RunArgs {
    /// Overlay command-line values on a configuration loaded from the environment
    pub fn apply(&self, mut config: IngestConfig) -> IngestConfig {
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(dir) = &self.work_dir {
            config.work_dir = dir.clone();
        }
        if let Some(dir) = &self.scratch_root {
            config.scratch_root = dir.clone();
        }
        if self.no_progress {
            config.show_progress = false;
        }
        config
    }
}
