//! CLI argument definitions using clap
//!
//! Commands:
//! - binlog-pitr run [--config <path>] [overrides...]
//! - binlog-pitr inspect --dir <path>

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// binlog-pitr - Merge sharded binlog files into one point-in-time stream
#[derive(Parser, Debug)]
#[command(name = "binlog-pitr")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Merge the shards of a directory over a commit-timestamp window
    Run(RunArgs),

    /// Print each shard's first commit timestamp and size
    Inspect {
        /// Directory holding the binlog shards
        #[arg(long)]
        dir: PathBuf,
    },
}

/// Flags of `run`; each one overrides the config file
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Path to configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory holding the binlog shards
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// Window start TSO (0 infers it from the shards)
    #[arg(long)]
    pub start_tso: Option<i64>,

    /// Window stop TSO (0 is unbounded)
    #[arg(long)]
    pub stop_tso: Option<i64>,

    /// Window start as "YYYY-MM-DD HH:MM:SS" (UTC)
    #[arg(long)]
    pub start_datetime: Option<String>,

    /// Window stop as "YYYY-MM-DD HH:MM:SS" (UTC)
    #[arg(long)]
    pub stop_datetime: Option<String>,

    /// Exported base schema, one statement per line
    #[arg(long)]
    pub schema_file: Option<PathBuf>,

    /// Comma-separated metadata store endpoints
    #[arg(long)]
    pub pd_urls: Option<String>,

    /// Output directory for merged binlog files
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Parent directory for the merge working directory
    #[arg(long)]
    pub temp_dir: Option<PathBuf>,

    /// Keep the merge working directory after the run
    #[arg(long)]
    pub reserve_temp_dir: bool,

    /// Only merge these databases (repeatable, `~` prefix for regex)
    #[arg(long = "do-db")]
    pub do_dbs: Vec<String>,

    /// Skip these databases (repeatable, `~` prefix for regex)
    #[arg(long = "ignore-db")]
    pub ignore_dbs: Vec<String>,

    /// Only merge these tables, as db.table (repeatable)
    #[arg(long = "do-table")]
    pub do_tables: Vec<String>,

    /// Skip these tables, as db.table (repeatable)
    #[arg(long = "ignore-table")]
    pub ignore_tables: Vec<String>,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
