//! CLI module for binlog-pitr
//!
//! Provides command-line interface for:
//! - run: one PITR merge over a shard directory
//! - inspect: shard diagnostics

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command, RunArgs};
pub use commands::{build_config, inspect, run, run_command, run_pitr};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{error_envelope, response_envelope, write_error, write_response};
