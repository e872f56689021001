//! CLI command implementations
//!
//! - run: load config, apply flag overrides, process one PITR run
//! - inspect: report each shard's first commit timestamp and size

use std::path::Path;

use serde_json::{json, Value};

use crate::filter::TableName;
use crate::pitr::{Pitr, PitrConfig};
use crate::shard::{first_commit_ts_and_size, search_files};
use crate::window::format_tso;

use super::args::{Cli, Command, RunArgs};
use super::errors::{CliError, CliResult};
use super::io::{write_error, write_response};

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command. Failures are
/// also reported as an error envelope on stdout.
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    let result = run_command(cli.command);
    if let Err(ref e) = result {
        write_error(e.code_str(), e.message())?;
    }
    result
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Run(args) => run_pitr(args),
        Command::Inspect { dir } => inspect(&dir),
    }
}

/// Builds the effective config: file first, then flag overrides.
pub fn build_config(args: RunArgs) -> CliResult<PitrConfig> {
    let mut config = match &args.config {
        Some(path) => PitrConfig::load(path)?,
        None => PitrConfig::default(),
    };

    if let Some(dir) = args.dir {
        config.dir = dir;
    }
    if let Some(start) = args.start_tso {
        config.start_tso = start;
    }
    if let Some(stop) = args.stop_tso {
        config.stop_tso = stop;
    }
    if args.start_datetime.is_some() {
        config.start_datetime = args.start_datetime;
    }
    if args.stop_datetime.is_some() {
        config.stop_datetime = args.stop_datetime;
    }
    if args.schema_file.is_some() {
        config.schema_file = args.schema_file;
    }
    if args.pd_urls.is_some() {
        config.pd_urls = args.pd_urls;
    }
    if let Some(output_dir) = args.output_dir {
        config.output_dir = output_dir;
    }
    if args.temp_dir.is_some() {
        config.temp_dir = args.temp_dir;
    }
    if args.reserve_temp_dir {
        config.reserve_temp_dir = true;
    }
    if !args.do_dbs.is_empty() {
        config.do_dbs = args.do_dbs;
    }
    if !args.ignore_dbs.is_empty() {
        config.ignore_dbs = args.ignore_dbs;
    }
    if !args.do_tables.is_empty() {
        config.do_tables = parse_tables(&args.do_tables)?;
    }
    if !args.ignore_tables.is_empty() {
        config.ignore_tables = parse_tables(&args.ignore_tables)?;
    }

    config.validate()?;
    Ok(config)
}

fn parse_tables(values: &[String]) -> CliResult<Vec<TableName>> {
    values
        .iter()
        .map(|v| TableName::parse(v).map_err(|e| CliError::config_error(e.to_string())))
        .collect()
}

/// Process one PITR run and print its report
pub fn run_pitr(args: RunArgs) -> CliResult<()> {
    let config = build_config(args)?;
    let mut pitr = Pitr::new(config)?;
    let report = pitr.process()?;

    write_response(serde_json::to_value(&report)?)?;

    Ok(())
}

/// Report each shard's first commit timestamp and size
///
/// Unreadable shards are listed with their error instead of failing the
/// whole listing.
pub fn inspect(dir: &Path) -> CliResult<()> {
    let files = search_files(dir)?;

    let shards: Vec<Value> = files
        .iter()
        .map(|path| match first_commit_ts_and_size(path) {
            Ok((first_commit_ts, size)) => json!({
                "path": path.display().to_string(),
                "first_commit_ts": first_commit_ts,
                "first_commit_time": format_tso(first_commit_ts),
                "size": size,
            }),
            Err(e) => json!({
                "path": path.display().to_string(),
                "error": e.to_string(),
            }),
        })
        .collect();

    write_response(json!({
        "dir": dir.display().to_string(),
        "count": shards.len(),
        "shards": shards,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_flags_override_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pitr.json");
        fs::write(
            &path,
            r#"{"dir": "/from/file", "start_tso": 5, "stop_tso": 50, "ignore_dbs": ["mysql"]}"#,
        )
        .unwrap();

        let config = build_config(RunArgs {
            config: Some(path),
            start_tso: Some(10),
            do_tables: vec!["shop.orders".into()],
            ..Default::default()
        })
        .unwrap();

        assert_eq!(config.dir, PathBuf::from("/from/file"));
        assert_eq!(config.start_tso, 10);
        assert_eq!(config.stop_tso, 50);
        assert_eq!(config.ignore_dbs, vec!["mysql"]);
        assert_eq!(config.do_tables, vec![TableName::new("shop", "orders")]);
    }

    #[test]
    fn test_flags_without_file() {
        let config = build_config(RunArgs {
            dir: Some(PathBuf::from("/data")),
            reserve_temp_dir: true,
            ..Default::default()
        })
        .unwrap();
        assert!(config.reserve_temp_dir);
        assert_eq!(config.output_dir, PathBuf::from("./pitr-output"));
    }

    #[test]
    fn test_bad_table_flag() {
        let err = build_config(RunArgs {
            dir: Some(PathBuf::from("/data")),
            ignore_tables: vec!["no_dot".into()],
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(err.code_str(), "PITR_CLI_CONFIG_ERROR");
    }

    #[test]
    fn test_missing_dir_fails_validation() {
        let err = build_config(RunArgs::default()).unwrap_err();
        assert_eq!(err.code_str(), "PITR_CONFIG");
    }
}
