//! Schema history resolution
//!
//! Picks where the schema state preceding the start timestamp comes from:
//!
//! 1. an exported base-schema file, taken as-is line by line
//! 2. otherwise the metadata store's finished DDL jobs, restricted to
//!    jobs finished strictly before the start timestamp
//! 3. otherwise nothing

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::change::SchemaJob;
use super::source::SchemaChangeSource;
use crate::observability::{warn_event, Event};
use crate::store::{parse_endpoints, StoreConnector, StoreError};
use crate::window::format_tso;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Failed to read schema file {path}: {source}")]
    SchemaFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Where schema history may come from
#[derive(Debug, Clone, Copy, Default)]
pub struct HistoryOrigin<'a> {
    /// Exported schema file; takes priority over `pd_urls`
    pub schema_file: Option<&'a Path>,
    /// Comma-separated metadata store endpoints
    pub pd_urls: Option<&'a str>,
}

/// Reads a base-schema file, one statement per line; blank lines are dropped.
pub fn load_base_schema(path: &Path) -> Result<Vec<String>, ResolveError> {
    let data = fs::read_to_string(path).map_err(|source| ResolveError::SchemaFile {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(data
        .split('\n')
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect())
}

/// Keeps jobs finished strictly before `start_tso`, ordered by schema version.
///
/// Ordering is stable: jobs sharing a version keep their store order.
pub fn select_history_jobs(jobs: Vec<SchemaJob>, start_tso: i64) -> Vec<SchemaJob> {
    let (mut kept, ignored): (Vec<SchemaJob>, Vec<SchemaJob>) =
        jobs.into_iter().partition(|job| job.finished_ts < start_tso);

    for job in &ignored {
        warn_event(
            Event::HistoryJobIgnored,
            &[
                ("job_id", &job.id.to_string()),
                ("schema_version", &job.schema_version.to_string()),
                ("finished_ts", &format_tso(job.finished_ts)),
                ("start_tso", &format_tso(start_tso)),
                ("query", job.query.as_str()),
            ],
        );
    }

    kept.sort_by_key(|job| job.schema_version);
    kept
}

/// Loads finished DDL jobs visible before `start_tso` from the store.
///
/// The session is opened for this call only and released before returning.
pub fn load_history_jobs(
    start_tso: i64,
    pd_urls: &str,
    connector: &dyn StoreConnector,
) -> Result<Vec<SchemaJob>, StoreError> {
    let endpoints = parse_endpoints(pd_urls)?;
    let mut session = connector.connect(&endpoints)?;
    let jobs = session.all_history_jobs()?;
    session.close()?;
    Ok(select_history_jobs(jobs, start_tso))
}

/// Resolves the schema history source for a run starting at `start_tso`.
pub fn resolve(
    start_tso: i64,
    origin: HistoryOrigin<'_>,
    connector: &dyn StoreConnector,
) -> Result<SchemaChangeSource, ResolveError> {
    if let Some(path) = origin.schema_file {
        let statements = load_base_schema(path)?;
        return Ok(SchemaChangeSource::FileDdl { statements });
    }

    match origin.pd_urls.map(str::trim) {
        Some(urls) if !urls.is_empty() => {
            let jobs = load_history_jobs(start_tso, urls, connector)?;
            Ok(SchemaChangeSource::JobDdl { jobs })
        }
        _ => Ok(SchemaChangeSource::empty()),
    }
}
