//! PITR run configuration
//!
//! Loaded from a JSON file, optionally overridden from the command line.
//! Optional fields carry defaults; `validate` rejects inconsistent settings
//! before any file is touched.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::errors::{PitrError, PitrResult};
use crate::filter::{TableFilter, TableName};
use crate::merge::{MergeOptions, DEFAULT_MAP_CHUNK_EVENTS, DEFAULT_MAX_OUTPUT_FILE_BYTES};
use crate::schema::HistoryOrigin;
use crate::store::parse_endpoints;
use crate::window::{parse_datetime_tso, Window};

/// Configuration of one PITR run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PitrConfig {
    /// Directory holding the binlog shards
    #[serde(default)]
    pub dir: PathBuf,

    /// Window start; 0 infers it from the earliest selected shard
    #[serde(default)]
    pub start_tso: i64,

    /// Window stop; 0 means unbounded
    #[serde(default)]
    pub stop_tso: i64,

    /// `YYYY-MM-DD HH:MM:SS` (UTC), used when `start_tso` is 0
    #[serde(default)]
    pub start_datetime: Option<String>,

    /// `YYYY-MM-DD HH:MM:SS` (UTC), used when `stop_tso` is 0
    #[serde(default)]
    pub stop_datetime: Option<String>,

    /// Exported base schema, one statement per line
    #[serde(default)]
    pub schema_file: Option<PathBuf>,

    /// Comma-separated metadata store endpoints
    #[serde(default)]
    pub pd_urls: Option<String>,

    #[serde(default)]
    pub ignore_dbs: Vec<String>,

    #[serde(default)]
    pub ignore_tables: Vec<TableName>,

    #[serde(default)]
    pub do_dbs: Vec<String>,

    #[serde(default)]
    pub do_tables: Vec<TableName>,

    /// Keep the merge working directory after the run
    #[serde(default)]
    pub reserve_temp_dir: bool,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Parent of the merge working directory (default: system temp dir)
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,

    #[serde(default = "default_map_chunk_events")]
    pub map_chunk_events: usize,

    #[serde(default = "default_max_output_file_bytes")]
    pub max_output_file_bytes: u64,

    /// Per-request timeout against the metadata store
    #[serde(default = "default_store_timeout_secs")]
    pub store_timeout_secs: u64,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./pitr-output")
}
fn default_map_chunk_events() -> usize {
    DEFAULT_MAP_CHUNK_EVENTS
}
fn default_max_output_file_bytes() -> u64 {
    DEFAULT_MAX_OUTPUT_FILE_BYTES
}
fn default_store_timeout_secs() -> u64 {
    10
}

impl Default for PitrConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::new(),
            start_tso: 0,
            stop_tso: 0,
            start_datetime: None,
            stop_datetime: None,
            schema_file: None,
            pd_urls: None,
            ignore_dbs: Vec::new(),
            ignore_tables: Vec::new(),
            do_dbs: Vec::new(),
            do_tables: Vec::new(),
            reserve_temp_dir: false,
            output_dir: default_output_dir(),
            temp_dir: None,
            map_chunk_events: default_map_chunk_events(),
            max_output_file_bytes: default_max_output_file_bytes(),
            store_timeout_secs: default_store_timeout_secs(),
        }
    }
}

impl PitrConfig {
    /// Config for a shard directory with every other setting at its default
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Self::default()
        }
    }

    /// Load configuration from file, without validating it.
    ///
    /// Command-line overrides are applied by the caller before `validate`.
    pub fn load(path: &Path) -> PitrResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            PitrError::config(format!("Failed to read config {}: {}", path.display(), e))
        })?;

        serde_json::from_str(&content)
            .map_err(|e| PitrError::config(format!("Invalid config JSON: {}", e)))
    }

    pub fn validate(&self) -> PitrResult<()> {
        if self.dir.as_os_str().is_empty() {
            return Err(PitrError::config("dir must be set"));
        }

        if self.map_chunk_events == 0 {
            return Err(PitrError::config("map_chunk_events must be > 0"));
        }

        if self.max_output_file_bytes == 0 {
            return Err(PitrError::config("max_output_file_bytes must be > 0"));
        }

        if self.output_dir.as_os_str().is_empty() {
            return Err(PitrError::config("output_dir must be set"));
        }

        self.window()?;
        self.table_filter()?;

        // A schema file wins, so endpoints are only checked when they are used
        if self.schema_file.is_none() {
            if let Some(urls) = self.pd_urls.as_deref().filter(|u| !u.trim().is_empty()) {
                parse_endpoints(urls)
                    .map_err(|e| PitrError::config(format!("Invalid pd_urls: {}", e)))?;
            }
        }

        Ok(())
    }

    /// Configured window, with datetimes converted to TSOs.
    pub fn window(&self) -> PitrResult<Window> {
        let start = resolve_bound(self.start_tso, self.start_datetime.as_deref())?;
        let stop = resolve_bound(self.stop_tso, self.stop_datetime.as_deref())?;
        Window::new(start, stop).map_err(|e| PitrError::config(format!("Invalid window: {}", e)))
    }

    pub fn table_filter(&self) -> PitrResult<TableFilter> {
        TableFilter::new(
            &self.ignore_dbs,
            &self.ignore_tables,
            &self.do_dbs,
            &self.do_tables,
        )
        .map_err(|e| PitrError::config(e.to_string()))
    }

    /// Schema history origins in priority order
    pub fn history_origin(&self) -> HistoryOrigin<'_> {
        HistoryOrigin {
            schema_file: self.schema_file.as_deref(),
            pd_urls: self.pd_urls.as_deref(),
        }
    }

    pub fn temp_root(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    pub fn merge_options(&self) -> MergeOptions {
        MergeOptions {
            temp_root: self.temp_root(),
            output_dir: self.output_dir.clone(),
            map_chunk_events: self.map_chunk_events,
            max_output_file_bytes: self.max_output_file_bytes,
        }
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }
}

fn resolve_bound(tso: i64, datetime: Option<&str>) -> PitrResult<i64> {
    match datetime {
        Some(value) if tso == 0 && !value.trim().is_empty() => {
            parse_datetime_tso(value).map_err(|e| PitrError::config(e.to_string()))
        }
        _ => Ok(tso),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pitr::PitrErrorCode;
    use crate::window::LOGICAL_BITS;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_from_minimal_json() {
        let config: PitrConfig = serde_json::from_str(r#"{"dir": "/data/binlog"}"#).unwrap();
        assert_eq!(config.dir, PathBuf::from("/data/binlog"));
        assert_eq!(config.start_tso, 0);
        assert_eq!(config.output_dir, PathBuf::from("./pitr-output"));
        assert_eq!(config.map_chunk_events, DEFAULT_MAP_CHUNK_EVENTS);
        assert!(!config.reserve_temp_dir);
        config.validate().unwrap();
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pitr.json");
        fs::write(
            &path,
            r#"{
                "dir": "/data/binlog",
                "start_tso": 10,
                "stop_tso": 20,
                "do_tables": [{"schema": "shop", "table": "orders"}],
                "reserve_temp_dir": true
            }"#,
        )
        .unwrap();

        let config = PitrConfig::load(&path).unwrap();
        assert_eq!(config.window().unwrap(), Window::new(10, 20).unwrap());
        assert_eq!(config.do_tables, vec![TableName::new("shop", "orders")]);
        assert!(config.reserve_temp_dir);
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pitr.json");
        fs::write(&path, "{not json").unwrap();
        assert_eq!(
            PitrConfig::load(&path).unwrap_err().code(),
            PitrErrorCode::Config
        );
    }

    #[test]
    fn test_inverted_window_rejected() {
        let mut config = PitrConfig::new("/data");
        config.start_tso = 30;
        config.stop_tso = 20;
        assert_eq!(config.validate().unwrap_err().code(), PitrErrorCode::Config);
    }

    #[test]
    fn test_missing_dir_rejected() {
        assert!(PitrConfig::default().validate().is_err());
    }

    #[test]
    fn test_zero_chunk_rejected() {
        let mut config = PitrConfig::new("/data");
        config.map_chunk_events = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_datetime_used_only_when_tso_unset() {
        let mut config = PitrConfig::new("/data");
        config.start_datetime = Some("1970-01-01 00:00:01".into());
        config.stop_datetime = Some("1970-01-01 00:00:02".into());
        config.stop_tso = 5_000 << LOGICAL_BITS;

        let window = config.window().unwrap();
        assert_eq!(window.start_tso, 1_000 << LOGICAL_BITS);
        assert_eq!(window.stop_tso, 5_000 << LOGICAL_BITS);
    }

    #[test]
    fn test_bad_datetime_rejected() {
        let mut config = PitrConfig::new("/data");
        config.start_datetime = Some("yesterday".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_endpoints_ignored_when_schema_file_set() {
        let mut config = PitrConfig::new("/data");
        config.pd_urls = Some("ftp://pd".into());
        assert!(config.validate().is_err());

        config.schema_file = Some(PathBuf::from("/schema.sql"));
        config.validate().unwrap();
    }

    #[test]
    fn test_bad_filter_rejected() {
        let mut config = PitrConfig::new("/data");
        config.do_dbs = vec!["~(".into()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_merge_options() {
        let mut config = PitrConfig::new("/data");
        config.temp_dir = Some(PathBuf::from("/scratch"));
        config.map_chunk_events = 7;
        let options = config.merge_options();
        assert_eq!(options.temp_root, PathBuf::from("/scratch"));
        assert_eq!(options.map_chunk_events, 7);
    }
}
