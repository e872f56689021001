//! PITR orchestrator
//!
//! Sequences one run:
//!
//! 1. Discover shard files and keep those intersecting the window
//! 2. Infer the start timestamp from the earliest shard when unset
//! 3. Resolve the schema history preceding the start
//! 4. Open the merge engine and apply the history (pass 1)
//! 5. Map; an empty window ends the run successfully here
//! 6. Re-apply the history (pass 2) and reduce
//! 7. Close the merge engine, always
//!
//! A close failure is logged but never replaces an earlier error.

mod config;
mod errors;
mod state;

use std::path::PathBuf;

use serde::Serialize;

use crate::filter::TableFilter;
use crate::merge::{Merge, ReduceStats};
use crate::observability::{
    log_event_with_fields, Event, MetricsSnapshot, ObservationScope, PitrMetrics,
};
use crate::schema::{resolve, HistoryDdlHandler, SchemaCatalog};
use crate::shard::{filter_files, search_files, ShardFile};
use crate::store::{DriverConnector, StoreConnector};
use crate::window::{format_tso, Window};

pub use config::PitrConfig;
pub use errors::{Phase, PitrError, PitrErrorCode, PitrResult, Severity};
pub use state::PitrState;

/// Summary of a finished run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessReport {
    /// Window after start inference
    pub window: Window,
    pub files: Vec<ShardFile>,
    pub total_size: u64,
    /// `file` or `jobs`
    pub history_kind: &'static str,
    pub history_len: usize,
    /// Whether any event fell inside the window
    pub events_found: bool,
    /// How many times schema history was applied
    pub ddl_passes: u32,
    pub events_staged: u64,
    pub events_written: u64,
    /// In-window DDL applied during reduce
    pub ddl_applied: u64,
    pub output_files: Vec<PathBuf>,
    pub final_state: PitrState,
    pub metrics: MetricsSnapshot,
}

/// What the merge phases produced
struct MergeOutcome {
    events_found: bool,
    ddl_passes: u32,
    events_staged: u64,
    reduce: ReduceStats,
}

/// PITR run driver
pub struct Pitr {
    config: PitrConfig,
    connector: Box<dyn StoreConnector>,
    state: PitrState,
}

impl Pitr {
    /// Validates the config and uses the built-in store drivers.
    pub fn new(config: PitrConfig) -> PitrResult<Self> {
        let connector = DriverConnector::new(config.store_timeout());
        Self::with_connector(config, Box::new(connector))
    }

    /// Validates the config and uses `connector` for the metadata store.
    pub fn with_connector(
        config: PitrConfig,
        connector: Box<dyn StoreConnector>,
    ) -> PitrResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            connector,
            state: PitrState::Discovering,
        })
    }

    pub fn config(&self) -> &PitrConfig {
        &self.config
    }

    /// State reached by the last `process` call
    pub fn state(&self) -> PitrState {
        self.state
    }

    /// Runs the whole pipeline once.
    pub fn process(&mut self) -> PitrResult<ProcessReport> {
        self.state = PitrState::Discovering;
        let window = self.config.window()?;

        log_event_with_fields(
            Event::Begin,
            &[
                ("dir", &self.config.dir.display().to_string()),
                ("start_tso", &format_tso(window.start_tso)),
                ("stop_tso", &format_tso(window.stop_tso)),
            ],
        );

        let result = self.run(window);

        // Every run ends closed, including those failing before merge opened
        if self.state != PitrState::Closed {
            self.state = PitrState::Closed;
        }

        match &result {
            Ok(report) => log_event_with_fields(
                Event::Complete,
                &[
                    ("events_found", bool_str(report.events_found)),
                    ("events_written", &report.events_written.to_string()),
                    ("ddl_passes", &report.ddl_passes.to_string()),
                ],
            ),
            Err(e) => log_event_with_fields(
                Event::Failed,
                &[
                    ("code", e.code().code()),
                    ("phase", e.phase().as_str()),
                    ("message", e.message()),
                ],
            ),
        }

        result
    }

    fn run(&mut self, window: Window) -> PitrResult<ProcessReport> {
        let filter = self.config.table_filter()?;
        let metrics = PitrMetrics::new();

        let (shards, total_size, window) = self.select_shards(window)?;
        self.state.advance(PitrState::WindowResolved)?;

        let source = {
            let scope = ObservationScope::new("RESOLVE_HISTORY");
            match resolve(
                window.start_tso,
                self.config.history_origin(),
                self.connector.as_ref(),
            ) {
                Ok(source) => {
                    scope.complete();
                    source
                }
                Err(e) => {
                    let err = PitrError::resolve(Phase::ResolveHistory, e);
                    scope.fail(err.message());
                    return Err(err);
                }
            }
        };
        log_event_with_fields(
            Event::HistoryResolved,
            &[
                ("kind", source.kind()),
                ("count", &source.len().to_string()),
                ("start_tso", &format_tso(window.start_tso)),
            ],
        );
        let history_kind = source.kind();
        let history_len = source.len();
        let handler = HistoryDdlHandler::new(source);
        self.state.advance(PitrState::HistoryResolved)?;

        let mut catalog = SchemaCatalog::new();
        let mut merge = Merge::open(shards.clone(), total_size, self.config.merge_options())
            .map_err(|e| PitrError::merge(Phase::Open, e))?;

        let outcome = self.merge_phases(&mut merge, &handler, &mut catalog, window, &filter, &metrics);

        let closed = merge.close(self.config.reserve_temp_dir);
        self.state.advance(PitrState::Closed)?;

        let outcome = match (outcome, closed) {
            (Ok(outcome), Ok(())) => outcome,
            (Ok(_), Err(e)) => return Err(PitrError::merge(Phase::Close, e)),
            (Err(e), Ok(())) => return Err(e),
            (Err(e), Err(close_err)) => {
                log_event_with_fields(
                    Event::MergeCloseFailed,
                    &[("error", &close_err.to_string())],
                );
                return Err(e);
            }
        };

        Ok(ProcessReport {
            window,
            files: shards,
            total_size,
            history_kind,
            history_len,
            events_found: outcome.events_found,
            ddl_passes: outcome.ddl_passes,
            events_staged: outcome.events_staged,
            events_written: outcome.reduce.events_written,
            ddl_applied: outcome.reduce.ddl_applied,
            output_files: outcome.reduce.output_files,
            final_state: self.state,
            metrics: metrics.snapshot(),
        })
    }

    /// Discovers shards, keeps those in the window and fixes the start.
    fn select_shards(&self, window: Window) -> PitrResult<(Vec<ShardFile>, u64, Window)> {
        let dir = &self.config.dir;

        let files = search_files(dir).map_err(|e| PitrError::binlog(Phase::Discover, e))?;
        log_event_with_fields(
            Event::ShardsDiscovered,
            &[
                ("dir", &dir.display().to_string()),
                ("count", &files.len().to_string()),
            ],
        );
        if files.is_empty() {
            return Err(PitrError::no_files_found(dir));
        }

        let (shards, total_size) =
            filter_files(&files, window).map_err(|e| PitrError::binlog(Phase::Filter, e))?;
        log_event_with_fields(
            Event::ShardsFiltered,
            &[
                ("count", &shards.len().to_string()),
                ("total_size", &total_size.to_string()),
                ("window", &window.to_string()),
            ],
        );

        // Shards are ordered by their smallest commit timestamp
        let Some(first) = shards.first() else {
            return Err(PitrError::no_files_in_window(window));
        };

        let window = if window.start_tso == 0 {
            let start = first.first_commit_ts;
            log_event_with_fields(
                Event::StartTsoInferred,
                &[
                    ("start_tso", &format_tso(start)),
                    ("path", &first.path.display().to_string()),
                ],
            );
            window
                .with_start(start)
                .map_err(|e| PitrError::config(format!("Invalid inferred window: {}", e)))?
        } else {
            window
        };

        Ok((shards, total_size, window))
    }

    fn merge_phases(
        &mut self,
        merge: &mut Merge,
        handler: &HistoryDdlHandler,
        catalog: &mut SchemaCatalog,
        window: Window,
        filter: &TableFilter,
        metrics: &PitrMetrics,
    ) -> PitrResult<MergeOutcome> {
        apply_history(handler, catalog, Phase::HistoryPass1, 1)?;
        let mut ddl_passes = 1;

        let found = {
            let scope = ObservationScope::new("MAP");
            match merge.map(window, filter, metrics) {
                Ok(found) => {
                    scope.complete_with_fields(&[("found", bool_str(found))]);
                    found
                }
                Err(e) => {
                    let err = PitrError::merge(Phase::Map, e);
                    scope.fail(err.message());
                    return Err(err);
                }
            }
        };
        self.state.advance(PitrState::Mapped { empty: !found })?;

        if !found {
            log_event_with_fields(Event::NoEventInWindow, &[("window", &window.to_string())]);
            return Ok(MergeOutcome {
                events_found: false,
                ddl_passes,
                events_staged: 0,
                reduce: ReduceStats::default(),
            });
        }

        apply_history(handler, catalog, Phase::HistoryPass2, 2)?;
        ddl_passes += 1;
        self.state.advance(PitrState::HistoryReapplied)?;

        let reduce = {
            let scope = ObservationScope::new("REDUCE");
            match merge.reduce(catalog, metrics) {
                Ok(stats) => {
                    scope.complete();
                    stats
                }
                Err(e) => {
                    let err = PitrError::merge(Phase::Reduce, e);
                    scope.fail(err.message());
                    return Err(err);
                }
            }
        };
        self.state.advance(PitrState::Reduced)?;

        Ok(MergeOutcome {
            events_found: true,
            ddl_passes,
            events_staged: merge.staged_events(),
            reduce,
        })
    }
}

fn apply_history(
    handler: &HistoryDdlHandler,
    catalog: &mut SchemaCatalog,
    phase: Phase,
    pass: u32,
) -> PitrResult<()> {
    handler
        .execute(catalog)
        .map_err(|e| PitrError::schema(phase, e))?;
    log_event_with_fields(
        Event::DdlExecuted,
        &[
            ("pass", &pass.to_string()),
            ("kind", handler.source().kind()),
            ("count", &handler.source().len().to_string()),
            ("tables", &catalog.table_count().to_string()),
        ],
    );
    Ok(())
}

fn bool_str(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binlog::{BinlogEvent, BinlogWriter, RowChange};
    use crate::schema::SchemaJob;
    use crate::store::{Endpoint, MetaStore, StoreResult, StoreSession};
    use serde_json::json;
    use std::fs;
    use std::path::Path;
    use std::rc::Rc;
    use std::cell::Cell;
    use tempfile::TempDir;

    struct JobStore {
        jobs: Vec<SchemaJob>,
    }

    impl MetaStore for JobStore {
        fn current_version(&mut self) -> StoreResult<i64> {
            Ok(1)
        }

        fn history_jobs_at(&mut self, _version: i64) -> StoreResult<Vec<SchemaJob>> {
            Ok(self.jobs.clone())
        }

        fn close(&mut self) -> StoreResult<()> {
            Ok(())
        }
    }

    struct MockConnector {
        jobs: Vec<SchemaJob>,
        calls: Rc<Cell<usize>>,
    }

    impl StoreConnector for MockConnector {
        fn connect(&self, _endpoints: &[Endpoint]) -> StoreResult<StoreSession> {
            self.calls.set(self.calls.get() + 1);
            StoreSession::open(
                Box::new(JobStore {
                    jobs: self.jobs.clone(),
                }),
                "mock",
            )
        }
    }

    fn write_shard(dir: &Path, name: &str, commit_ts: &[i64]) {
        let mut writer = BinlogWriter::create(&dir.join(name)).unwrap();
        for ts in commit_ts {
            let row = RowChange::insert(&["id"], vec![json!(ts)]);
            writer
                .append(&BinlogEvent::dml(*ts, *ts, "shop", "orders", row.encode()))
                .unwrap();
        }
        writer.finish().unwrap();
    }

    fn config(root: &TempDir) -> PitrConfig {
        let input = root.path().join("input");
        fs::create_dir_all(&input).unwrap();
        let mut config = PitrConfig::new(input);
        config.output_dir = root.path().join("out");
        config.temp_dir = Some(root.path().join("tmp"));
        config
    }

    fn schema_file(root: &TempDir) -> PathBuf {
        let path = root.path().join("schema.sql");
        fs::write(
            &path,
            "CREATE DATABASE shop\nUSE shop\nCREATE TABLE orders (id INT PRIMARY KEY)\n",
        )
        .unwrap();
        path
    }

    #[test]
    fn test_no_files_found() {
        let root = TempDir::new().unwrap();
        let mut pitr = Pitr::new(config(&root)).unwrap();
        let err = pitr.process().unwrap_err();
        assert_eq!(err.code(), PitrErrorCode::Discovery);
        assert_eq!(err.phase(), Phase::Discover);
        assert_eq!(pitr.state(), PitrState::Closed);
    }

    #[test]
    fn test_no_files_in_window() {
        let root = TempDir::new().unwrap();
        let mut config = config(&root);
        write_shard(&config.dir, "binlog-1", &[10, 20]);
        config.start_tso = 30;
        config.stop_tso = 40;

        let err = Pitr::new(config).unwrap().process().unwrap_err();
        assert_eq!(err.code(), PitrErrorCode::Discovery);
        assert!(err.message().contains("start tso 30"));
    }

    #[test]
    fn test_full_run() {
        let root = TempDir::new().unwrap();
        let mut config = config(&root);
        write_shard(&config.dir, "binlog-a", &[10, 20, 30]);
        write_shard(&config.dir, "binlog-b", &[15, 25]);
        config.start_tso = 12;
        config.stop_tso = 26;
        config.schema_file = Some(schema_file(&root));

        let mut pitr = Pitr::new(config).unwrap();
        let report = pitr.process().unwrap();

        assert!(report.events_found);
        assert_eq!(report.ddl_passes, 2);
        assert_eq!(report.events_written, 3);
        assert_eq!(report.files.len(), 2);
        assert_eq!(report.history_kind, "file");
        assert_eq!(report.history_len, 3);
        assert_eq!(report.final_state, PitrState::Closed);
        assert_eq!(report.metrics.events_written, 3);
    }

    #[test]
    fn test_empty_window_short_circuits() {
        let root = TempDir::new().unwrap();
        let mut config = config(&root);
        // Shard range [10, 40] intersects, but no event lies in [21, 29]
        write_shard(&config.dir, "binlog-a", &[10, 20, 30, 40]);
        config.start_tso = 21;
        config.stop_tso = 29;

        let report = Pitr::new(config.clone()).unwrap().process().unwrap();
        assert!(!report.events_found);
        assert_eq!(report.ddl_passes, 1);
        assert_eq!(report.events_written, 0);
        assert!(report.output_files.is_empty());
        assert!(!config.output_dir.exists());
    }

    #[test]
    fn test_start_inferred_and_jobs_filtered() {
        let root = TempDir::new().unwrap();
        let mut config = config(&root);
        write_shard(&config.dir, "binlog-a", &[100, 150]);
        config.pd_urls = Some("http://pd:2379".into());

        let calls = Rc::new(Cell::new(0));
        let connector = MockConnector {
            jobs: vec![
                SchemaJob::from_query(1, 1, 50, "", "CREATE DATABASE shop"),
                SchemaJob::from_query(2, 2, 60, "shop", "CREATE TABLE orders (id INT)"),
                SchemaJob::from_query(3, 3, 100, "shop", "DROP TABLE orders"),
            ],
            calls: Rc::clone(&calls),
        };

        let mut pitr = Pitr::with_connector(config, Box::new(connector)).unwrap();
        let report = pitr.process().unwrap();

        assert_eq!(report.window.start_tso, 100);
        assert_eq!(report.history_kind, "jobs");
        // The DROP finished at the start and is not history
        assert_eq!(report.history_len, 2);
        assert_eq!(report.events_written, 2);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_decode_error_still_closes() {
        let root = TempDir::new().unwrap();
        let mut config = config(&root);
        let mut writer = BinlogWriter::create(&config.dir.join("binlog-a")).unwrap();
        writer
            .append(&BinlogEvent::dml(10, 10, "shop", "orders", b"{not json".to_vec()))
            .unwrap();
        writer.finish().unwrap();

        let err = Pitr::new(config.clone()).unwrap().process().unwrap_err();
        assert_eq!(err.code(), PitrErrorCode::Decode);
        assert_eq!(err.phase(), Phase::Map);

        let tmp = config.temp_dir.take().unwrap();
        assert_eq!(fs::read_dir(tmp).unwrap().count(), 0);
    }

    #[test]
    fn test_execution_error_still_closes() {
        let root = TempDir::new().unwrap();
        let mut config = config(&root);
        let mut writer = BinlogWriter::create(&config.dir.join("binlog-a")).unwrap();
        writer
            .append(&BinlogEvent::ddl(10, 10, "shop", "orders", "ALTER TABLE orders ADD note TEXT"))
            .unwrap();
        writer.finish().unwrap();
        // The database exists but the altered table does not
        let schema = root.path().join("db-only.sql");
        fs::write(&schema, "CREATE DATABASE shop\n").unwrap();
        config.schema_file = Some(schema);

        let err = Pitr::new(config.clone()).unwrap().process().unwrap_err();
        assert_eq!(err.code(), PitrErrorCode::Execution);
        assert_eq!(err.phase(), Phase::Reduce);

        let tmp = config.temp_dir.take().unwrap();
        assert_eq!(fs::read_dir(tmp).unwrap().count(), 0);
    }

    #[test]
    fn test_no_schema_source_merges_rows() {
        let root = TempDir::new().unwrap();
        let mut config = config(&root);
        write_shard(&config.dir, "binlog-a", &[10, 20, 30]);
        write_shard(&config.dir, "binlog-b", &[15, 25]);
        config.start_tso = 12;
        config.stop_tso = 26;

        let report = Pitr::new(config).unwrap().process().unwrap();
        assert_eq!(report.history_len, 0);
        assert_eq!(report.events_written, 3);
        assert_eq!(report.metrics.rows_unchecked, 3);
        assert_eq!(report.final_state, PitrState::Closed);
    }

    #[test]
    fn test_reserve_temp_dir() {
        let root = TempDir::new().unwrap();
        let mut config = config(&root);
        write_shard(&config.dir, "binlog-a", &[10]);
        config.schema_file = Some(schema_file(&root));
        config.reserve_temp_dir = true;

        Pitr::new(config.clone()).unwrap().process().unwrap();

        let tmp = config.temp_dir.unwrap();
        let kept: Vec<_> = fs::read_dir(tmp).unwrap().collect();
        assert_eq!(kept.len(), 1);
    }
}
