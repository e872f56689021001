//! Merge engine
//!
//! Two-phase merge of the selected shards:
//!
//! - `map` scans every shard in parallel, keeps in-window events that pass
//!   the table filter, and stages them as sorted runs in a private working
//!   directory
//! - `reduce` k-way merges the runs into a single commit-ordered output,
//!   applying in-window DDL to the schema catalog as it is reached
//!
//! The working directory is released exactly once: by `close`, or by
//! `Drop` if the engine is abandoned.

mod errors;
mod map;
mod reduce;
mod staging;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::filter::TableFilter;
use crate::observability::{log_event_with_fields, Event, PitrMetrics};
use crate::schema::SchemaCatalog;
use crate::shard::ShardFile;
use crate::window::Window;

pub use errors::{MergeError, MergeResult};
pub use reduce::ReduceStats;

use staging::RunFile;

/// Default number of events per staged run
pub const DEFAULT_MAP_CHUNK_EVENTS: usize = 100_000;

/// Default output file rotation size (512 MiB)
pub const DEFAULT_MAX_OUTPUT_FILE_BYTES: u64 = 512 * 1024 * 1024;

/// Working directory name prefix
pub const WORK_DIR_PREFIX: &str = "pitr-";

/// Merge engine settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOptions {
    /// Parent of the per-run working directory
    pub temp_root: PathBuf,
    /// Where reduce writes its output files
    pub output_dir: PathBuf,
    /// Events per staged run
    pub map_chunk_events: usize,
    /// Output file rotation threshold
    pub max_output_file_bytes: u64,
}

impl MergeOptions {
    pub fn new(temp_root: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            temp_root: temp_root.into(),
            output_dir: output_dir.into(),
            map_chunk_events: DEFAULT_MAP_CHUNK_EVENTS,
            max_output_file_bytes: DEFAULT_MAX_OUTPUT_FILE_BYTES,
        }
    }
}

/// Merge state owned by one PITR run
pub struct Merge {
    shards: Vec<ShardFile>,
    total_size: u64,
    options: MergeOptions,
    work_dir: PathBuf,
    runs: Vec<RunFile>,
    closed: bool,
}

impl Merge {
    /// Creates a fresh `pitr-<uuid>` working directory under the temp root.
    pub fn open(shards: Vec<ShardFile>, total_size: u64, options: MergeOptions) -> MergeResult<Self> {
        let work_dir = options
            .temp_root
            .join(format!("{}{}", WORK_DIR_PREFIX, Uuid::new_v4()));

        fs::create_dir_all(&work_dir).map_err(|source| MergeError::WorkDir {
            path: work_dir.clone(),
            source,
        })?;

        Ok(Self {
            shards,
            total_size,
            options,
            work_dir,
            runs: Vec::new(),
            closed: false,
        })
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn shards(&self) -> &[ShardFile] {
        &self.shards
    }

    /// Summed size of the input shards
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Number of staged runs
    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// Events staged by the last `map`
    pub fn staged_events(&self) -> u64 {
        self.runs.iter().map(|r| r.events).sum()
    }

    /// Scans all shards and stages accepted events.
    ///
    /// Returns `false` when no event falls inside the window; that is an
    /// outcome, not an error. Runs from a previous `map` are discarded.
    pub fn map(
        &mut self,
        window: Window,
        filter: &TableFilter,
        metrics: &PitrMetrics,
    ) -> MergeResult<bool> {
        self.discard_runs()?;

        self.runs = map::map_all(
            &self.shards,
            window,
            filter,
            &self.work_dir,
            self.options.map_chunk_events,
            metrics,
        )?;

        let staged = self.staged_events();
        log_event_with_fields(
            Event::MapComplete,
            &[
                ("shards", &self.shards.len().to_string()),
                ("runs", &self.runs.len().to_string()),
                ("events_staged", &staged.to_string()),
            ],
        );

        Ok(staged > 0)
    }

    /// Merges staged runs into the output directory in commit order.
    pub fn reduce(
        &mut self,
        catalog: &mut SchemaCatalog,
        metrics: &PitrMetrics,
    ) -> MergeResult<ReduceStats> {
        let stats = reduce::reduce_runs(
            &self.runs,
            catalog,
            &self.options.output_dir,
            self.options.max_output_file_bytes,
            metrics,
        )?;

        log_event_with_fields(
            Event::ReduceComplete,
            &[
                ("events_written", &stats.events_written.to_string()),
                ("ddl_applied", &stats.ddl_applied.to_string()),
                ("ddl_passed_through", &stats.ddl_passed_through.to_string()),
                ("rows_unchecked", &stats.rows_unchecked.to_string()),
                ("output_files", &stats.output_files.len().to_string()),
                ("output_dir", &self.options.output_dir.display().to_string()),
            ],
        );

        Ok(stats)
    }

    /// Releases the working directory, keeping it if `preserve` is set.
    pub fn close(mut self, preserve: bool) -> MergeResult<()> {
        self.release(preserve)
    }

    fn discard_runs(&mut self) -> MergeResult<()> {
        for run in self.runs.drain(..) {
            match fs::remove_file(&run.path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(MergeError::Release {
                        path: run.path,
                        source,
                    })
                }
            }
        }
        Ok(())
    }

    fn release(&mut self, preserve: bool) -> MergeResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if !preserve {
            match fs::remove_dir_all(&self.work_dir) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(MergeError::Release {
                        path: self.work_dir.clone(),
                        source,
                    })
                }
            }
        }

        log_event_with_fields(
            Event::MergeClosed,
            &[
                ("work_dir", &self.work_dir.display().to_string()),
                ("preserved", if preserve { "true" } else { "false" }),
            ],
        );
        Ok(())
    }
}

impl Drop for Merge {
    fn drop(&mut self) {
        if let Err(e) = self.release(false) {
            log_event_with_fields(Event::MergeCloseFailed, &[("error", &e.to_string())]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binlog::{BinlogEvent, BinlogReader, BinlogWriter, RowChange};
    use crate::schema::SchemaApplier;
    use serde_json::json;
    use tempfile::TempDir;

    fn shard(dir: &Path, name: &str, commit_ts: &[i64]) -> ShardFile {
        let path = dir.join(name);
        let mut writer = BinlogWriter::create(&path).unwrap();
        for ts in commit_ts {
            let row = RowChange::insert(&["id"], vec![json!(ts)]);
            writer
                .append(&BinlogEvent::dml(*ts, *ts, "shop", "orders", row.encode()))
                .unwrap();
        }
        let path = writer.finish().unwrap();
        ShardFile {
            size: fs::metadata(&path).unwrap().len(),
            path,
            first_commit_ts: commit_ts[0],
            last_commit_ts: *commit_ts.last().unwrap(),
        }
    }

    fn catalog() -> SchemaCatalog {
        let mut catalog = SchemaCatalog::new();
        catalog.apply_statement("", "CREATE DATABASE shop").unwrap();
        catalog
            .apply_statement("shop", "CREATE TABLE orders (id INT)")
            .unwrap();
        catalog
    }

    #[test]
    fn test_map_reduce_two_shards() {
        let root = TempDir::new().unwrap();
        let shards = vec![
            shard(root.path(), "binlog-a", &[10, 20, 30]),
            shard(root.path(), "binlog-b", &[15, 25]),
        ];
        let total = shards.iter().map(|s| s.size).sum();
        let options = MergeOptions::new(root.path().join("tmp"), root.path().join("out"));
        let metrics = PitrMetrics::new();

        let mut merge = Merge::open(shards, total, options).unwrap();
        assert!(merge.work_dir().starts_with(root.path().join("tmp")));

        let found = merge
            .map(Window::new(12, 26).unwrap(), &TableFilter::allow_all(), &metrics)
            .unwrap();
        assert!(found);
        assert_eq!(merge.staged_events(), 3);

        let mut catalog = catalog();
        let stats = merge.reduce(&mut catalog, &metrics).unwrap();
        let written: Vec<i64> = stats
            .output_files
            .iter()
            .flat_map(|f| BinlogReader::open(f).unwrap().read_all().unwrap())
            .map(|e| e.commit_ts)
            .collect();
        assert_eq!(written, vec![15, 20, 25]);

        let work_dir = merge.work_dir().to_path_buf();
        merge.close(false).unwrap();
        assert!(!work_dir.exists());
    }

    #[test]
    fn test_empty_window_reports_not_found() {
        let root = TempDir::new().unwrap();
        let shards = vec![shard(root.path(), "binlog-a", &[10, 20])];
        let options = MergeOptions::new(root.path().join("tmp"), root.path().join("out"));

        let mut merge = Merge::open(shards, 0, options).unwrap();
        let found = merge
            .map(
                Window::new(21, 29).unwrap(),
                &TableFilter::allow_all(),
                &PitrMetrics::new(),
            )
            .unwrap();
        assert!(!found);
        assert_eq!(merge.run_count(), 0);
        merge.close(false).unwrap();
    }

    #[test]
    fn test_close_preserves_work_dir() {
        let root = TempDir::new().unwrap();
        let merge = Merge::open(Vec::new(), 0, MergeOptions::new(root.path(), root.path())).unwrap();
        let work_dir = merge.work_dir().to_path_buf();

        merge.close(true).unwrap();
        assert!(work_dir.exists());
    }

    #[test]
    fn test_drop_releases_work_dir() {
        let root = TempDir::new().unwrap();
        let work_dir = {
            let merge =
                Merge::open(Vec::new(), 0, MergeOptions::new(root.path(), root.path())).unwrap();
            merge.work_dir().to_path_buf()
        };
        assert!(!work_dir.exists());
    }

    #[test]
    fn test_work_dirs_are_unique() {
        let root = TempDir::new().unwrap();
        let a = Merge::open(Vec::new(), 0, MergeOptions::new(root.path(), root.path())).unwrap();
        let b = Merge::open(Vec::new(), 0, MergeOptions::new(root.path(), root.path())).unwrap();
        assert_ne!(a.work_dir(), b.work_dir());
        assert!(a
            .work_dir()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(WORK_DIR_PREFIX));
    }

    #[test]
    fn test_remap_discards_previous_runs() {
        let root = TempDir::new().unwrap();
        let shards = vec![shard(root.path(), "binlog-a", &[10, 20])];
        let options = MergeOptions::new(root.path().join("tmp"), root.path().join("out"));
        let metrics = PitrMetrics::new();

        let mut merge = Merge::open(shards, 0, options).unwrap();
        merge
            .map(Window::new(0, 0).unwrap(), &TableFilter::allow_all(), &metrics)
            .unwrap();
        merge
            .map(Window::new(15, 0).unwrap(), &TableFilter::allow_all(), &metrics)
            .unwrap();
        assert_eq!(merge.staged_events(), 1);
        assert_eq!(fs::read_dir(merge.work_dir()).unwrap().count(), 1);
    }
}
