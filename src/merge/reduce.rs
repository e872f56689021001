//! Reduce phase: k-way merge of staged runs into the output stream

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::binlog::{BinlogEvent, BinlogReader, RotatingBinlogWriter, RowChange};
use crate::observability::{warn_event, Event, PitrMetrics};
use crate::schema::{SchemaApplier, SchemaCatalog, SchemaError};
use crate::window::format_tso;

use super::errors::{MergeError, MergeResult};
use super::staging::RunFile;

/// Outcome of a reduce pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReduceStats {
    pub events_written: u64,
    pub ddl_applied: u64,
    pub ddl_passed_through: u64,
    pub rows_unchecked: u64,
    pub output_files: Vec<PathBuf>,
}

/// Merges runs by `(commit_ts, run index)`.
///
/// Each run is already sorted, and only a run's head sits in the heap,
/// so the key is unique and the output order is deterministic.
struct RunMerger {
    readers: Vec<BinlogReader>,
    heads: Vec<Option<BinlogEvent>>,
    heap: BinaryHeap<Reverse<(i64, usize)>>,
}

impl RunMerger {
    fn open(runs: &[RunFile]) -> MergeResult<Self> {
        let mut merger = Self {
            readers: Vec::with_capacity(runs.len()),
            heads: Vec::with_capacity(runs.len()),
            heap: BinaryHeap::with_capacity(runs.len()),
        };
        for (index, run) in runs.iter().enumerate() {
            merger.readers.push(run.open()?);
            merger.heads.push(None);
            merger.advance(index)?;
        }
        Ok(merger)
    }

    fn advance(&mut self, index: usize) -> MergeResult<()> {
        if let Some(event) = self.readers[index].read_next()? {
            self.heap.push(Reverse((event.commit_ts, index)));
            self.heads[index] = Some(event);
        }
        Ok(())
    }

    fn next_event(&mut self) -> MergeResult<Option<BinlogEvent>> {
        let Some(Reverse((_, index))) = self.heap.pop() else {
            return Ok(None);
        };
        let event = self.heads[index].take();
        self.advance(index)?;
        Ok(event)
    }
}

/// How an event related to the catalog at its stream position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Applied {
    /// DDL changed the catalog
    Ddl,
    /// DDL outside the catalog's grammar; catalog unchanged
    DdlPassedThrough,
    /// Row matched the catalog
    Row,
    /// Row for a table or columns the catalog does not know
    RowUnchecked,
}

/// Tracks the catalog across the merged stream.
///
/// Events are never rewritten or dropped here. Apart from undecodable
/// payloads, only parsed DDL that the catalog cannot apply fails the run.
struct StreamSchema<'a> {
    catalog: &'a mut SchemaCatalog,
    /// Tables already reported as unknown, so each is logged once
    unknown_tables: HashSet<(String, String)>,
}

impl<'a> StreamSchema<'a> {
    fn new(catalog: &'a mut SchemaCatalog) -> Self {
        Self {
            catalog,
            unknown_tables: HashSet::new(),
        }
    }

    fn apply(&mut self, event: &BinlogEvent) -> MergeResult<Applied> {
        let decode_error = |reason: String| MergeError::Decode {
            commit_ts: event.commit_ts,
            db: event.db.clone(),
            table: event.table.clone(),
            reason,
        };

        if event.is_ddl() {
            let sql = event.ddl_statement().map_err(|e| decode_error(e.to_string()))?;
            return match self.catalog.apply_statement(&event.db, sql) {
                Ok(()) => Ok(Applied::Ddl),
                Err(e) if e.is_parse_error() => {
                    warn_event(
                        Event::DdlPassedThrough,
                        &[
                            ("commit_ts", &format_tso(event.commit_ts)),
                            ("db", event.db.as_str()),
                            ("query", sql),
                            ("reason", &e.to_string()),
                        ],
                    );
                    Ok(Applied::DdlPassedThrough)
                }
                Err(source) => Err(MergeError::Execution {
                    commit_ts: event.commit_ts,
                    source,
                }),
            };
        }

        let row = RowChange::decode(&event.payload).map_err(decode_error)?;
        match self.catalog.check_row(&event.db, &event.table, &row.columns) {
            Ok(()) => Ok(Applied::Row),
            Err(SchemaError::UnknownTable(db, table)) => {
                if self.unknown_tables.insert((db.clone(), table.clone())) {
                    warn_event(
                        Event::RowSchemaUnknown,
                        &[
                            ("commit_ts", &format_tso(event.commit_ts)),
                            ("db", db.as_str()),
                            ("table", table.as_str()),
                        ],
                    );
                }
                Ok(Applied::RowUnchecked)
            }
            Err(e) => {
                warn_event(
                    Event::RowSchemaUnknown,
                    &[
                        ("commit_ts", &format_tso(event.commit_ts)),
                        ("db", event.db.as_str()),
                        ("table", event.table.as_str()),
                        ("reason", &e.to_string()),
                    ],
                );
                Ok(Applied::RowUnchecked)
            }
        }
    }
}

/// Merges `runs` in commit order into `output_dir`, applying schema changes
/// to `catalog` as they are reached.
pub(crate) fn reduce_runs(
    runs: &[RunFile],
    catalog: &mut SchemaCatalog,
    output_dir: &Path,
    max_output_file_bytes: u64,
    metrics: &PitrMetrics,
) -> MergeResult<ReduceStats> {
    let mut merger = RunMerger::open(runs)?;
    let mut writer = RotatingBinlogWriter::new(output_dir, max_output_file_bytes);
    let mut schema = StreamSchema::new(catalog);
    let mut stats = ReduceStats::default();

    while let Some(event) = merger.next_event()? {
        match schema.apply(&event)? {
            Applied::Ddl => {
                stats.ddl_applied += 1;
                metrics.increment_ddl_applied();
            }
            Applied::DdlPassedThrough => {
                stats.ddl_passed_through += 1;
                metrics.increment_ddl_passed_through();
            }
            Applied::RowUnchecked => {
                stats.rows_unchecked += 1;
                metrics.increment_rows_unchecked();
            }
            Applied::Row => {}
        }

        writer.append(&event)?;
        metrics.increment_events_written();
    }

    stats.events_written = writer.events_written();
    stats.output_files = writer.finish()?;
    Ok(stats)
}
