//! Map phase: scan shards, keep accepted events, stage sorted runs

use std::path::Path;
use std::thread;

use crate::binlog::{BinlogEvent, BinlogReader, RowChange};
use crate::filter::TableFilter;
use crate::observability::PitrMetrics;
use crate::shard::ShardFile;
use crate::window::Window;

use super::errors::{MergeError, MergeResult};
use super::staging::{RunFile, RunStager};

/// Checks that an event's payload is well-formed.
///
/// DDL only has to be text here; statements outside the catalog's grammar
/// are passed through by reduce.
pub(crate) fn decode_check(event: &BinlogEvent) -> MergeResult<()> {
    let reason = if event.is_ddl() {
        event.ddl_statement().err().map(|e| e.to_string())
    } else {
        RowChange::decode(&event.payload).err()
    };

    match reason {
        None => Ok(()),
        Some(reason) => Err(MergeError::Decode {
            commit_ts: event.commit_ts,
            db: event.db.clone(),
            table: event.table.clone(),
            reason,
        }),
    }
}

/// Scans one shard and stages its accepted events.
pub(crate) fn map_shard(
    shard_index: usize,
    shard: &ShardFile,
    window: Window,
    filter: &TableFilter,
    work_dir: &Path,
    chunk_events: usize,
    metrics: &PitrMetrics,
) -> MergeResult<Vec<RunFile>> {
    let mut reader = BinlogReader::open(&shard.path)?;
    let mut stager = RunStager::new(work_dir, shard_index, chunk_events);

    let mut scanned = 0u64;
    let mut out_of_window = 0u64;
    let mut filtered = 0u64;
    let mut staged = 0u64;

    while let Some(event) = reader.read_next()? {
        scanned += 1;

        if !window.contains(event.commit_ts) {
            out_of_window += 1;
            continue;
        }
        if filter.skip_schema_and_table(&event.db, &event.table) {
            filtered += 1;
            continue;
        }

        decode_check(&event)?;
        stager.push(event)?;
        staged += 1;
    }

    let runs = stager.finish()?;

    metrics.increment_shards_scanned();
    metrics.add_events_scanned(scanned);
    metrics.add_events_out_of_window(out_of_window);
    metrics.add_events_filtered(filtered);
    metrics.add_events_staged(staged);
    for _ in &runs {
        metrics.increment_runs_staged();
    }

    Ok(runs)
}

/// Maps every shard on its own scoped thread.
///
/// All workers are joined before returning. Runs come back in shard order,
/// then chunk order. The first failing shard (in shard order) is reported.
pub(crate) fn map_all(
    shards: &[ShardFile],
    window: Window,
    filter: &TableFilter,
    work_dir: &Path,
    chunk_events: usize,
    metrics: &PitrMetrics,
) -> MergeResult<Vec<RunFile>> {
    let results: Vec<MergeResult<Vec<RunFile>>> = thread::scope(|s| {
        let handles: Vec<_> = shards
            .iter()
            .enumerate()
            .map(|(index, shard)| {
                let handle = s.spawn(move || {
                    map_shard(index, shard, window, filter, work_dir, chunk_events, metrics)
                });
                (shard, handle)
            })
            .collect();

        handles
            .into_iter()
            .map(|(shard, handle)| {
                handle
                    .join()
                    .unwrap_or_else(|_| Err(MergeError::WorkerPanicked(shard.path.clone())))
            })
            .collect()
    });

    let mut runs = Vec::new();
    for result in results {
        runs.extend(result?);
    }
    Ok(runs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binlog::BinlogWriter;
    use crate::filter::TableName;
    use serde_json::json;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn row_event(commit_ts: i64, db: &str, table: &str) -> BinlogEvent {
        let row = RowChange::insert(&["id"], vec![json!(commit_ts)]);
        BinlogEvent::dml(commit_ts - 1, commit_ts, db, table, row.encode())
    }

    fn shard(dir: &Path, name: &str, events: &[BinlogEvent]) -> ShardFile {
        let path = dir.join(name);
        let mut writer = BinlogWriter::create(&path).unwrap();
        for e in events {
            writer.append(e).unwrap();
        }
        writer.finish().unwrap();
        let ts: Vec<i64> = events.iter().map(|e| e.commit_ts).collect();
        ShardFile {
            size: std::fs::metadata(&path).unwrap().len(),
            path,
            first_commit_ts: *ts.iter().min().unwrap(),
            last_commit_ts: *ts.iter().max().unwrap(),
        }
    }

    fn staged_ts(runs: &[RunFile]) -> Vec<Vec<i64>> {
        runs.iter()
            .map(|r| {
                r.open()
                    .unwrap()
                    .read_all()
                    .unwrap()
                    .iter()
                    .map(|e| e.commit_ts)
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_window_and_filter_applied() {
        let input = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let s = shard(
            input.path(),
            "binlog-1",
            &[
                row_event(10, "shop", "orders"),
                row_event(20, "shop", "orders"),
                row_event(25, "audit", "log"),
                row_event(30, "shop", "orders"),
            ],
        );
        let filter = TableFilter::new(&["audit".into()], &[], &[], &[]).unwrap();
        let metrics = PitrMetrics::new();

        let runs = map_shard(
            0,
            &s,
            Window::new(15, 30).unwrap(),
            &filter,
            work.path(),
            100,
            &metrics,
        )
        .unwrap();

        assert_eq!(staged_ts(&runs), vec![vec![20, 30]]);
        let snap = metrics.snapshot();
        assert_eq!(snap.events_scanned, 4);
        assert_eq!(snap.events_out_of_window, 1);
        assert_eq!(snap.events_filtered, 1);
        assert_eq!(snap.events_staged, 2);
        assert_eq!(snap.runs_staged, 1);
    }

    #[test]
    fn test_map_all_keeps_shard_order() {
        let input = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let shards = vec![
            shard(
                input.path(),
                "binlog-a",
                &[row_event(10, "d", "t"), row_event(20, "d", "t"), row_event(30, "d", "t")],
            ),
            shard(input.path(), "binlog-b", &[row_event(15, "d", "t"), row_event(25, "d", "t")]),
        ];
        let filter = TableFilter::new(&[], &[], &[], &[TableName::new("d", "t")]).unwrap();
        let metrics = PitrMetrics::new();

        let runs = map_all(
            &shards,
            Window::new(12, 26).unwrap(),
            &filter,
            work.path(),
            100,
            &metrics,
        )
        .unwrap();

        assert_eq!(staged_ts(&runs), vec![vec![20], vec![15, 25]]);
        assert_eq!(metrics.snapshot().shards_scanned, 2);
    }

    #[test]
    fn test_undecodable_row_fails_map() {
        let input = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let bad = BinlogEvent::dml(1, 2, "d", "t", b"not json".to_vec());
        let s = shard(input.path(), "binlog-1", &[bad]);

        let err = map_shard(
            0,
            &s,
            Window::new(0, 0).unwrap(),
            &TableFilter::allow_all(),
            work.path(),
            100,
            &PitrMetrics::new(),
        )
        .unwrap_err();
        assert!(err.is_decode());
    }

    #[test]
    fn test_unsupported_ddl_is_staged() {
        let input = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let s = shard(
            input.path(),
            "binlog-1",
            &[
                BinlogEvent::ddl(1, 2, "d", "t", "GRANT ALL ON d.* TO u"),
                BinlogEvent::ddl(2, 3, "d", "v", "CREATE VIEW v AS SELECT id FROM t"),
            ],
        );

        let runs = map_shard(
            0,
            &s,
            Window::new(0, 0).unwrap(),
            &TableFilter::allow_all(),
            work.path(),
            100,
            &PitrMetrics::new(),
        )
        .unwrap();
        assert_eq!(staged_ts(&runs), vec![vec![2, 3]]);
    }

    #[test]
    fn test_non_utf8_ddl_fails_map() {
        let input = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let mut ddl = BinlogEvent::ddl(1, 2, "d", "t", "CREATE DATABASE d");
        ddl.payload = vec![0xff, 0xfe, 0x00];
        let s = shard(input.path(), "binlog-1", &[ddl]);

        let err = map_shard(
            0,
            &s,
            Window::new(0, 0).unwrap(),
            &TableFilter::allow_all(),
            work.path(),
            100,
            &PitrMetrics::new(),
        )
        .unwrap_err();
        assert!(err.is_decode());
    }

    #[test]
    fn test_missing_shard_is_io() {
        let work = TempDir::new().unwrap();
        let s = ShardFile {
            path: PathBuf::from("/definitely/not/here/binlog-1"),
            first_commit_ts: 1,
            last_commit_ts: 1,
            size: 0,
        };
        let err = map_all(
            &[s],
            Window::new(0, 0).unwrap(),
            &TableFilter::allow_all(),
            work.path(),
            100,
            &PitrMetrics::new(),
        )
        .unwrap_err();
        assert!(!err.is_decode());
    }
}
