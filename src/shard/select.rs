//! Window-based shard selection

use std::path::{Path, PathBuf};

use serde::Serialize;

use super::discovery::commit_ts_range;
use crate::binlog::{BinlogError, BinlogResult};
use crate::observability::{warn_event, Event};
use crate::window::Window;

/// A shard selected for merging
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShardFile {
    pub path: PathBuf,
    /// Smallest commit timestamp in the shard, not the commit timestamp of
    /// its first record. Shards are not assumed to be internally ordered, so
    /// start inference uses this minimum; for an ordered shard the two agree.
    pub first_commit_ts: i64,
    /// Largest commit timestamp in the shard
    pub last_commit_ts: i64,
    /// Size in bytes
    pub size: u64,
}

/// Keeps the shards whose commit-ts range intersects `window`.
///
/// Returns them ordered by `(first_commit_ts, path)` with their summed size.
/// Empty shards carry no events and are skipped.
pub fn filter_files(paths: &[PathBuf], window: Window) -> BinlogResult<(Vec<ShardFile>, u64)> {
    let mut selected = Vec::new();

    for path in paths {
        let Some((first, last)) = commit_ts_range(path)? else {
            warn_event(Event::EmptyShardSkipped, &[("path", &path.display().to_string())]);
            continue;
        };

        if !window.intersects(first, last) {
            continue;
        }

        selected.push(ShardFile {
            path: path.clone(),
            first_commit_ts: first,
            last_commit_ts: last,
            size: shard_size(path)?,
        });
    }

    selected.sort_by(|a, b| {
        a.first_commit_ts
            .cmp(&b.first_commit_ts)
            .then_with(|| a.path.cmp(&b.path))
    });
    let total_size = selected.iter().map(|s| s.size).sum();

    Ok((selected, total_size))
}

fn shard_size(path: &Path) -> BinlogResult<u64> {
    std::fs::metadata(path)
        .map(|m| m.len())
        .map_err(|e| BinlogError::io_at_path(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binlog::{BinlogEvent, BinlogWriter};
    use std::fs;
    use tempfile::TempDir;

    fn write_shard(dir: &Path, name: &str, commit_ts: &[i64]) -> PathBuf {
        let path = dir.join(name);
        let mut writer = BinlogWriter::create(&path).unwrap();
        for ts in commit_ts {
            writer
                .append(&BinlogEvent::dml(*ts, *ts, "db", "t", b"{}".to_vec()))
                .unwrap();
        }
        writer.finish().unwrap();
        path
    }

    #[test]
    fn test_filter_keeps_intersecting_shards() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        let a = write_shard(dir, "binlog-a", &[1, 5]);
        let b = write_shard(dir, "binlog-b", &[10, 20, 30]);
        let c = write_shard(dir, "binlog-c", &[40, 50]);

        let window = Window::new(12, 26).unwrap();
        let (shards, total) = filter_files(&[a, b.clone(), c], window).unwrap();

        assert_eq!(shards.len(), 1);
        assert_eq!(shards[0].path, b);
        assert_eq!(shards[0].first_commit_ts, 10);
        assert_eq!(shards[0].last_commit_ts, 30);
        assert_eq!(total, fs::metadata(&b).unwrap().len());
    }

    #[test]
    fn test_filter_orders_by_first_commit_ts() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        let late = write_shard(dir, "binlog-a", &[200, 300]);
        let early = write_shard(dir, "binlog-b", &[100, 400]);

        let window = Window::new(0, 0).unwrap();
        let (shards, total) = filter_files(&[late.clone(), early.clone()], window).unwrap();

        assert_eq!(shards[0].path, early);
        assert_eq!(shards[1].path, late);
        assert_eq!(total, shards[0].size + shards[1].size);
    }

    #[test]
    fn test_first_commit_ts_is_minimum_of_unordered_shard() {
        let temp_dir = TempDir::new().unwrap();
        let a = write_shard(temp_dir.path(), "binlog-a", &[30, 10, 20]);

        let (shards, _) = filter_files(&[a], Window::new(0, 0).unwrap()).unwrap();
        assert_eq!(shards[0].first_commit_ts, 10);
        assert_eq!(shards[0].last_commit_ts, 30);
    }

    #[test]
    fn test_filter_skips_empty_shards() {
        let temp_dir = TempDir::new().unwrap();
        let empty = temp_dir.path().join("binlog-empty");
        fs::write(&empty, b"").unwrap();

        let (shards, total) = filter_files(&[empty], Window::new(0, 0).unwrap()).unwrap();
        assert!(shards.is_empty());
        assert_eq!(total, 0);
    }

    #[test]
    fn test_filter_nothing_in_window() {
        let temp_dir = TempDir::new().unwrap();
        let a = write_shard(temp_dir.path(), "binlog-a", &[1, 2]);
        let (shards, _) = filter_files(&[a], Window::new(10, 20).unwrap()).unwrap();
        assert!(shards.is_empty());
    }
}
