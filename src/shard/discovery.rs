//! Shard discovery
//!
//! Shards are regular files named `binlog-*` directly inside the input
//! directory. Files still being written carry a `.tmp` suffix and are skipped.

use std::fs;
use std::path::{Path, PathBuf};

use crate::binlog::{BinlogError, BinlogReader, BinlogResult, BINLOG_FILE_PREFIX};

/// Suffix of shards that are still being written
pub const TEMP_FILE_SUFFIX: &str = ".tmp";

/// Lists shard files in `dir`, sorted by file name.
pub fn search_files(dir: &Path) -> BinlogResult<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| BinlogError::io_at_path(dir, e))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| BinlogError::io_at_path(dir, e))?;
        let file_type = entry
            .file_type()
            .map_err(|e| BinlogError::io_at_path(&entry.path(), e))?;
        if !file_type.is_file() {
            continue;
        }

        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(BINLOG_FILE_PREFIX) && !name.ends_with(TEMP_FILE_SUFFIX) {
            files.push(entry.path());
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Returns the first event's commit timestamp and the file size.
///
/// An empty shard is a decode error: it has no first event.
pub fn first_commit_ts_and_size(path: &Path) -> BinlogResult<(i64, u64)> {
    let mut reader = BinlogReader::open(path)?;
    match reader.read_next()? {
        Some(event) => Ok((event.commit_ts, reader.file_size())),
        None => Err(BinlogError::corruption(format!(
            "Binlog file {} contains no events",
            path.display()
        ))),
    }
}

/// Scans a whole shard and returns `(min, max)` commit timestamps,
/// or `None` for an empty shard.
pub fn commit_ts_range(path: &Path) -> BinlogResult<Option<(i64, i64)>> {
    let mut reader = BinlogReader::open(path)?;
    let mut range: Option<(i64, i64)> = None;
    while let Some(event) = reader.read_next()? {
        let ts = event.commit_ts;
        range = Some(match range {
            Some((lo, hi)) => (lo.min(ts), hi.max(ts)),
            None => (ts, ts),
        });
    }
    Ok(range)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binlog::{BinlogEvent, BinlogWriter};
    use tempfile::TempDir;

    fn write_shard(path: &Path, commit_ts: &[i64]) {
        let mut writer = BinlogWriter::create(path).unwrap();
        for ts in commit_ts {
            writer
                .append(&BinlogEvent::dml(*ts, *ts, "db", "t", b"{}".to_vec()))
                .unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_search_files_filters_and_sorts() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        fs::write(dir.join("binlog-0002"), b"").unwrap();
        fs::write(dir.join("binlog-0001"), b"").unwrap();
        fs::write(dir.join("binlog-0003.tmp"), b"").unwrap();
        fs::write(dir.join("README"), b"").unwrap();
        fs::create_dir(dir.join("binlog-dir")).unwrap();

        let files = search_files(dir).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["binlog-0001", "binlog-0002"]);
    }

    #[test]
    fn test_search_missing_dir_fails() {
        let temp_dir = TempDir::new().unwrap();
        assert!(search_files(&temp_dir.path().join("nope")).is_err());
    }

    #[test]
    fn test_first_commit_ts_and_size() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("binlog-1");
        write_shard(&path, &[100, 90, 120]);

        let (ts, size) = first_commit_ts_and_size(&path).unwrap();
        assert_eq!(ts, 100);
        assert_eq!(size, fs::metadata(&path).unwrap().len());
    }

    #[test]
    fn test_first_commit_ts_of_empty_shard_fails() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("binlog-1");
        fs::write(&path, b"").unwrap();

        let err = first_commit_ts_and_size(&path).unwrap_err();
        assert!(err.is_corruption());
    }

    #[test]
    fn test_commit_ts_range() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("binlog-1");
        write_shard(&path, &[100, 90, 120]);
        assert_eq!(commit_ts_range(&path).unwrap(), Some((90, 120)));

        let empty = temp_dir.path().join("binlog-2");
        fs::write(&empty, b"").unwrap();
        assert_eq!(commit_ts_range(&empty).unwrap(), None);
    }
}
