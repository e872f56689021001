//! Binlog reader with strict corruption detection
//!
//! - Records are read strictly in file order
//! - A truncated or corrupted record fails the read immediately
//! - No skipping, no repair

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use super::errors::{BinlogError, BinlogResult};
use super::record::{BinlogEvent, MIN_RECORD_SIZE};

/// Sequential reader over one binlog file.
pub struct BinlogReader {
    path: PathBuf,
    reader: BufReader<File>,
    current_offset: u64,
    file_size: u64,
}

impl BinlogReader {
    /// Opens a binlog file for reading.
    pub fn open(path: &Path) -> BinlogResult<Self> {
        let file = File::open(path).map_err(|e| BinlogError::io_at_path(path, e))?;
        let file_size = file
            .metadata()
            .map_err(|e| BinlogError::io_at_path(path, e))?
            .len();

        Ok(Self {
            path: path.to_path_buf(),
            reader: BufReader::new(file),
            current_offset: 0,
            file_size,
        })
    }

    /// Returns the path being read.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the size of the file at open time.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Returns the current byte offset.
    pub fn current_offset(&self) -> u64 {
        self.current_offset
    }

    /// Reads the next event.
    ///
    /// - `Ok(Some(event))` when a record was read
    /// - `Ok(None)` at a clean end of file
    /// - `Err` on truncation, corruption or I/O failure
    pub fn read_next(&mut self) -> BinlogResult<Option<BinlogEvent>> {
        if self.current_offset >= self.file_size {
            return Ok(None);
        }

        let remaining = self.file_size - self.current_offset;
        if remaining < MIN_RECORD_SIZE as u64 {
            return Err(BinlogError::corruption_at_offset(
                &self.path,
                self.current_offset,
                format!(
                    "Truncated binlog: {} bytes remaining, minimum record size is {}",
                    remaining, MIN_RECORD_SIZE
                ),
            ));
        }

        let mut len_buf = [0u8; 4];
        self.reader.read_exact(&mut len_buf).map_err(|e| {
            BinlogError::corruption_at_offset(
                &self.path,
                self.current_offset,
                format!("Failed to read record length: {}", e),
            )
        })?;
        let record_length = u32::from_le_bytes(len_buf) as u64;

        if record_length < MIN_RECORD_SIZE as u64 {
            return Err(BinlogError::corruption_at_offset(
                &self.path,
                self.current_offset,
                format!("Invalid record length: {}", record_length),
            ));
        }

        if record_length > remaining {
            return Err(BinlogError::corruption_at_offset(
                &self.path,
                self.current_offset,
                format!(
                    "Record length {} exceeds remaining file size {}",
                    record_length, remaining
                ),
            ));
        }

        let mut record_buf = vec![0u8; record_length as usize];
        record_buf[0..4].copy_from_slice(&len_buf);
        self.reader.read_exact(&mut record_buf[4..]).map_err(|e| {
            BinlogError::corruption_at_offset(
                &self.path,
                self.current_offset,
                format!("Failed to read record body: {}", e),
            )
        })?;

        let (event, consumed) = BinlogEvent::deserialize(&record_buf).map_err(|e| {
            BinlogError::corruption_at_offset(&self.path, self.current_offset, e.to_string())
        })?;

        self.current_offset += consumed as u64;
        Ok(Some(event))
    }

    /// Reads every remaining event.
    pub fn read_all(&mut self) -> BinlogResult<Vec<BinlogEvent>> {
        let mut events = Vec::new();
        while let Some(event) = self.read_next()? {
            events.push(event);
        }
        Ok(events)
    }

    /// Returns whether there are more bytes to read.
    pub fn has_more(&self) -> bool {
        self.current_offset < self.file_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binlog::BinlogWriter;
    use std::fs::{self, OpenOptions};
    use std::io::Write;
    use tempfile::TempDir;

    fn write_events(path: &Path, commit_ts: &[i64]) {
        let mut writer = BinlogWriter::create(path).unwrap();
        for ts in commit_ts {
            writer
                .append(&BinlogEvent::dml(ts - 1, *ts, "db", "t", b"{}".to_vec()))
                .unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_read_empty_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("binlog-empty");
        fs::write(&path, b"").unwrap();

        let mut reader = BinlogReader::open(&path).unwrap();
        assert!(reader.read_next().unwrap().is_none());
        assert!(!reader.has_more());
    }

    #[test]
    fn test_read_in_file_order() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("binlog-1");
        write_events(&path, &[30, 10, 20]);

        let mut reader = BinlogReader::open(&path).unwrap();
        let ts: Vec<i64> = reader.read_all().unwrap().iter().map(|e| e.commit_ts).collect();
        assert_eq!(ts, vec![30, 10, 20]);
        assert_eq!(reader.current_offset(), reader.file_size());
    }

    #[test]
    fn test_truncated_tail_is_corruption() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("binlog-1");
        write_events(&path, &[10, 20]);

        let len = fs::metadata(&path).unwrap().len();
        let file = OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(len - 5).unwrap();

        let mut reader = BinlogReader::open(&path).unwrap();
        assert!(reader.read_next().unwrap().is_some());
        let err = reader.read_next().unwrap_err();
        assert!(err.is_corruption());
    }

    #[test]
    fn test_garbage_tail_is_corruption() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("binlog-1");
        write_events(&path, &[10]);

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&[0xAB; 64]).unwrap();

        let mut reader = BinlogReader::open(&path).unwrap();
        assert!(reader.read_next().unwrap().is_some());
        assert!(reader.read_next().unwrap_err().is_corruption());
    }

    #[test]
    fn test_open_missing_file_is_io() {
        let temp_dir = TempDir::new().unwrap();
        let err = BinlogReader::open(&temp_dir.path().join("missing")).err().unwrap();
        assert!(!err.is_corruption());
    }
}
