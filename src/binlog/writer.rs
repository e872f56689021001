//! Binlog writers
//!
//! `BinlogWriter` appends framed records to a single file.
//! `RotatingBinlogWriter` spreads output across numbered files,
//! starting a new file once the current one reaches a size limit.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::errors::{BinlogError, BinlogResult};
use super::record::BinlogEvent;

/// File name prefix shared by shards and merged output
pub const BINLOG_FILE_PREFIX: &str = "binlog-";

/// Append-only writer for one binlog file.
pub struct BinlogWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    bytes_written: u64,
    events_written: u64,
}

impl BinlogWriter {
    /// Creates (or truncates) a binlog file.
    ///
    /// Creates parent directories if needed.
    pub fn create(path: &Path) -> BinlogResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| BinlogError::io_at_path(parent, e))?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .map_err(|e| BinlogError::io_at_path(path, e))?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            bytes_written: 0,
            events_written: 0,
        })
    }

    /// Returns the file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes written so far.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Events written so far.
    pub fn events_written(&self) -> u64 {
        self.events_written
    }

    /// Appends one event.
    pub fn append(&mut self, event: &BinlogEvent) -> BinlogResult<()> {
        let written = event.write_to(&mut self.writer).map_err(|e| {
            BinlogError::io(
                format!(
                    "Failed to write event commit_ts={} to {}",
                    event.commit_ts,
                    self.path.display()
                ),
                e,
            )
        })?;
        self.bytes_written += written as u64;
        self.events_written += 1;
        Ok(())
    }

    /// Flushes buffered records and fsyncs the file.
    pub fn finish(mut self) -> BinlogResult<PathBuf> {
        self.writer
            .flush()
            .map_err(|e| BinlogError::io_at_path(&self.path, e))?;
        self.writer
            .get_ref()
            .sync_all()
            .map_err(|e| BinlogError::io(format!("Failed to fsync {}", self.path.display()), e))?;
        Ok(self.path)
    }
}

/// Writer that rotates across `binlog-<index>` files in one directory.
pub struct RotatingBinlogWriter {
    dir: PathBuf,
    max_file_bytes: u64,
    next_index: u64,
    current: Option<BinlogWriter>,
    finished: Vec<PathBuf>,
    events_written: u64,
}

impl RotatingBinlogWriter {
    /// Creates a rotating writer; no file is created until the first append.
    pub fn new(dir: &Path, max_file_bytes: u64) -> Self {
        Self {
            dir: dir.to_path_buf(),
            max_file_bytes: max_file_bytes.max(1),
            next_index: 0,
            current: None,
            finished: Vec::new(),
            events_written: 0,
        }
    }

    /// Returns the path for the output file with the given index.
    pub fn file_path(dir: &Path, index: u64) -> PathBuf {
        dir.join(format!("{}{:016}", BINLOG_FILE_PREFIX, index))
    }

    /// Total events written across all files.
    pub fn events_written(&self) -> u64 {
        self.events_written
    }

    /// Appends one event, rotating first if the current file is full.
    pub fn append(&mut self, event: &BinlogEvent) -> BinlogResult<()> {
        let full = self
            .current
            .as_ref()
            .map_or(false, |w| w.bytes_written() >= self.max_file_bytes);
        if full {
            self.rotate()?;
        }

        if self.current.is_none() {
            let path = Self::file_path(&self.dir, self.next_index);
            self.next_index += 1;
            self.current = Some(BinlogWriter::create(&path)?);
        }

        if let Some(writer) = self.current.as_mut() {
            writer.append(event)?;
        }
        self.events_written += 1;
        Ok(())
    }

    fn rotate(&mut self) -> BinlogResult<()> {
        if let Some(writer) = self.current.take() {
            self.finished.push(writer.finish()?);
        }
        Ok(())
    }

    /// Finishes the current file and returns every file written, in order.
    pub fn finish(mut self) -> BinlogResult<Vec<PathBuf>> {
        self.rotate()?;
        Ok(self.finished)
    }
}
