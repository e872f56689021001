//! Sorted run staging
//!
//! Map output is written as runs: bounded chunks of accepted events,
//! stably sorted by commit timestamp, stored in the binlog record format
//! inside the merge working directory.

use std::path::{Path, PathBuf};

use crate::binlog::{BinlogEvent, BinlogReader, BinlogWriter};

use super::errors::MergeResult;

/// One staged run on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RunFile {
    pub path: PathBuf,
    pub events: u64,
}

impl RunFile {
    pub fn open(&self) -> MergeResult<BinlogReader> {
        Ok(BinlogReader::open(&self.path)?)
    }
}

/// Buffers one shard's accepted events and spills them as sorted runs.
pub(crate) struct RunStager {
    dir: PathBuf,
    shard_index: usize,
    chunk_events: usize,
    buffer: Vec<BinlogEvent>,
    runs: Vec<RunFile>,
}

impl RunStager {
    pub fn new(dir: &Path, shard_index: usize, chunk_events: usize) -> Self {
        Self {
            dir: dir.to_path_buf(),
            shard_index,
            chunk_events: chunk_events.max(1),
            buffer: Vec::new(),
            runs: Vec::new(),
        }
    }

    /// Run file name; lexical order equals (shard, chunk) order.
    pub fn run_path(dir: &Path, shard_index: usize, chunk: usize) -> PathBuf {
        dir.join(format!("run-{:06}-{:06}", shard_index, chunk))
    }

    pub fn push(&mut self, event: BinlogEvent) -> MergeResult<()> {
        self.buffer.push(event);
        if self.buffer.len() >= self.chunk_events {
            self.spill()?;
        }
        Ok(())
    }

    fn spill(&mut self) -> MergeResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        // Stable: equal commit timestamps keep shard order
        self.buffer.sort_by_key(|e| e.commit_ts);

        let path = Self::run_path(&self.dir, self.shard_index, self.runs.len());
        let mut writer = BinlogWriter::create(&path)?;
        for event in self.buffer.drain(..) {
            writer.append(&event)?;
        }
        let events = writer.events_written();
        let path = writer.finish()?;

        self.runs.push(RunFile { path, events });
        Ok(())
    }

    /// Spills the remainder and returns the runs in chunk order.
    pub fn finish(mut self) -> MergeResult<Vec<RunFile>> {
        self.spill()?;
        Ok(self.runs)
    }
}
