//! Merge error types
//!
//! Every variant falls in one of three categories reported upwards:
//! I/O, decode (malformed shard or run content) and execution (an event
//! the schema catalog rejects).

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::binlog::BinlogError;
use crate::schema::SchemaError;

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("Failed to prepare working directory {path}: {source}")]
    WorkDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to release working directory {path}: {source}")]
    Release {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Binlog(#[from] BinlogError),

    #[error("Undecodable event at commit_ts {commit_ts} ({db}.{table}): {reason}")]
    Decode {
        commit_ts: i64,
        db: String,
        table: String,
        reason: String,
    },

    #[error("Event at commit_ts {commit_ts} rejected by schema: {source}")]
    Execution {
        commit_ts: i64,
        #[source]
        source: SchemaError,
    },

    #[error("Map worker for {0} panicked")]
    WorkerPanicked(PathBuf),
}

impl MergeError {
    /// True for malformed shard or run content
    pub fn is_decode(&self) -> bool {
        match self {
            MergeError::Decode { .. } => true,
            MergeError::Binlog(e) => e.is_corruption(),
            _ => false,
        }
    }

    /// True when the schema catalog rejected an event
    pub fn is_execution(&self) -> bool {
        matches!(self, MergeError::Execution { .. })
    }
}

pub type MergeResult<T> = Result<T, MergeError>;
