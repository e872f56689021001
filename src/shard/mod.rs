//! Binlog shard discovery and window selection
//!
//! A shard is one append-only binlog file produced by one writer. Events
//! inside a shard are not required to be ordered by commit timestamp, so
//! selection scans each shard for its full commit-ts range.

mod discovery;
mod select;

pub use discovery::{commit_ts_range, first_commit_ts_and_size, search_files, TEMP_FILE_SUFFIX};
pub use select::{filter_files, ShardFile};
