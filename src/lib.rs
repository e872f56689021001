//! binlog-pitr - point-in-time recovery merger for sharded binlog files
//!
//! Given a directory of binlog shards and a commit-timestamp window, the
//! crate selects the relevant shards, rebuilds the schema state preceding
//! the window, and merges the in-window events into one commit-ordered
//! output stream.

pub mod binlog;
pub mod cli;
pub mod filter;
pub mod merge;
pub mod observability;
pub mod pitr;
pub mod schema;
pub mod shard;
pub mod store;
pub mod window;

pub use pitr::{Pitr, PitrConfig, PitrError, PitrResult, ProcessReport};
