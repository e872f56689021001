//! Binlog file format
//!
//! Shards and merged output share one record format: a length-prefixed,
//! CRC32-checked frame per event. Readers halt on the first malformed record.
//!
//! # Design Principles
//!
//! - Explicit failure over silent recovery
//! - Every record is checksummed
//! - Commit timestamp is carried in every frame so merging never has to
//!   decode payloads to order events

mod checksum;
mod errors;
mod reader;
mod record;
mod row;
mod writer;

pub use checksum::{compute_checksum, verify_checksum};
pub use errors::{BinlogError, BinlogErrorCode, BinlogResult, Severity};
pub use reader::BinlogReader;
pub use record::{BinlogEvent, EventType, MIN_RECORD_SIZE};
pub use row::{RowChange, RowChangeKind};
pub use writer::{BinlogWriter, RotatingBinlogWriter, BINLOG_FILE_PREFIX};
