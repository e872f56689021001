//! Schema history subsystem
//!
//! Reconstructs the schema state in effect just before a PITR window:
//!
//! - `resolver` picks the history source (schema file or metadata store)
//! - `source` applies it to a catalog, re-invocably
//! - `catalog` tracks databases, tables and columns
//! - `ddl` parses statement text into structured changes
//!
//! # Design Principles
//!
//! - Exactly one history source per run
//! - Replay is convergent; applying the same history twice changes nothing
//! - Statements and jobs apply atomically

mod catalog;
mod change;
mod ddl;
mod errors;
mod resolver;
mod source;
mod types;

pub use catalog::{SchemaApplier, SchemaCatalog};
pub use change::{QualifiedName, SchemaChange, SchemaJob};
pub use ddl::parse_statement;
pub use errors::{SchemaError, SchemaResult};
pub use resolver::{
    load_base_schema, load_history_jobs, resolve, select_history_jobs, HistoryOrigin,
    ResolveError,
};
pub use source::{HistoryDdlHandler, SchemaChangeSource};
pub use types::{ColumnDef, DatabaseDef, IndexDef, TableDef};
