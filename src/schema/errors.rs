//! # Schema Errors

use thiserror::Error;

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Schema catalog and DDL errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    // Parse errors
    #[error("Failed to parse DDL '{sql}': {reason}")]
    Parse { sql: String, reason: String },

    #[error("Unsupported DDL statement: {0}")]
    Unsupported(String),

    // Catalog errors
    #[error("No database selected for: {0}")]
    NoDatabaseSelected(String),

    #[error("Unknown database: {0}")]
    UnknownDatabase(String),

    #[error("Unknown table: {0}.{1}")]
    UnknownTable(String, String),

    #[error("Unknown column {column} in {db}.{table}")]
    UnknownColumn {
        db: String,
        table: String,
        column: String,
    },

    // History job errors
    #[error("History job {id} (schema version {schema_version}) failed: {reason}")]
    Job {
        id: i64,
        schema_version: i64,
        reason: String,
    },
}

impl SchemaError {
    pub(crate) fn parse(sql: &str, reason: impl Into<String>) -> Self {
        SchemaError::Parse {
            sql: sql.to_string(),
            reason: reason.into(),
        }
    }

    /// True for errors raised while reading statement text
    pub fn is_parse_error(&self) -> bool {
        matches!(self, SchemaError::Parse { .. } | SchemaError::Unsupported(_))
    }
}
