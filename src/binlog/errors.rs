//! Binlog error types
//!
//! Error codes:
//! - PITR_BINLOG_IO (ERROR severity)
//! - PITR_BINLOG_CORRUPTION (FATAL severity)

use std::fmt;
use std::io;
use std::path::Path;

/// Severity levels for binlog errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The run fails, the shard may be readable on a later attempt
    Error,
    /// Shard content is unusable
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Binlog-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinlogErrorCode {
    /// Filesystem failure while reading or writing a binlog file
    PitrBinlogIo,
    /// Malformed record: truncation, bad length, bad type or checksum mismatch
    PitrBinlogCorruption,
}

impl BinlogErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            BinlogErrorCode::PitrBinlogIo => "PITR_BINLOG_IO",
            BinlogErrorCode::PitrBinlogCorruption => "PITR_BINLOG_CORRUPTION",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            BinlogErrorCode::PitrBinlogIo => Severity::Error,
            BinlogErrorCode::PitrBinlogCorruption => Severity::Fatal,
        }
    }
}

impl fmt::Display for BinlogErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Binlog error with context
#[derive(Debug)]
pub struct BinlogError {
    code: BinlogErrorCode,
    message: String,
    details: Option<String>,
    source: Option<io::Error>,
}

impl BinlogError {
    /// Create an I/O error
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            code: BinlogErrorCode::PitrBinlogIo,
            message: message.into(),
            details: None,
            source: Some(source),
        }
    }

    /// Create an I/O error at a specific path
    pub fn io_at_path(path: &Path, source: io::Error) -> Self {
        Self::io(format!("I/O error at {}", path.display()), source)
    }

    /// Create a corruption error
    pub fn corruption(message: impl Into<String>) -> Self {
        Self {
            code: BinlogErrorCode::PitrBinlogCorruption,
            message: message.into(),
            details: None,
            source: None,
        }
    }

    /// Create a corruption error with byte offset context
    pub fn corruption_at_offset(path: &Path, offset: u64, reason: impl Into<String>) -> Self {
        Self {
            code: BinlogErrorCode::PitrBinlogCorruption,
            message: reason.into(),
            details: Some(format!("file: {}, byte_offset: {}", path.display(), offset)),
            source: None,
        }
    }

    /// Returns the error code
    pub fn code(&self) -> BinlogErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns additional error details
    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    /// Returns true if the error reports malformed shard content
    pub fn is_corruption(&self) -> bool {
        self.code == BinlogErrorCode::PitrBinlogCorruption
    }
}

impl fmt::Display for BinlogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        if let Some(ref source) = self.source {
            write!(f, " (caused by: {})", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for BinlogError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for binlog operations
pub type BinlogResult<T> = Result<T, BinlogError>;
