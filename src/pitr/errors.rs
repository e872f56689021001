//! PITR error types
//!
//! Error codes:
//! - PITR_DISCOVERY (ERROR severity): no shard files, or none in the window
//! - PITR_CONFIG (ERROR severity): invalid configuration or endpoints
//! - PITR_SNAPSHOT (ERROR severity): metadata store unreachable or failing
//! - PITR_EXECUTION (ERROR severity): schema history or an event rejected
//! - PITR_DECODE (FATAL severity): malformed shard content
//! - PITR_IO (ERROR severity): filesystem failure
//!
//! Every error records the pipeline phase it was raised in.

use std::error::Error as StdError;
use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::binlog::BinlogError;
use crate::merge::MergeError;
use crate::schema::{ResolveError, SchemaError};
use crate::window::Window;

/// Severity levels for PITR errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The run fails
    Error,
    /// The input itself is unusable
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

/// Error categories reported by a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PitrErrorCode {
    Discovery,
    Config,
    Snapshot,
    Execution,
    Decode,
    Io,
}

impl PitrErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            PitrErrorCode::Discovery => "PITR_DISCOVERY",
            PitrErrorCode::Config => "PITR_CONFIG",
            PitrErrorCode::Snapshot => "PITR_SNAPSHOT",
            PitrErrorCode::Execution => "PITR_EXECUTION",
            PitrErrorCode::Decode => "PITR_DECODE",
            PitrErrorCode::Io => "PITR_IO",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            PitrErrorCode::Decode => Severity::Fatal,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for PitrErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Pipeline phase an error was raised in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Config,
    Discover,
    Filter,
    ResolveHistory,
    Open,
    HistoryPass1,
    Map,
    HistoryPass2,
    Reduce,
    Close,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Config => "config",
            Phase::Discover => "discover",
            Phase::Filter => "filter",
            Phase::ResolveHistory => "resolve_history",
            Phase::Open => "open",
            Phase::HistoryPass1 => "history_pass_1",
            Phase::Map => "map",
            Phase::HistoryPass2 => "history_pass_2",
            Phase::Reduce => "reduce",
            Phase::Close => "close",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// PITR error with phase annotation
#[derive(Debug)]
pub struct PitrError {
    code: PitrErrorCode,
    phase: Phase,
    message: String,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl PitrError {
    pub fn new(code: PitrErrorCode, phase: Phase, message: impl Into<String>) -> Self {
        Self {
            code,
            phase,
            message: message.into(),
            source: None,
        }
    }

    fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(PitrErrorCode::Config, Phase::Config, message)
    }

    /// The input directory holds no shard files
    pub fn no_files_found(dir: &Path) -> Self {
        Self::new(
            PitrErrorCode::Discovery,
            Phase::Discover,
            format!("no binlog files found in {}", dir.display()),
        )
    }

    /// No shard intersects the window
    pub fn no_files_in_window(window: Window) -> Self {
        Self::new(
            PitrErrorCode::Discovery,
            Phase::Filter,
            format!(
                "no binlog files in window, start tso {} stop tso {}",
                window.start_tso, window.stop_tso
            ),
        )
    }

    /// Shard read failure; corruption is a decode error
    pub fn binlog(phase: Phase, err: BinlogError) -> Self {
        let code = if err.is_corruption() {
            PitrErrorCode::Decode
        } else {
            PitrErrorCode::Io
        };
        Self::new(code, phase, err.message().to_string()).with_source(err)
    }

    /// Schema history resolution failure
    pub fn resolve(phase: Phase, err: ResolveError) -> Self {
        let code = match &err {
            ResolveError::SchemaFile { .. } => PitrErrorCode::Io,
            ResolveError::Store(e) if e.is_config() => PitrErrorCode::Config,
            ResolveError::Store(_) => PitrErrorCode::Snapshot,
        };
        Self::new(code, phase, err.to_string()).with_source(err)
    }

    /// Schema history rejected by the catalog
    pub fn schema(phase: Phase, err: SchemaError) -> Self {
        Self::new(PitrErrorCode::Execution, phase, err.to_string()).with_source(err)
    }

    /// Merge engine failure
    pub fn merge(phase: Phase, err: MergeError) -> Self {
        let code = if err.is_decode() {
            PitrErrorCode::Decode
        } else if err.is_execution() {
            PitrErrorCode::Execution
        } else {
            PitrErrorCode::Io
        };
        Self::new(code, phase, err.to_string()).with_source(err)
    }

    pub fn code(&self) -> PitrErrorCode {
        self.code
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for PitrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {} (phase: {})",
            self.code.severity(),
            self.code.code(),
            self.message,
            self.phase
        )
    }
}

impl StdError for PitrError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

/// Result type for PITR operations
pub type PitrResult<T> = Result<T, PitrError>;
