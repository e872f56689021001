//! CLI-specific error types

use std::fmt;
use std::io;

use crate::binlog::BinlogError;
use crate::pitr::PitrError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration or argument error
    ConfigError,
    /// I/O error (stdout, shard inspection)
    IoError,
    /// The PITR run failed; carries the run's own code
    RunFailed(&'static str),
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "PITR_CLI_CONFIG_ERROR",
            Self::IoError => "PITR_CLI_IO_ERROR",
            Self::RunFailed(code) => *code,
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    /// Create a new CLI error
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Config error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    /// I/O error
    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    /// Get the error code
    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<BinlogError> for CliError {
    fn from(e: BinlogError) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<PitrError> for CliError {
    fn from(e: PitrError) -> Self {
        Self::new(CliErrorCode::RunFailed(e.code().code()), e.to_string())
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pitr::PitrError;

    #[test]
    fn test_run_failure_keeps_pitr_code() {
        let err = CliError::from(PitrError::config("dir must be set"));
        assert_eq!(err.code_str(), "PITR_CONFIG");
        assert!(err.message().contains("dir must be set"));
    }

    #[test]
    fn test_display() {
        let err = CliError::config_error("bad flag");
        assert_eq!(err.to_string(), "PITR_CLI_CONFIG_ERROR: bad flag");
    }
}
