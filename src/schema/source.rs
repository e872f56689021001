//! Schema history sources and their execution

use serde::Serialize;

use super::catalog::SchemaApplier;
use super::change::SchemaJob;
use super::errors::SchemaResult;

/// Schema history needed before the start timestamp
///
/// Exactly one form exists per run: raw statements from an exported schema
/// file, or structured jobs from the metadata store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchemaChangeSource {
    FileDdl { statements: Vec<String> },
    JobDdl { jobs: Vec<SchemaJob> },
}

impl SchemaChangeSource {
    /// Source that changes nothing
    pub fn empty() -> Self {
        SchemaChangeSource::FileDdl {
            statements: Vec::new(),
        }
    }

    /// Statement or job count
    pub fn len(&self) -> usize {
        match self {
            SchemaChangeSource::FileDdl { statements } => statements.len(),
            SchemaChangeSource::JobDdl { jobs } => jobs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `file` or `jobs`, for logs and reports
    pub fn kind(&self) -> &'static str {
        match self {
            SchemaChangeSource::FileDdl { .. } => "file",
            SchemaChangeSource::JobDdl { .. } => "jobs",
        }
    }
}

/// Applies a resolved history source to a catalog.
///
/// Re-invocable: the catalog's convergent replay makes a second `execute`
/// with the same source a successful no-op.
#[derive(Debug, Clone)]
pub struct HistoryDdlHandler {
    source: SchemaChangeSource,
}

impl HistoryDdlHandler {
    pub fn new(source: SchemaChangeSource) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &SchemaChangeSource {
        &self.source
    }

    /// Jobs go through one bulk call; statements run one by one against the
    /// default namespace and stop at the first failure.
    pub fn execute(&self, applier: &mut dyn SchemaApplier) -> SchemaResult<()> {
        match &self.source {
            SchemaChangeSource::JobDdl { jobs } => applier.apply_jobs(jobs),
            SchemaChangeSource::FileDdl { statements } => {
                for sql in statements {
                    applier.apply_statement("", sql)?;
                }
                Ok(())
            }
        }
    }
}
