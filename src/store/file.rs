//! File-backed metadata store
//!
//! Reads an exported metadata document:
//!
//! ```json
//! { "version": 120, "jobs": [ { "id": 1, "schema_version": 3, ... } ] }
//! ```
//!
//! The document is re-read on every call so a session sees it as of the
//! moment it pinned its snapshot.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::client::MetaStore;
use super::errors::{StoreError, StoreResult};
use crate::schema::SchemaJob;

#[derive(Debug, Deserialize)]
struct MetaDocument {
    version: i64,
    #[serde(default)]
    jobs: Vec<SchemaJob>,
}

pub struct FileMetaStore {
    path: PathBuf,
}

impl FileMetaStore {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    fn load(&self) -> StoreResult<MetaDocument> {
        let data = fs::read_to_string(&self.path).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|e| StoreError::Decode {
            endpoint: self.path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

impl MetaStore for FileMetaStore {
    fn current_version(&mut self) -> StoreResult<i64> {
        Ok(self.load()?.version)
    }

    fn history_jobs_at(&mut self, version: i64) -> StoreResult<Vec<SchemaJob>> {
        let doc = self.load()?;
        if version > doc.version {
            return Err(StoreError::VersionUnavailable {
                requested: version,
                current: doc.version,
            });
        }
        Ok(doc.jobs)
    }

    fn close(&mut self) -> StoreResult<()> {
        Ok(())
    }
}
