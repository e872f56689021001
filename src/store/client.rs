//! Metadata store client handles
//!
//! A `StoreConnector` turns an endpoint list into a `StoreSession`. The
//! session pins the snapshot version read at connect time and releases the
//! underlying store exactly once, either through `close` or on drop. Nothing
//! is registered process-wide; every connect builds its own driver.

use std::time::Duration;

use super::endpoint::{Endpoint, EndpointKind};
use super::errors::{StoreError, StoreResult};
use super::file::FileMetaStore;
use super::http::HttpMetaStore;
use crate::observability::Logger;
use crate::schema::SchemaJob;

/// Read access to schema metadata at a version
pub trait MetaStore: Send {
    /// Latest committed version
    fn current_version(&mut self) -> StoreResult<i64>;

    /// Every finished schema job visible at `version`, in store order.
    fn history_jobs_at(&mut self, version: i64) -> StoreResult<Vec<SchemaJob>>;

    /// Releases connections; called once by the owning session.
    fn close(&mut self) -> StoreResult<()>;
}

/// Opens sessions against a list of endpoints
pub trait StoreConnector {
    fn connect(&self, endpoints: &[Endpoint]) -> StoreResult<StoreSession>;
}

/// A connected store pinned to one snapshot version
pub struct StoreSession {
    store: Box<dyn MetaStore>,
    endpoint: String,
    snapshot_version: i64,
    closed: bool,
}

impl StoreSession {
    /// Reads the current version and pins it as the snapshot.
    ///
    /// On failure the store is closed before returning.
    pub fn open(mut store: Box<dyn MetaStore>, endpoint: &str) -> StoreResult<Self> {
        match store.current_version() {
            Ok(snapshot_version) => Ok(Self {
                store,
                endpoint: endpoint.to_string(),
                snapshot_version,
                closed: false,
            }),
            Err(e) => {
                if let Err(close_err) = store.close() {
                    log_close_failure(endpoint, &close_err);
                }
                Err(e)
            }
        }
    }

    /// Endpoint this session is connected to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn snapshot_version(&self) -> i64 {
        self.snapshot_version
    }

    /// Every history job visible at the pinned snapshot
    pub fn all_history_jobs(&mut self) -> StoreResult<Vec<SchemaJob>> {
        self.store.history_jobs_at(self.snapshot_version)
    }

    /// Releases the store, reporting any close failure.
    pub fn close(mut self) -> StoreResult<()> {
        self.closed = true;
        self.store.close()
    }
}

impl Drop for StoreSession {
    fn drop(&mut self) {
        if !self.closed {
            self.closed = true;
            if let Err(e) = self.store.close() {
                log_close_failure(&self.endpoint, &e);
            }
        }
    }
}

fn log_close_failure(endpoint: &str, err: &StoreError) {
    Logger::warn(
        "PITR_STORE_CLOSE_FAILED",
        &[("endpoint", endpoint), ("error", &err.to_string())],
    );
}

/// Default connector choosing a driver per endpoint scheme
///
/// Endpoints are tried in order; the first one that answers wins. No retries.
#[derive(Debug, Clone)]
pub struct DriverConnector {
    timeout: Duration,
}

impl DriverConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn open_one(&self, endpoint: &Endpoint) -> StoreResult<StoreSession> {
        let store: Box<dyn MetaStore> = match endpoint.kind() {
            EndpointKind::Http { base_url } => {
                Box::new(HttpMetaStore::new(base_url, self.timeout)?)
            }
            EndpointKind::File { path } => Box::new(FileMetaStore::new(path)),
        };
        StoreSession::open(store, endpoint.as_str())
    }
}

impl Default for DriverConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl StoreConnector for DriverConnector {
    fn connect(&self, endpoints: &[Endpoint]) -> StoreResult<StoreSession> {
        let mut last_error = StoreError::NoEndpoints;
        for endpoint in endpoints {
            match self.open_one(endpoint) {
                Ok(session) => return Ok(session),
                Err(e) => {
                    Logger::warn(
                        "PITR_STORE_ENDPOINT_FAILED",
                        &[("endpoint", endpoint.as_str()), ("error", &e.to_string())],
                    );
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }
}
