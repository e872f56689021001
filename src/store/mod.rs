//! Metadata store access for schema history
//!
//! Drivers are picked per endpoint scheme on every connect; sessions are
//! scoped and release their store when dropped.

mod client;
mod endpoint;
mod errors;
mod file;
mod http;

pub use client::{DriverConnector, MetaStore, StoreConnector, StoreSession};
pub use endpoint::{parse_endpoints, Endpoint, EndpointKind};
pub use errors::{StoreError, StoreResult};
pub use file::FileMetaStore;
pub use http::HttpMetaStore;
