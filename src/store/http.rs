//! HTTP metadata store driver
//!
//! - `GET {base}/meta/version` returns `{"version": n}`
//! - `GET {base}/meta/ddl/history?snapshot=n` returns `[SchemaJob, ...]`

use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;

use super::client::MetaStore;
use super::errors::{StoreError, StoreResult};
use crate::schema::SchemaJob;

const VERSION_PATH: &str = "/meta/version";
const HISTORY_PATH: &str = "/meta/ddl/history";

#[derive(Debug, Deserialize)]
struct VersionResponse {
    version: i64,
}

/// Blocking client for one metadata endpoint
#[derive(Debug)]
pub struct HttpMetaStore {
    client: Option<Client>,
    base_url: String,
}

impl HttpMetaStore {
    pub fn new(base_url: &str, timeout: Duration) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Unreachable {
                endpoint: base_url.to_string(),
                reason: format!("http client build failed: {e}"),
            })?;
        Ok(Self {
            client: Some(client),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn version_url(&self) -> String {
        format!("{}{}", self.base_url, VERSION_PATH)
    }

    fn history_url(&self, version: i64) -> String {
        format!("{}{}?snapshot={}", self.base_url, HISTORY_PATH, version)
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> StoreResult<T> {
        let client = self.client.as_ref().ok_or_else(|| StoreError::Request {
            endpoint: self.base_url.clone(),
            reason: "store already closed".into(),
        })?;

        let response = client.get(url).send().map_err(|e| StoreError::Unreachable {
            endpoint: self.base_url.clone(),
            reason: e.to_string(),
        })?;
        if !response.status().is_success() {
            return Err(StoreError::Request {
                endpoint: self.base_url.clone(),
                reason: format!("GET {} returned status {}", url, response.status()),
            });
        }
        response.json().map_err(|e| StoreError::Decode {
            endpoint: self.base_url.clone(),
            reason: e.to_string(),
        })
    }
}

impl MetaStore for HttpMetaStore {
    fn current_version(&mut self) -> StoreResult<i64> {
        let response: VersionResponse = self.get_json(&self.version_url())?;
        Ok(response.version)
    }

    fn history_jobs_at(&mut self, version: i64) -> StoreResult<Vec<SchemaJob>> {
        self.get_json(&self.history_url(version))
    }

    fn close(&mut self) -> StoreResult<()> {
        self.client = None;
        Ok(())
    }
}
