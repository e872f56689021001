//! Store endpoint parsing
//!
//! Endpoints come as a comma-separated list. Supported forms:
//!
//! - `http://host:port`, `https://host:port`
//! - `host:port` (taken as `http://`)
//! - `file:///path/to/meta.json`

use std::fmt;
use std::path::PathBuf;

use super::errors::{StoreError, StoreResult};

/// How an endpoint is reached
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointKind {
    /// HTTP metadata API rooted at this base URL
    Http { base_url: String },
    /// Exported metadata document on disk
    File { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    raw: String,
    kind: EndpointKind,
}

impl Endpoint {
    /// Parses one endpoint.
    pub fn parse(raw: &str) -> StoreResult<Self> {
        let raw = raw.trim();
        let invalid = |reason: &str| StoreError::InvalidEndpoint {
            endpoint: raw.to_string(),
            reason: reason.to_string(),
        };

        if let Some(path) = raw.strip_prefix("file://") {
            if path.is_empty() {
                return Err(invalid("missing file path"));
            }
            return Ok(Self {
                raw: raw.to_string(),
                kind: EndpointKind::File {
                    path: PathBuf::from(path),
                },
            });
        }

        let (scheme, rest) = match raw.split_once("://") {
            Some((scheme, rest)) => (scheme.to_ascii_lowercase(), rest),
            None => ("http".to_string(), raw),
        };
        if scheme != "http" && scheme != "https" {
            return Err(invalid("unsupported scheme"));
        }

        let host = rest.split('/').next().unwrap_or_default();
        if host.is_empty() || host.contains(char::is_whitespace) {
            return Err(invalid("missing host"));
        }
        if let Some((_, port)) = host.rsplit_once(':') {
            if !host.ends_with(']') && port.parse::<u16>().is_err() {
                return Err(invalid("invalid port"));
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            kind: EndpointKind::Http {
                base_url: format!("{}://{}", scheme, rest.trim_end_matches('/')),
            },
        })
    }

    /// Endpoint as written in configuration
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn kind(&self) -> &EndpointKind {
        &self.kind
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Parses a comma-separated endpoint list; blank entries are ignored.
pub fn parse_endpoints(urls: &str) -> StoreResult<Vec<Endpoint>> {
    let endpoints = urls
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Endpoint::parse)
        .collect::<StoreResult<Vec<_>>>()?;

    if endpoints.is_empty() {
        return Err(StoreError::NoEndpoints);
    }
    Ok(endpoints)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_http_forms() {
        let endpoints = parse_endpoints("http://pd-0:2379, pd-1:2379/ ,https://pd-2").unwrap();
        let bases: Vec<&EndpointKind> = endpoints.iter().map(|e| e.kind()).collect();
        assert_eq!(
            bases,
            vec![
                &EndpointKind::Http {
                    base_url: "http://pd-0:2379".into()
                },
                &EndpointKind::Http {
                    base_url: "http://pd-1:2379".into()
                },
                &EndpointKind::Http {
                    base_url: "https://pd-2".into()
                },
            ]
        );
        assert_eq!(endpoints[1].as_str(), "pd-1:2379/");
    }

    #[test]
    fn test_parse_file_endpoint() {
        let endpoint = Endpoint::parse("file:///tmp/meta.json").unwrap();
        assert_eq!(
            endpoint.kind(),
            &EndpointKind::File {
                path: PathBuf::from("/tmp/meta.json")
            }
        );
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(matches!(parse_endpoints(" , "), Err(StoreError::NoEndpoints)));
        assert!(Endpoint::parse("ftp://host").unwrap_err().is_config());
        assert!(Endpoint::parse("http://").is_err());
        assert!(Endpoint::parse("host:notaport").is_err());
        assert!(Endpoint::parse("file://").is_err());
    }
}
