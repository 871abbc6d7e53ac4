//! Storage backends
//!
//! A catalog addresses everything it reads (the index document, table bodies,
//! table metadata sidecars) by a `/`-separated key relative to the catalog
//! root. Backends resolve keys against a local directory or a base URL.

use async_trait::async_trait;
use reqwest::Url;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::config::RemoteConfig;
use crate::error::StorageError;

/// Byte-level access to catalog objects
#[async_trait]
pub trait Storage: Send + Sync + fmt::Debug {
    /// Read the full object stored under `key`
    async fn read(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Write `bytes` under `key`, replacing any existing object
    async fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// Human-readable address of `key` for logs and errors
    fn describe(&self, key: &str) -> String;
}

/// Storage rooted at a local directory
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a key to a path, refusing anything that escapes the root
    pub fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if key.is_empty() || escapes {
            return Err(StorageError::Io {
                key: key.to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "key must be a relative path inside the storage root",
                ),
            });
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn read(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(key)?;
        debug!("Reading {}", path.display());
        tokio::fs::read(&path).await.map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound {
                    key: key.to_string(),
                }
            } else {
                StorageError::Io {
                    key: key.to_string(),
                    source,
                }
            }
        })
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.resolve(key)?;
        let io_err = |source| StorageError::Io {
            key: key.to_string(),
            source,
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        debug!("Writing {} ({} bytes)", path.display(), bytes.len());
        tokio::fs::write(&path, bytes).await.map_err(io_err)
    }

    fn describe(&self, key: &str) -> String {
        self.root.join(key).display().to_string()
    }
}

/// Read-only storage served over HTTP(S)
#[derive(Debug, Clone)]
pub struct HttpStorage {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpStorage {
    /// Minimum request timeout; anything lower is raised to this
    pub const MIN_TIMEOUT: Duration = Duration::from_secs(1);

    pub fn new(config: &RemoteConfig) -> Result<Self, StorageError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout().max(Self::MIN_TIMEOUT))
            .build()
            .map_err(|source| StorageError::Request {
                url: config.url.clone(),
                source,
            })?;

        Ok(Self {
            client,
            base_url: parse_base_url(&config.url)?,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Each `/`-separated key segment is percent-encoded on its own
    fn url_for(&self, key: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(key.split('/').filter(|segment| !segment.is_empty()));
        }
        url
    }
}

#[async_trait]
impl Storage for HttpStorage {
    async fn read(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let url = self.url_for(key);
        debug!("GET {}", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|source| StorageError::Request {
                url: url.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(StorageError::Http {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|source| StorageError::Request {
                url: url.to_string(),
                source,
            })?;

        Ok(bytes.to_vec())
    }

    async fn write(&self, key: &str, _bytes: &[u8]) -> Result<(), StorageError> {
        Err(StorageError::ReadOnly {
            key: self.url_for(key).to_string(),
        })
    }

    fn describe(&self, key: &str) -> String {
        self.url_for(key).to_string()
    }
}

/// Base URLs always end with exactly one slash so keys can be appended
fn parse_base_url(url: &str) -> Result<Url, StorageError> {
    let normalized = format!("{}/", url.trim_end_matches('/'));
    let invalid = |reason: String| StorageError::InvalidUrl {
        url: url.to_string(),
        reason,
    };

    let parsed = Url::parse(&normalized).map_err(|e| invalid(e.to_string()))?;
    if parsed.cannot_be_a_base() {
        return Err(invalid("not a hierarchical URL".to_string()));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_local_write_then_read() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path());

        storage
            .write("garden/owid/table.bin", b"payload")
            .await
            .unwrap();
        let bytes = storage.read("garden/owid/table.bin").await.unwrap();
        assert_eq!(bytes, b"payload");
    }

    #[tokio::test]
    async fn test_local_missing_key_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path());

        let err = storage.read("garden/missing.bin").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_local_rejects_escaping_keys() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path().join("root"));

        assert!(storage.read("../outside.bin").await.is_err());
        assert!(storage.read("/etc/passwd").await.is_err());
        assert!(storage.write("a/../../b", b"x").await.is_err());
    }

    #[test]
    fn test_http_urls_join_cleanly() {
        let config = RemoteConfig {
            url: "https://catalog.example.org".to_string(),
            ..Default::default()
        };
        let storage = HttpStorage::new(&config).unwrap();
        assert_eq!(storage.base_url(), "https://catalog.example.org/");
        assert_eq!(
            storage.describe("catalog.json"),
            "https://catalog.example.org/catalog.json"
        );

        let config = RemoteConfig {
            url: "https://catalog.example.org/v2//".to_string(),
            ..Default::default()
        };
        let storage = HttpStorage::new(&config).unwrap();
        assert_eq!(
            storage.describe("/garden/x.bin"),
            "https://catalog.example.org/v2/garden/x.bin"
        );
    }

    #[test]
    fn test_http_keys_are_percent_encoded() {
        let config = RemoteConfig {
            url: "http://127.0.0.1:8080/base".to_string(),
            ..Default::default()
        };
        let storage = HttpStorage::new(&config).unwrap();
        assert_eq!(
            storage.describe("garden/d/gdp#2?.bin"),
            "http://127.0.0.1:8080/base/garden/d/gdp%232%3F.bin"
        );
        assert_eq!(
            storage.describe("garden/d/100%.csv"),
            "http://127.0.0.1:8080/base/garden/d/100%25.csv"
        );
    }

    #[test]
    fn test_http_rejects_invalid_base_urls() {
        for url in ["not a url", "mailto:data@example.org"] {
            let config = RemoteConfig {
                url: url.to_string(),
                ..Default::default()
            };
            let err = HttpStorage::new(&config).unwrap_err();
            assert!(matches!(err, StorageError::InvalidUrl { .. }), "{url}");
        }
    }

    #[tokio::test]
    async fn test_http_is_read_only() {
        let storage = HttpStorage::new(&RemoteConfig::default()).unwrap();
        let err = storage.write("catalog.json", b"{}").await.unwrap_err();
        assert!(matches!(err, StorageError::ReadOnly { .. }));
    }
}
