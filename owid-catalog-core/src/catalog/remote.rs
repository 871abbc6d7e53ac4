//! Catalogs backed by a published index document
//!
//! Construction performs the only index fetch of the catalog's lifetime;
//! searches run against the fetched frame and table bodies are read from the
//! same storage on load.

use std::sync::Arc;
use tracing::{debug, info};

use super::index::{CatalogFrame, IndexDocument, INDEX_DOCUMENT, INDEX_FORMAT_VERSION};
use super::Catalog;
use crate::channel::Channel;
use crate::config::CatalogConfig;
use crate::error::{error_chain, CatalogError, Result};
use crate::storage::{HttpStorage, Storage};
use crate::table::TableStore;

/// Catalog over a remote (or mirrored) index document
#[derive(Debug)]
pub struct RemoteCatalog {
    location: String,
    frame: CatalogFrame,
    store: Arc<TableStore>,
    default_channels: Vec<Channel>,
    generated: Option<String>,
}

impl RemoteCatalog {
    /// Fetch the catalog at `url`, or at the configured default URL
    pub async fn open(url: Option<&str>) -> Result<Self> {
        let mut config = CatalogConfig::default();
        if let Some(url) = url {
            config.remote.url = url.to_string();
        }
        Self::open_with_config(&config).await
    }

    pub async fn open_with_config(config: &CatalogConfig) -> Result<Self> {
        let storage = HttpStorage::new(&config.remote).map_err(|e| {
            CatalogError::CatalogUnavailable {
                location: config.remote.url.clone(),
                reason: error_chain(&e),
            }
        })?;
        Self::from_storage(Arc::new(storage), config).await
    }

    /// Fetch the index document from any storage backend
    pub async fn from_storage(storage: Arc<dyn Storage>, config: &CatalogConfig) -> Result<Self> {
        let location = storage.describe(INDEX_DOCUMENT);
        let unavailable = |reason: String| CatalogError::CatalogUnavailable {
            location: location.clone(),
            reason,
        };

        debug!("Fetching catalog index from {}", location);
        let bytes = storage
            .read(INDEX_DOCUMENT)
            .await
            .map_err(|e| unavailable(error_chain(&e)))?;

        let document = IndexDocument::from_json(&bytes)
            .map_err(|e| unavailable(format!("invalid index document: {e}")))?;

        if document.format_version > INDEX_FORMAT_VERSION {
            return Err(unavailable(format!(
                "unsupported index format version {} (newest supported is {})",
                document.format_version, INDEX_FORMAT_VERSION
            )));
        }

        if let Some(row) = document.tables.iter().find(|row| row.formats.is_empty()) {
            return Err(unavailable(format!("table {} lists no formats", row.key())));
        }

        let generated = document.generated;
        let frame = CatalogFrame::from_rows(document.tables)
            .map_err(|key| unavailable(format!("duplicate table {key}")))?;

        info!("Loaded {} tables from {}", frame.len(), location);

        Ok(Self {
            location,
            frame,
            store: Arc::new(TableStore::new(storage)),
            default_channels: config.default_channels.clone(),
            generated,
        })
    }

    /// Address the index document was fetched from
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Generation timestamp recorded in the index document
    pub fn generated(&self) -> Option<&str> {
        self.generated.as_deref()
    }
}

impl Catalog for RemoteCatalog {
    fn frame(&self) -> &CatalogFrame {
        &self.frame
    }

    fn table_store(&self) -> &Arc<TableStore> {
        &self.store
    }

    fn default_channels(&self) -> &[Channel] {
        &self.default_channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalStorage;
    use tempfile::TempDir;

    async fn open_document(json: &str) -> Result<RemoteCatalog> {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join(INDEX_DOCUMENT), json).unwrap();
        let storage = Arc::new(LocalStorage::new(temp_dir.path()));
        RemoteCatalog::from_storage(storage, &CatalogConfig::default()).await
    }

    const ROW: &str = r#"{
        "channel": "garden", "namespace": "owid", "dataset": "key_indicators",
        "table": "population", "location": "garden/owid/key_indicators/population",
        "formats": ["csv"]
    }"#;

    #[tokio::test]
    async fn test_valid_document() {
        let json = format!(
            r#"{{"formatVersion": 1, "generated": "2024-01-01T00:00:00Z", "tables": [{ROW}]}}"#
        );
        let catalog = open_document(&json).await.unwrap();

        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.generated(), Some("2024-01-01T00:00:00Z"));
        assert!(catalog.location().ends_with(INDEX_DOCUMENT));
    }

    #[tokio::test]
    async fn test_missing_document_is_unavailable() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(LocalStorage::new(temp_dir.path()));
        let err = RemoteCatalog::from_storage(storage, &CatalogConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::CatalogUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_rejected_documents() {
        let cases = [
            "not json".to_string(),
            format!(r#"{{"formatVersion": 2, "tables": [{ROW}]}}"#),
            format!(r#"{{"formatVersion": 1, "tables": [{ROW}, {ROW}]}}"#),
            r#"{"formatVersion": 1, "tables": [{"channel": "garden", "namespace": "n",
                "dataset": "d", "table": "t", "location": "t", "formats": []}]}"#
                .to_string(),
        ];

        for json in cases {
            let err = open_document(&json).await.unwrap_err();
            assert!(
                matches!(err, CatalogError::CatalogUnavailable { .. }),
                "expected CatalogUnavailable for {json}, got {err}"
            );
        }
    }
}
