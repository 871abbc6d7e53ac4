//! Table store: encodes/decodes tables and moves them through a storage backend
//!
//! A table at `location` is laid out as
//!
//! ```text
//! <location>.meta.json   ← TableMetadata sidecar, shared by every encoding
//! <location>.bin         ← one file per available TableFormat
//! <location>.jsonl
//! <location>.csv
//! ```

use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::debug;

use super::{codec, Table, TableFormat, TableMetadata};
use crate::error::{error_chain, CatalogError, Result};
use crate::storage::Storage;

/// Suffix of table metadata sidecars
pub const METADATA_SUFFIX: &str = ".meta.json";

/// Loads and saves tables through a [`Storage`] backend
#[derive(Debug, Clone)]
pub struct TableStore {
    storage: Arc<dyn Storage>,
}

impl TableStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Storage key of a table body in the given encoding
    pub fn data_key(location: &str, format: TableFormat) -> String {
        format!("{}.{}", location, format.extension())
    }

    /// Storage key of a table's metadata sidecar
    pub fn metadata_key(location: &str) -> String {
        format!("{location}{METADATA_SUFFIX}")
    }

    /// Read and decode the table stored at `location`
    pub async fn load(&self, location: &str, format: TableFormat) -> Result<Table> {
        self.load_verified(location, format, None).await
    }

    /// Like [`TableStore::load`], also checking the body against a `sha256:` digest
    pub async fn load_verified(
        &self,
        location: &str,
        format: TableFormat,
        checksum: Option<&str>,
    ) -> Result<Table> {
        let data_key = Self::data_key(location, format);
        debug!("Loading table {} as {}", location, format);

        let bytes = self
            .storage
            .read(&data_key)
            .await
            .map_err(|e| CatalogError::table_load(location, error_chain(&e)))?;

        if let Some(expected) = checksum {
            let actual = sha256_digest(&bytes);
            if actual != expected {
                return Err(CatalogError::table_load(
                    location,
                    format!("checksum mismatch: expected {expected}, got {actual}"),
                ));
            }
        }

        let data = codec::decode(format, &bytes)
            .map_err(|e| CatalogError::table_load(location, error_chain(&e)))?;

        let metadata_bytes = self
            .storage
            .read(&Self::metadata_key(location))
            .await
            .map_err(|e| CatalogError::table_load(location, error_chain(&e)))?;
        let metadata = TableMetadata::from_json(&metadata_bytes).map_err(|e| {
            CatalogError::table_load(location, format!("invalid table metadata: {e}"))
        })?;

        Ok(Table { metadata, data })
    }

    /// Encode and write `table` at `location`, including its metadata sidecar
    pub async fn save(&self, location: &str, format: TableFormat, table: &Table) -> Result<()> {
        let body = codec::encode(format, &table.data)
            .map_err(|e| CatalogError::table_write(location, error_chain(&e)))?;
        let metadata = table
            .metadata
            .to_json()
            .map_err(|e| CatalogError::table_write(location, e))?;

        self.storage
            .write(&Self::data_key(location, format), &body)
            .await
            .map_err(|e| CatalogError::table_write(location, error_chain(&e)))?;
        self.storage
            .write(&Self::metadata_key(location), &metadata)
            .await
            .map_err(|e| CatalogError::table_write(location, error_chain(&e)))?;

        debug!("Saved table {} as {} ({} bytes)", location, format, body.len());
        Ok(())
    }
}

/// SHA-256 digest in the `sha256:<hex>` form used by index documents
pub fn sha256_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("sha256:{}", hex::encode(hasher.finalize()))
}
