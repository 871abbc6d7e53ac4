//! On-disk datasets
//!
//! A dataset is a directory holding an `index.json` with the dataset's
//! metadata, plus every table of the dataset as a metadata sidecar and one or
//! more encoded bodies:
//!
//! ```text
//! garden/owid/2024-01-01/key_indicators/
//!     ├── index.json               ← DatasetMetadata
//!     ├── population.meta.json     ← TableMetadata
//!     ├── population.bin
//!     └── population.csv
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::error::{CatalogError, Result};
use crate::storage::LocalStorage;
use crate::table::{Source, Table, TableFormat, TableMetadata, TableStore, METADATA_SUFFIX};

/// Name of the dataset metadata file
pub const INDEX_FILE: &str = "index.json";

/// Dataset metadata (`index.json`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetMetadata {
    /// Dataset name; defaults to the directory name
    #[serde(default)]
    pub short_name: Option<String>,

    /// Data provider or subject area
    #[serde(default)]
    pub namespace: Option<String>,

    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub sources: Vec<Source>,
}

impl DatasetMetadata {
    pub fn new(namespace: impl Into<String>, short_name: impl Into<String>) -> Self {
        Self {
            short_name: Some(short_name.into()),
            namespace: Some(namespace.into()),
            ..Default::default()
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Load metadata from a dataset directory
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let path = dir.join(INDEX_FILE);
        let content = std::fs::read(&path).map_err(|e| {
            CatalogError::invalid_dataset(dir, format!("cannot read {INDEX_FILE}: {e}"))
        })?;

        serde_json::from_slice(&content)
            .map_err(|e| CatalogError::invalid_dataset(dir, format!("invalid {INDEX_FILE}: {e}")))
    }
}

/// One table declared by a dataset
#[derive(Debug, Clone, PartialEq)]
pub struct TableEntry {
    pub name: String,
    /// Path of the table without extension (`<dataset dir>/<name>`)
    pub path: PathBuf,
    /// Available encodings, in load priority order
    pub formats: Vec<TableFormat>,
    pub dimensions: Vec<String>,
    /// Byte size of the preferred encoding
    pub size: Option<u64>,
}

/// A dataset directory with its identity resolved
#[derive(Debug, Clone)]
pub struct Dataset {
    path: PathBuf,
    short_name: String,
    namespace: String,
    version: Option<String>,
    metadata: DatasetMetadata,
}

impl Dataset {
    /// Open a dataset using only its `index.json` and directory name
    pub fn open(dir: &Path) -> Result<Self> {
        Self::open_with_layout(dir, None)
    }

    /// Open a dataset, filling identity gaps from a
    /// `<channel>/<namespace>/<version>/<dataset>` layout under `channel_dir`
    pub fn open_with_layout(dir: &Path, channel_dir: Option<&Path>) -> Result<Self> {
        if !dir.is_dir() {
            return Err(CatalogError::invalid_dataset(dir, "not a directory"));
        }

        let metadata = DatasetMetadata::from_dir(dir)?;

        let layout: Vec<String> = channel_dir
            .and_then(|base| dir.strip_prefix(base).ok())
            .map(|relative| {
                relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        let (layout_namespace, layout_version) = match layout.as_slice() {
            [namespace, version, _dataset] => (Some(namespace.clone()), Some(version.clone())),
            _ => (None, None),
        };

        let dir_name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| CatalogError::invalid_dataset(dir, "directory has no name"))?;

        let short_name = metadata.short_name.clone().unwrap_or(dir_name);
        let namespace = metadata
            .namespace
            .clone()
            .or(layout_namespace)
            .ok_or_else(|| CatalogError::invalid_dataset(dir, "dataset has no namespace"))?;
        let version = metadata.version.clone().or(layout_version);

        if short_name.is_empty() || namespace.is_empty() {
            return Err(CatalogError::invalid_dataset(
                dir,
                "dataset name and namespace must not be empty",
            ));
        }

        Ok(Self {
            path: dir.to_path_buf(),
            short_name,
            namespace,
            version,
            metadata,
        })
    }

    /// Create a dataset directory and write its `index.json`
    pub fn create(dir: &Path, metadata: DatasetMetadata) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .map_err(|e| CatalogError::invalid_dataset(dir, format!("cannot create: {e}")))?;

        let content = serde_json::to_vec_pretty(&metadata)
            .map_err(|e| CatalogError::invalid_dataset(dir, e))?;
        std::fs::write(dir.join(INDEX_FILE), content).map_err(|e| {
            CatalogError::invalid_dataset(dir, format!("cannot write {INDEX_FILE}: {e}"))
        })?;

        Self::open(dir)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn metadata(&self) -> &DatasetMetadata {
        &self.metadata
    }

    /// Write a table into this dataset in each of the given encodings
    pub async fn add_table(&self, table: &Table, formats: &[TableFormat]) -> Result<()> {
        if formats.is_empty() {
            return Err(CatalogError::table_write(
                table.short_name(),
                "at least one format is required",
            ));
        }

        let store = TableStore::new(Arc::new(LocalStorage::new(&self.path)));
        for format in formats {
            store.save(table.short_name(), *format, table).await?;
        }
        Ok(())
    }

    /// List the dataset's tables, sorted by name
    ///
    /// Every table needs a metadata sidecar and at least one body; a dataset
    /// violating that is invalid as a whole.
    pub fn tables(&self) -> Result<Vec<TableEntry>> {
        let mut found: BTreeMap<String, (Vec<TableFormat>, bool)> = BTreeMap::new();

        let entries = std::fs::read_dir(&self.path)
            .map_err(|e| CatalogError::invalid_dataset(&self.path, e))?;

        for entry in entries {
            let entry = entry.map_err(|e| CatalogError::invalid_dataset(&self.path, e))?;
            if !entry.path().is_file() {
                continue;
            }

            let file_name = entry.file_name().to_string_lossy().into_owned();
            if file_name == INDEX_FILE {
                continue;
            }

            if let Some(stem) = file_name.strip_suffix(METADATA_SUFFIX) {
                found.entry(stem.to_string()).or_default().1 = true;
                continue;
            }

            let format = Path::new(&file_name)
                .extension()
                .and_then(|ext| ext.to_str())
                .and_then(TableFormat::from_extension);
            let stem = Path::new(&file_name)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned());

            match (format, stem) {
                (Some(format), Some(stem)) => found.entry(stem).or_default().0.push(format),
                _ => debug!("Ignoring {} in dataset {}", file_name, self.short_name),
            }
        }

        let mut tables = Vec::with_capacity(found.len());
        for (name, (mut formats, has_metadata)) in found {
            if !has_metadata {
                return Err(CatalogError::invalid_dataset(
                    &self.path,
                    format!("table '{name}' has no {METADATA_SUFFIX} sidecar"),
                ));
            }
            if formats.is_empty() {
                return Err(CatalogError::invalid_dataset(
                    &self.path,
                    format!("table '{name}' has metadata but no data file"),
                ));
            }
            formats.sort();

            let path = self.path.join(&name);
            let metadata_path = self.path.join(format!("{name}{METADATA_SUFFIX}"));
            let metadata = std::fs::read(&metadata_path)
                .map_err(|e| CatalogError::invalid_dataset(&self.path, e))
                .and_then(|bytes| {
                    TableMetadata::from_json(&bytes).map_err(|e| {
                        CatalogError::invalid_dataset(
                            &self.path,
                            format!("invalid metadata for table '{name}': {e}"),
                        )
                    })
                })?;

            let body_path = self.path.join(format!("{}.{}", name, formats[0].extension()));
            let size = std::fs::metadata(body_path).ok().map(|m| m.len());

            tables.push(TableEntry {
                name,
                path,
                formats,
                dimensions: metadata.dimensions,
                size,
            });
        }

        Ok(tables)
    }
}
