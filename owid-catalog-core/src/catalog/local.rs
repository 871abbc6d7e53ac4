//! Catalogs built by scanning a directory tree
//!
//! ```text
//! <root>/
//!     ├── catalog.json                      ← written by reindex()
//!     ├── garden/
//!     │   └── owid/2024-01-01/key_indicators/
//!     │       ├── index.json
//!     │       ├── population.meta.json
//!     │       └── population.bin
//!     └── meadow/...
//! ```
//!
//! Only first-level directories named after a [`Channel`] are scanned. One
//! broken dataset never fails the whole scan; it is skipped and reported in
//! [`LocalCatalog::warnings`].

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::index::{CatalogFrame, FrameBuilder, IndexDocument, INDEX_DOCUMENT};
use super::row::IndexRow;
use super::Catalog;
use crate::channel::Channel;
use crate::config::CatalogConfig;
use crate::dataset::{Dataset, INDEX_FILE};
use crate::error::{error_chain, CatalogError, Result};
use crate::storage::LocalStorage;
use crate::table::{sha256_digest, TableStore};

/// A dataset skipped during a scan
#[derive(Debug, Clone, PartialEq)]
pub struct ScanWarning {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of scanning a catalog root
#[derive(Debug, Default)]
pub struct ScanReport {
    pub frame: CatalogFrame,
    pub warnings: Vec<ScanWarning>,
}

/// Catalog over datasets stored in a local directory
#[derive(Debug)]
pub struct LocalCatalog {
    root: PathBuf,
    frame: CatalogFrame,
    store: Arc<TableStore>,
    default_channels: Vec<Channel>,
    warnings: Vec<ScanWarning>,
}

impl LocalCatalog {
    /// Scan `path` with the default configuration
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(path, &CatalogConfig::default()).await
    }

    pub async fn open_with_config(path: impl AsRef<Path>, config: &CatalogConfig) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(CatalogError::CatalogNotFound { path: root });
        }

        let scan_root = root.clone();
        let report = tokio::task::spawn_blocking(move || scan_catalog(&scan_root))
            .await
            .map_err(|e| CatalogError::CatalogUnavailable {
                location: root.display().to_string(),
                reason: format!("scan task failed: {e}"),
            })??;

        info!(
            "Indexed {} tables from {} ({} datasets skipped)",
            report.frame.len(),
            root.display(),
            report.warnings.len()
        );

        Ok(Self {
            store: Arc::new(TableStore::new(Arc::new(LocalStorage::new(&root)))),
            root,
            frame: report.frame,
            default_channels: config.default_channels.clone(),
            warnings: report.warnings,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Datasets skipped while scanning
    pub fn warnings(&self) -> &[ScanWarning] {
        &self.warnings
    }

    /// Publish the index as `<root>/catalog.json`
    ///
    /// Each row gets the size and checksum of its preferred encoding, so the
    /// tree can be served as-is to a [`super::RemoteCatalog`].
    pub async fn reindex(&self) -> Result<PathBuf> {
        let path = self.root.join(INDEX_DOCUMENT);
        let index_error = |reason: String| CatalogError::IndexWrite {
            path: path.clone(),
            reason,
        };

        let mut rows = Vec::with_capacity(self.frame.len());
        for row in self.frame.iter() {
            let mut row = row.clone();
            if let Some(format) = row.preferred_format() {
                let body = self
                    .store
                    .storage()
                    .read(&TableStore::data_key(&row.location, format))
                    .await
                    .map_err(|e| index_error(error_chain(&e)))?;
                row.size = Some(body.len() as u64);
                row.checksum = Some(sha256_digest(&body));
            }
            rows.push(row);
        }

        let document = IndexDocument::new(rows)
            .to_json()
            .map_err(|e| index_error(e.to_string()))?;
        tokio::fs::write(&path, document)
            .await
            .map_err(|e| index_error(e.to_string()))?;

        info!("Wrote {} rows to {}", self.frame.len(), path.display());
        Ok(path)
    }
}

impl Catalog for LocalCatalog {
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

/// Scan a catalog root synchronously
///
/// Rows are ordered by channel directory, then dataset path, then table name.
pub fn scan_catalog(root: &Path) -> Result<ScanReport> {
    if !root.is_dir() {
        return Err(CatalogError::CatalogNotFound {
            path: root.to_path_buf(),
        });
    }

    let unreadable = |e: std::io::Error| CatalogError::CatalogUnavailable {
        location: root.display().to_string(),
        reason: e.to_string(),
    };

    let mut channel_dirs = Vec::new();
    for entry in std::fs::read_dir(root).map_err(unreadable)? {
        let path = entry.map_err(unreadable)?.path();
        if !path.is_dir() {
            continue;
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match name.parse::<Channel>() {
            Ok(channel) => channel_dirs.push((name, channel, path)),
            Err(_) => debug!("Skipping non-channel directory {}", path.display()),
        }
    }
    channel_dirs.sort_by(|a, b| a.0.cmp(&b.0));

    let mut builder = CatalogFrame::builder();
    let mut warnings = Vec::new();

    for (_, channel, channel_dir) in channel_dirs {
        for entry in WalkDir::new(&channel_dir).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| channel_dir.clone());
                    warn!("Cannot read {}: {}", path.display(), e);
                    warnings.push(ScanWarning {
                        path,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            if !entry.file_type().is_dir() || !entry.path().join(INDEX_FILE).is_file() {
                continue;
            }

            let indexed = index_dataset(root, channel, &channel_dir, entry.path(), &mut builder);
            if let Err(warning) = indexed {
                warn!("Skipping dataset {}: {}", warning.path.display(), warning.reason);
                warnings.push(warning);
            }
        }
    }

    Ok(ScanReport {
        frame: builder.finish(),
        warnings,
    })
}

/// Index every table of one dataset, or none of them
fn index_dataset(
    root: &Path,
    channel: Channel,
    channel_dir: &Path,
    dir: &Path,
    builder: &mut FrameBuilder,
) -> std::result::Result<(), ScanWarning> {
    let skip = |reason: String| ScanWarning {
        path: dir.to_path_buf(),
        reason,
    };
    let invalid = |e: CatalogError| match e {
        CatalogError::InvalidDataset { reason, .. } => skip(reason),
        other => skip(other.to_string()),
    };

    let dataset = Dataset::open_with_layout(dir, Some(channel_dir)).map_err(invalid)?;
    let tables = dataset.tables().map_err(invalid)?;

    let mut rows = Vec::with_capacity(tables.len());
    for table in tables {
        let location = relative_location(root, &table.path).ok_or_else(|| {
            skip(format!("cannot address {} from the root", table.path.display()))
        })?;

        let row = IndexRow {
            channel,
            namespace: dataset.namespace().to_string(),
            dataset: dataset.short_name().to_string(),
            version: dataset.version().map(str::to_string),
            table: table.name,
            dimensions: table.dimensions,
            location,
            formats: table.formats,
            size: table.size,
            checksum: None,
        };

        let key = row.key();
        if builder.contains(&key) {
            return Err(skip(format!("table {key} is already indexed")));
        }
        rows.push(row);
    }

    let count = rows.len();
    for row in rows {
        builder
            .push(row)
            .map_err(|key| skip(format!("table {key} is already indexed")))?;
    }

    debug!(
        "Indexed dataset {}/{} ({} tables)",
        dataset.namespace(),
        dataset.short_name(),
        count
    );
    Ok(())
}

/// `/`-separated path of `path` below `root`
fn relative_location(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?.to_string()),
            _ => return None,
        }
    }
    (!parts.is_empty()).then(|| parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::DatasetMetadata;
    use crate::table::{Cell, Table, TableFormat, TableMetadata};
    use tempfile::TempDir;

    async fn write_dataset(dir: &Path, namespace: &str, tables: &[&str]) {
        let metadata = DatasetMetadata {
            namespace: Some(namespace.to_string()),
            ..Default::default()
        };
        let dataset = Dataset::create(dir, metadata).unwrap();
        for name in tables {
            let table = Table::new(
                TableMetadata::new(*name),
                vec!["year".into()],
                vec![vec![Cell::Int(2020)]],
            );
            dataset.add_table(&table, &[TableFormat::Csv]).await.unwrap();
        }
    }

    #[test]
    fn test_relative_location() {
        let root = Path::new("/data/catalog");
        assert_eq!(
            relative_location(root, Path::new("/data/catalog/garden/owid/d/t")),
            Some("garden/owid/d/t".to_string())
        );
        assert_eq!(relative_location(root, Path::new("/elsewhere/t")), None);
        assert_eq!(relative_location(root, root), None);
    }

    #[tokio::test]
    async fn test_scan_orders_rows_and_infers_layout() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let dir = root.join("garden/owid/2024-01-01/key_indicators");
        std::fs::create_dir_all(&dir).unwrap();
        // Namespace and version come from the directory layout
        std::fs::write(dir.join(INDEX_FILE), "{}").unwrap();
        let dataset = Dataset::open_with_layout(&dir, Some(root.join("garden").as_path())).unwrap();
        for name in ["population", "land_area"] {
            let table = Table::new(TableMetadata::new(name), vec!["v".into()], vec![]);
            dataset.add_table(&table, &[TableFormat::Bincode]).await.unwrap();
        }
        write_dataset(&root.join("meadow/un/wpp"), "un", &["population"]).await;

        let report = scan_catalog(root).unwrap();
        assert!(report.warnings.is_empty());

        let rows: Vec<_> = report.frame.iter().collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].table, "land_area");
        assert_eq!(rows[0].version.as_deref(), Some("2024-01-01"));
        assert_eq!(rows[0].namespace, "owid");
        assert_eq!(rows[0].location, "garden/owid/2024-01-01/key_indicators/land_area");
        assert_eq!(rows[1].table, "population");
        assert_eq!(rows[2].channel, Channel::Meadow);
    }

    #[tokio::test]
    async fn test_scan_skips_unknown_directories_and_files() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write_dataset(&root.join("scratch/owid/d"), "owid", &["t"]).await;
        std::fs::write(root.join("garden"), "not a directory").unwrap();

        let report = scan_catalog(root).unwrap();
        assert!(report.frame.is_empty());
        assert!(report.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_dataset_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write_dataset(&root.join("garden/a/population_data"), "owid", &["t"]).await;

        // Same identity via index.json, different directory
        let dir = root.join("garden/b/copy");
        write_dataset(&dir, "owid", &["t"]).await;
        std::fs::write(
            dir.join(INDEX_FILE),
            r#"{"namespace": "owid", "shortName": "population_data"}"#,
        )
        .unwrap();

        let report = scan_catalog(root).unwrap();
        assert_eq!(report.frame.len(), 1);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].path, dir);
        assert!(report.warnings[0].reason.contains("already indexed"));
    }

    #[tokio::test]
    async fn test_reindex_writes_checksums() {
        let temp_dir = TempDir::new().unwrap();
        write_dataset(&temp_dir.path().join("garden/owid/d"), "owid", &["t"]).await;

        let catalog = LocalCatalog::open(temp_dir.path()).await.unwrap();
        let path = catalog.reindex().await.unwrap();
        assert_eq!(path, temp_dir.path().join(INDEX_DOCUMENT));

        let document = IndexDocument::from_json(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(document.tables.len(), 1);

        let body = std::fs::read(temp_dir.path().join("garden/owid/d/t.csv")).unwrap();
        assert_eq!(document.tables[0].checksum, Some(sha256_digest(&body)));
        assert_eq!(document.tables[0].size, Some(body.len() as u64));
    }
}
