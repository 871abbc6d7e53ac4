//! Search results and lazy table access

use futures::future::try_join_all;
use std::collections::BTreeSet;
use std::ops::Deref;
use std::sync::Arc;
use tracing::debug;

use super::row::{IndexRow, TableKey};
use crate::channel::Channel;
use crate::error::{CatalogError, Result};
use crate::table::{Table, TableFormat, TableStore};

/// A matched index row that can load its table on demand
///
/// Holds a shared reference to the index entry and to the catalog's table
/// store, never the table body. Every [`CatalogRow::load`] reads storage
/// again.
#[derive(Debug, Clone)]
pub struct CatalogRow {
    entry: Arc<IndexRow>,
    store: Arc<TableStore>,
}

impl CatalogRow {
    pub(crate) fn new(entry: Arc<IndexRow>, store: Arc<TableStore>) -> Self {
        Self { entry, store }
    }

    pub fn entry(&self) -> &IndexRow {
        &self.entry
    }

    pub fn key(&self) -> TableKey {
        self.entry.key()
    }

    /// The encoding [`CatalogRow::load`] reads
    pub fn format(&self) -> Option<TableFormat> {
        self.entry.preferred_format()
    }

    /// Read and decode the table this row points to
    pub async fn load(&self) -> Result<Table> {
        let format = self.format().ok_or_else(|| {
            CatalogError::table_load(&self.entry.location, "row lists no storage formats")
        })?;

        debug!("Loading {} ({})", self.entry.key(), format);
        self.store
            .load_verified(&self.entry.location, format, self.entry.checksum.as_deref())
            .await
    }
}

impl Deref for CatalogRow {
    type Target = IndexRow;

    fn deref(&self) -> &IndexRow {
        &self.entry
    }
}

/// The rows matched by one search, in index order
#[derive(Debug, Clone, Default)]
pub struct MatchSet {
    rows: Vec<CatalogRow>,
}

impl MatchSet {
    pub(crate) fn new(entries: Vec<Arc<IndexRow>>, store: &Arc<TableStore>) -> Self {
        Self {
            rows: entries
                .into_iter()
                .map(|entry| CatalogRow::new(entry, Arc::clone(store)))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&CatalogRow> {
        self.rows.get(index)
    }

    pub fn first(&self) -> Option<&CatalogRow> {
        self.rows.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CatalogRow> {
        self.rows.iter()
    }

    /// Distinct channels among the matches
    pub fn channels(&self) -> BTreeSet<Channel> {
        self.rows.iter().map(|row| row.channel).collect()
    }

    /// Distinct dataset names among the matches
    pub fn datasets(&self) -> BTreeSet<String> {
        self.rows.iter().map(|row| row.dataset.clone()).collect()
    }

    pub fn keys(&self) -> Vec<TableKey> {
        self.rows.iter().map(CatalogRow::key).collect()
    }

    /// Load every matched table concurrently; fails on the first error
    pub async fn load_all(&self) -> Result<Vec<Table>> {
        try_join_all(self.rows.iter().map(CatalogRow::load)).await
    }
}

impl IntoIterator for MatchSet {
    type Item = CatalogRow;
    type IntoIter = std::vec::IntoIter<CatalogRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a MatchSet {
    type Item = &'a CatalogRow;
    type IntoIter = std::slice::Iter<'a, CatalogRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
