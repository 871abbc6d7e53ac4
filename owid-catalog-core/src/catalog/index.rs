//! Catalog index
//!
//! The index is the catalog's in-memory table-of-tables: one [`IndexRow`] per
//! table, in a stable order, with unique [`TableKey`]s. It is published as a
//! `catalog.json` [`IndexDocument`] that remote catalogs fetch.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use super::row::{IndexRow, TableKey};
use crate::channel::Channel;

/// Storage key of the published index document
pub const INDEX_DOCUMENT: &str = "catalog.json";

/// Newest index document layout this crate understands
pub const INDEX_FORMAT_VERSION: u32 = 1;

/// The published form of a catalog index (`catalog.json`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexDocument {
    /// Layout version of this document
    pub format_version: u32,

    /// When the document was generated (RFC 3339)
    #[serde(default)]
    pub generated: Option<String>,

    /// Every table in the catalog
    pub tables: Vec<IndexRow>,
}

impl IndexDocument {
    pub fn new(tables: Vec<IndexRow>) -> Self {
        Self {
            format_version: INDEX_FORMAT_VERSION,
            generated: Some(chrono::Utc::now().to_rfc3339()),
            tables,
        }
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }
}

/// Immutable, ordered collection of index rows
#[derive(Debug, Clone, Default)]
pub struct CatalogFrame {
    rows: Vec<Arc<IndexRow>>,
}

impl CatalogFrame {
    /// Create an empty frame
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a frame, failing with the first duplicated key
    pub fn from_rows(rows: Vec<IndexRow>) -> Result<Self, TableKey> {
        let mut builder = FrameBuilder::default();
        for row in rows {
            builder.push(row)?;
        }
        Ok(builder.finish())
    }

    pub fn builder() -> FrameBuilder {
        FrameBuilder::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&IndexRow> {
        self.rows.get(index).map(|row| row.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &IndexRow> {
        self.rows.iter().map(|row| row.as_ref())
    }

    pub(crate) fn entries(&self) -> &[Arc<IndexRow>] {
        &self.rows
    }

    /// Number of rows per channel
    pub fn channel_counts(&self) -> BTreeMap<Channel, usize> {
        let mut counts = BTreeMap::new();
        for row in self.iter() {
            *counts.entry(row.channel).or_insert(0) += 1;
        }
        counts
    }

    /// Distinct channels present in the index
    pub fn channels(&self) -> BTreeSet<Channel> {
        self.iter().map(|row| row.channel).collect()
    }

    pub fn contains_channel(&self, channel: Channel) -> bool {
        self.iter().any(|row| row.channel == channel)
    }

    /// Distinct namespaces present in the index
    pub fn namespaces(&self) -> BTreeSet<&str> {
        self.iter().map(|row| row.namespace.as_str()).collect()
    }

    /// Distinct dataset names present in the index
    pub fn datasets(&self) -> BTreeSet<&str> {
        self.iter().map(|row| row.dataset.as_str()).collect()
    }

    /// Snapshot the frame as a publishable document
    pub fn to_document(&self) -> IndexDocument {
        IndexDocument::new(self.iter().cloned().collect())
    }
}

/// Accumulates rows while enforcing key uniqueness
#[derive(Debug, Default)]
pub struct FrameBuilder {
    rows: Vec<Arc<IndexRow>>,
    keys: HashSet<TableKey>,
}

impl FrameBuilder {
    pub fn contains(&self, key: &TableKey) -> bool {
        self.keys.contains(key)
    }

    /// Append a row; a key already present is returned as the error
    pub fn push(&mut self, row: IndexRow) -> Result<(), TableKey> {
        let key = row.key();
        if !self.keys.insert(key.clone()) {
            return Err(key);
        }
        self.rows.push(Arc::new(row));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn finish(self) -> CatalogFrame {
        CatalogFrame { rows: self.rows }
    }
}
