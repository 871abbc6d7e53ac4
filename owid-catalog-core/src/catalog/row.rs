//! Index rows: one catalog entry per table

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::channel::Channel;
use crate::table::TableFormat;

/// Version string that unversioned rows are treated as
pub const LATEST_VERSION: &str = "latest";

/// One table known to a catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexRow {
    pub channel: Channel,

    pub namespace: String,

    pub dataset: String,

    /// Dataset revision; absent means "latest"
    #[serde(default)]
    pub version: Option<String>,

    pub table: String,

    /// Dimension columns, empty for flat tables
    #[serde(default)]
    pub dimensions: Vec<String>,

    /// Storage-relative path of the table, without extension
    pub location: String,

    /// Available encodings of the table body
    pub formats: Vec<TableFormat>,

    /// Byte size of the preferred encoding
    #[serde(default)]
    pub size: Option<u64>,

    /// `sha256:<hex>` digest of the preferred encoding
    #[serde(default)]
    pub checksum: Option<String>,
}

impl IndexRow {
    pub fn version_or_latest(&self) -> &str {
        self.version.as_deref().unwrap_or(LATEST_VERSION)
    }

    pub fn key(&self) -> TableKey {
        TableKey::new(
            self.channel,
            &self.namespace,
            &self.dataset,
            self.version.as_deref(),
            &self.table,
        )
    }

    /// The encoding a load of this row reads
    pub fn preferred_format(&self) -> Option<TableFormat> {
        TableFormat::preferred(&self.formats)
    }
}

/// The identity of a table: unique across an index
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TableKey {
    pub channel: Channel,
    pub namespace: String,
    pub dataset: String,
    pub version: String,
    pub table: String,
}

impl TableKey {
    pub fn new(
        channel: Channel,
        namespace: &str,
        dataset: &str,
        version: Option<&str>,
        table: &str,
    ) -> Self {
        Self {
            channel,
            namespace: namespace.to_string(),
            dataset: dataset.to_string(),
            version: version.unwrap_or(LATEST_VERSION).to_string(),
            table: table.to_string(),
        }
    }
}

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}/{}",
            self.channel, self.namespace, self.version, self.dataset, self.table
        )
    }
}
