//! Materialized tables
//!
//! A [`Table`] is what a catalog row turns into once loaded: the table's own
//! metadata (read from its `.meta.json` sidecar) plus the column data decoded
//! from one of its storage encodings.

pub mod codec;
mod store;

pub use codec::CodecError;
pub use store::{sha256_digest, TableStore, METADATA_SUFFIX};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A physical encoding of a table body
///
/// The declaration order is also the load priority: the first format a row
/// offers in this order is the one its accessor reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TableFormat {
    /// bincode-encoded [`TableData`], compact and type-exact
    #[serde(rename = "bin")]
    Bincode,
    /// JSON lines: a header array of column names, then one array per row
    #[serde(rename = "jsonl")]
    JsonLines,
    /// CSV with a header row; cell types are re-inferred on read
    #[serde(rename = "csv")]
    Csv,
}

impl TableFormat {
    /// All formats in load priority order
    pub const PRIORITY: [TableFormat; 3] =
        [TableFormat::Bincode, TableFormat::JsonLines, TableFormat::Csv];

    /// File extension used for this encoding
    pub fn extension(&self) -> &'static str {
        match self {
            TableFormat::Bincode => "bin",
            TableFormat::JsonLines => "jsonl",
            TableFormat::Csv => "csv",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        TableFormat::PRIORITY
            .into_iter()
            .find(|format| format.extension() == ext)
    }

    /// Pick the highest priority format among those available
    pub fn preferred(available: &[TableFormat]) -> Option<TableFormat> {
        TableFormat::PRIORITY
            .into_iter()
            .find(|format| available.contains(format))
    }
}

impl fmt::Display for TableFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for TableFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TableFormat::from_extension(s).ok_or_else(|| {
            format!("Unknown table format '{}'. Valid formats: bin, jsonl, csv", s)
        })
    }
}

static NULL_CELL: Cell = Cell::Null;

/// A single value in a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(i) => Some(*i as f64),
            Cell::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Bool(b) => write!(f, "{b}"),
            Cell::Int(i) => write!(f, "{i}"),
            // Debug keeps a trailing ".0" so floats stay floats in text encodings
            Cell::Float(x) => write!(f, "{x:?}"),
            Cell::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Str(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Str(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Int(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Float(value)
    }
}

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Cell::Bool(value)
    }
}

/// Provenance entry attached to a table or dataset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub name: String,

    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub published_by: Option<String>,
}

/// Table metadata (`<table>.meta.json`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableMetadata {
    /// Table name, unique within its dataset
    pub short_name: String,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// Dimension columns the table is indexed by, in order
    #[serde(default, alias = "primaryKey")]
    pub dimensions: Vec<String>,

    #[serde(default)]
    pub sources: Vec<Source>,
}

impl TableMetadata {
    pub fn new(short_name: impl Into<String>) -> Self {
        Self {
            short_name: short_name.into(),
            ..Default::default()
        }
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }
}

/// Column names plus row-major cell data
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableData {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl TableData {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self { columns, rows }
    }

    /// Every row must have one cell per column
    pub fn check_shape(&self) -> Result<(), String> {
        match self
            .rows
            .iter()
            .position(|row| row.len() != self.columns.len())
        {
            Some(index) => Err(format!(
                "row {} has {} cells but the table has {} columns",
                index,
                self.rows[index].len(),
                self.columns.len()
            )),
            None => Ok(()),
        }
    }
}

/// A fully loaded table
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub metadata: TableMetadata,
    pub data: TableData,
}

impl Table {
    pub fn new(metadata: TableMetadata, columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self {
            metadata,
            data: TableData::new(columns, rows),
        }
    }

    pub fn short_name(&self) -> &str {
        &self.metadata.short_name
    }

    pub fn dimensions(&self) -> &[String] {
        &self.metadata.dimensions
    }

    pub fn columns(&self) -> &[String] {
        &self.data.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.data.rows
    }

    pub fn num_rows(&self) -> usize {
        self.data.rows.len()
    }

    pub fn num_columns(&self) -> usize {
        self.data.columns.len()
    }

    /// Values of one column, top to bottom; short rows read as null
    pub fn column(&self, name: &str) -> Option<Vec<&Cell>> {
        let index = self.data.columns.iter().position(|c| c == name)?;
        Some(
            self.data
                .rows
                .iter()
                .map(|row| row.get(index).unwrap_or(&NULL_CELL))
                .collect(),
        )
    }
}
