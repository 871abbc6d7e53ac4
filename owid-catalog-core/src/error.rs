//! Catalog error types
//!
//! Every failure a caller may want to branch on has its own variant, so
//! "missing" vs "ambiguous" vs "unreachable" can be told apart without
//! string matching.

use std::path::PathBuf;
use thiserror::Error;

use crate::catalog::TableKey;

/// Errors raised while building, searching, or loading from a catalog
#[derive(Error, Debug)]
pub enum CatalogError {
    /// The local catalog root does not exist or is not a directory
    #[error("Catalog not found at {}", .path.display())]
    CatalogNotFound { path: PathBuf },

    /// The remote index document could not be fetched or parsed
    #[error("Catalog at {location} is unavailable: {reason}")]
    CatalogUnavailable { location: String, reason: String },

    /// `find_one` matched nothing
    #[error("No table found matching {query}")]
    NoMatchFound { query: String },

    /// `find_one` matched more than one table
    #[error(
        "Query {query} is ambiguous, {} tables match:\n  {}",
        .candidates.len(),
        format_candidates(.candidates)
    )]
    AmbiguousMatch {
        query: String,
        candidates: Vec<TableKey>,
    },

    /// A dataset directory is missing metadata or is malformed
    #[error("Invalid dataset at {}: {reason}", .path.display())]
    InvalidDataset { path: PathBuf, reason: String },

    /// Reading or decoding a table body failed
    #[error("Failed to load table {location}: {reason}")]
    TableLoad { location: String, reason: String },

    /// Encoding or writing a table body failed
    #[error("Failed to write table {location}: {reason}")]
    TableWrite { location: String, reason: String },

    /// Writing the published index document failed
    #[error("Failed to write catalog index to {}: {reason}", .path.display())]
    IndexWrite { path: PathBuf, reason: String },
}

impl CatalogError {
    /// Search-time failures the caller can recover from by narrowing the query
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CatalogError::NoMatchFound { .. } | CatalogError::AmbiguousMatch { .. }
        )
    }

    pub(crate) fn invalid_dataset(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        CatalogError::InvalidDataset {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn table_load(location: &str, reason: impl ToString) -> Self {
        CatalogError::TableLoad {
            location: location.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn table_write(location: &str, reason: impl ToString) -> Self {
        CatalogError::TableWrite {
            location: location.to_string(),
            reason: reason.to_string(),
        }
    }
}

fn format_candidates(candidates: &[TableKey]) -> String {
    candidates
        .iter()
        .map(|key| key.to_string())
        .collect::<Vec<_>>()
        .join("\n  ")
}

/// Errors from a storage backend
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Object not found: {key}")]
    NotFound { key: String },

    #[error("I/O error on {key}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP {status} from {url}")]
    Http { url: String, status: u16 },

    #[error("Request to {url} failed")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Storage is read-only, cannot write {key}")]
    ReadOnly { key: String },

    #[error("Invalid storage URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        match self {
            StorageError::NotFound { .. } => true,
            StorageError::Http { status, .. } => *status == 404,
            _ => false,
        }
    }
}

/// Render an error with its full source chain on one line
pub(crate) fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

pub type Result<T, E = CatalogError> = std::result::Result<T, E>;
