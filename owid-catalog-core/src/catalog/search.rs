//! Index search
//!
//! Queries are conjunctions of exact, case-sensitive field matches. When a
//! query names no channel it is restricted to the catalog's default channels,
//! so staging copies of a dataset in other channels stay out of the way.

use std::fmt;
use std::sync::Arc;
use tracing::debug;

use super::index::CatalogFrame;
use super::row::{IndexRow, LATEST_VERSION};
use crate::channel::Channel;
use crate::error::{CatalogError, Result};

/// A partially specified table identity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub channel: Option<Channel>,
    pub namespace: Option<String>,
    pub dataset: Option<String>,
    pub version: Option<String>,
    pub table: Option<String>,
}

impl Query {
    /// A query matching everything (in the default channels)
    pub fn new() -> Self {
        Self::default()
    }

    /// A query for a table by name
    pub fn for_table(table: impl Into<String>) -> Self {
        Self::new().with_table(table)
    }

    pub fn with_channel(mut self, channel: Channel) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_dataset(mut self, dataset: impl Into<String>) -> Self {
        self.dataset = Some(dataset.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// True when the row satisfies every field this query sets
    pub fn matches(&self, row: &IndexRow) -> bool {
        self.channel.map_or(true, |c| row.channel == c)
            && field_matches(&self.namespace, &row.namespace)
            && field_matches(&self.dataset, &row.dataset)
            && field_matches(&self.version, row.version_or_latest())
            && field_matches(&self.table, &row.table)
    }
}

fn field_matches(wanted: &Option<String>, actual: &str) -> bool {
    wanted.as_deref().map_or(true, |w| w == actual)
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(channel) = self.channel {
            parts.push(format!("channel={channel}"));
        }
        for (name, value) in [
            ("namespace", &self.namespace),
            ("dataset", &self.dataset),
            ("version", &self.version),
            ("table", &self.table),
        ] {
            if let Some(value) = value {
                parts.push(format!("{name}={value}"));
            }
        }

        if parts.is_empty() {
            f.write_str("(all tables)")
        } else {
            write!(f, "({})", parts.join(", "))
        }
    }
}

/// Channels a query is restricted to, or `None` for no restriction
///
/// An explicit channel always wins. Otherwise the default channels apply,
/// unless the index holds no rows in any of them.
pub fn channel_scope(
    frame: &CatalogFrame,
    query: &Query,
    default_channels: &[Channel],
) -> Option<Vec<Channel>> {
    if let Some(channel) = query.channel {
        return Some(vec![channel]);
    }

    let present: Vec<Channel> = default_channels
        .iter()
        .copied()
        .filter(|c| frame.contains_channel(*c))
        .collect();

    if present.is_empty() {
        debug!(
            "No rows in default channels {:?}, searching all channels",
            default_channels
        );
        None
    } else {
        Some(present)
    }
}

/// Filter the frame, keeping index order
pub fn search(
    frame: &CatalogFrame,
    query: &Query,
    default_channels: &[Channel],
) -> Vec<Arc<IndexRow>> {
    let scope = channel_scope(frame, query, default_channels);

    let matches: Vec<Arc<IndexRow>> = frame
        .entries()
        .iter()
        .filter(|row| scope.as_ref().map_or(true, |s| s.contains(&row.channel)))
        .filter(|row| query.matches(row))
        .cloned()
        .collect();

    debug!("Query {} matched {} rows", query, matches.len());
    matches
}

/// Require exactly one match
pub fn select_one(query: &Query, mut matches: Vec<Arc<IndexRow>>) -> Result<Arc<IndexRow>> {
    match matches.len() {
        0 => Err(CatalogError::NoMatchFound {
            query: query.to_string(),
        }),
        1 => Ok(matches.remove(0)),
        _ => Err(CatalogError::AmbiguousMatch {
            query: query.to_string(),
            candidates: matches.iter().map(|row| row.key()).collect(),
        }),
    }
}

/// Pick the match with the newest version
///
/// Versions compare as strings, so ISO dates order correctly; `latest` (and
/// unversioned rows) rank above any dated version. Several different tables
/// sharing the newest version are ambiguous.
pub fn select_latest(query: &Query, matches: Vec<Arc<IndexRow>>) -> Result<Arc<IndexRow>> {
    let (newest_is_latest, newest) = matches
        .iter()
        .map(|row| version_rank(row))
        .max()
        .map(|(is_latest, version)| (is_latest, version.to_string()))
        .ok_or_else(|| CatalogError::NoMatchFound {
            query: query.to_string(),
        })?;

    let candidates: Vec<Arc<IndexRow>> = matches
        .into_iter()
        .filter(|row| version_rank(row) == (newest_is_latest, newest.as_str()))
        .collect();

    select_one(query, candidates)
}

fn version_rank(row: &IndexRow) -> (bool, &str) {
    let version = row.version_or_latest();
    (version == LATEST_VERSION, version)
}
