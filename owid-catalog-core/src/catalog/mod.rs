//! Dataset catalogs - index building, search and lazy table loading
//!
//! A catalog is an index over tabular datasets organized as
//! channel → namespace → dataset → table. Searching only touches the index;
//! table bodies are read when a matched row is loaded.
//!
//! # Architecture
//!
//! ```text
//! LocalCatalog                    RemoteCatalog
//!   scan <root>/<channel>/...       GET <url>/catalog.json
//!            │                               │
//!            └──────────► CatalogFrame ◄─────┘
//!                              │
//!                     find / find_one / find_latest
//!                              │
//!                          MatchSet
//!                              │
//!                   CatalogRow::load() ──► TableStore ──► Storage
//! ```
//!
//! Both catalog kinds implement [`Catalog`]; search and loading never depend
//! on where the index came from.

mod index;
mod local;
mod matches;
mod remote;
mod row;
mod search;

use std::sync::Arc;

pub use index::{CatalogFrame, FrameBuilder, IndexDocument, INDEX_DOCUMENT, INDEX_FORMAT_VERSION};
pub use local::{scan_catalog, LocalCatalog, ScanReport, ScanWarning};
pub use matches::{CatalogRow, MatchSet};
pub use remote::RemoteCatalog;
pub use row::{IndexRow, TableKey, LATEST_VERSION};
pub use search::{channel_scope, Query};

use crate::channel::Channel;
use crate::error::Result;
use crate::table::TableStore;

/// Common interface of local and remote catalogs
pub trait Catalog: Send + Sync {
    /// The immutable index built at construction
    fn frame(&self) -> &CatalogFrame;

    /// Store that matched rows load their tables through
    fn table_store(&self) -> &Arc<TableStore>;

    /// Channels searched when a query names none
    fn default_channels(&self) -> &[Channel];

    /// Every row matching `query`, in index order
    fn find(&self, query: &Query) -> MatchSet {
        let rows = search::search(self.frame(), query, self.default_channels());
        MatchSet::new(rows, self.table_store())
    }

    /// The single row matching `query`
    ///
    /// Fails with `NoMatchFound` or `AmbiguousMatch` otherwise.
    fn find_one(&self, query: &Query) -> Result<CatalogRow> {
        let rows = search::search(self.frame(), query, self.default_channels());
        let row = search::select_one(query, rows)?;
        Ok(CatalogRow::new(row, Arc::clone(self.table_store())))
    }

    /// The matching row with the newest version
    fn find_latest(&self, query: &Query) -> Result<CatalogRow> {
        let rows = search::search(self.frame(), query, self.default_channels());
        let row = search::select_latest(query, rows)?;
        Ok(CatalogRow::new(row, Arc::clone(self.table_store())))
    }

    /// Number of tables in the index
    fn len(&self) -> usize {
        self.frame().len()
    }

    fn is_empty(&self) -> bool {
        self.frame().is_empty()
    }
}
