//! OWID dataset catalog
//!
//! Index, search and lazily load tabular datasets organized as
//! channel → namespace → dataset → table, from a local directory tree or a
//! published remote catalog.
//!
//! ```no_run
//! use owid_catalog_core::{Catalog, LocalCatalog, Query};
//!
//! # async fn example() -> owid_catalog_core::Result<()> {
//! let catalog = LocalCatalog::open("data").await?;
//! let row = catalog.find_one(&Query::for_table("population").with_namespace("owid"))?;
//! let table = row.load().await?;
//! println!("{} rows", table.num_rows());
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod channel;
pub mod config;
pub mod dataset;
pub mod error;
pub mod storage;
pub mod table;

pub use catalog::{
    Catalog, CatalogFrame, CatalogRow, IndexRow, LocalCatalog, MatchSet, Query, RemoteCatalog,
    TableKey,
};
pub use channel::Channel;
pub use config::CatalogConfig;
pub use error::{CatalogError, Result, StorageError};
pub use table::{Cell, Table, TableFormat, TableMetadata};
