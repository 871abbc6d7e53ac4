//! Catalog CLI commands
//!
//! Search an index, print a table, publish a local tree and summarize
//! channels, against either a local directory or a remote catalog.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use std::path::{Path, PathBuf};
use tabled::{
    builder::Builder,
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};
use tracing::{info, warn};

use owid_catalog_core::config::CatalogConfig;
use owid_catalog_core::{Catalog, Cell, Channel, IndexRow, LocalCatalog, Query, RemoteCatalog};

/// Where the catalog index comes from
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogSource {
    Local(PathBuf),
    Remote(Option<String>),
}

/// Filters shared by the search commands
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Restrict to one channel (default: the configured default channels)
    #[clap(long)]
    pub channel: Option<Channel>,

    /// Data provider or subject area
    #[clap(long)]
    pub namespace: Option<String>,

    /// Dataset short name
    #[clap(long)]
    pub dataset: Option<String>,

    /// Dataset version (e.g. 2024-01-01, or "latest")
    #[clap(long)]
    pub version: Option<String>,
}

impl FilterArgs {
    fn to_query(&self, table: Option<&str>) -> Query {
        Query {
            channel: self.channel,
            namespace: self.namespace.clone(),
            dataset: self.dataset.clone(),
            version: self.version.clone(),
            table: table.map(str::to_string),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum CatalogSubcommand {
    /// Search the catalog index
    Find {
        /// Table name
        table: Option<String>,

        #[clap(flatten)]
        filters: FilterArgs,

        /// Output results as JSON
        #[clap(long)]
        json: bool,
    },

    /// Load a single table and print its metadata and first rows
    Show {
        /// Table name
        table: String,

        #[clap(flatten)]
        filters: FilterArgs,

        /// Pick the newest version instead of requiring a unique match
        #[clap(long)]
        latest: bool,

        /// Number of rows to print
        #[clap(long, default_value_t = 10)]
        rows: usize,

        /// Output as JSON
        #[clap(long)]
        json: bool,
    },

    /// Write catalog.json for a local catalog so it can be served remotely
    Reindex {
        /// Catalog root directory
        path: PathBuf,
    },

    /// Show how many tables each channel holds
    Channels {
        /// Output as JSON
        #[clap(long)]
        json: bool,
    },
}

impl CatalogSubcommand {
    pub async fn execute(self, source: CatalogSource, config: &CatalogConfig) -> Result<()> {
        match self {
            CatalogSubcommand::Find {
                table,
                filters,
                json,
            } => {
                let catalog = open_catalog(&source, config).await?;
                execute_find(catalog.as_ref(), &filters.to_query(table.as_deref()), json)
            }
            CatalogSubcommand::Show {
                table,
                filters,
                latest,
                rows,
                json,
            } => {
                let catalog = open_catalog(&source, config).await?;
                let query = filters.to_query(Some(table.as_str()));
                execute_show(catalog.as_ref(), &query, latest, rows, json).await
            }
            CatalogSubcommand::Reindex { path } => execute_reindex(&path, config).await,
            CatalogSubcommand::Channels { json } => {
                let catalog = open_catalog(&source, config).await?;
                execute_channels(catalog.as_ref(), json)
            }
        }
    }
}

async fn open_catalog(source: &CatalogSource, config: &CatalogConfig) -> Result<Box<dyn Catalog>> {
    match source {
        CatalogSource::Local(path) => {
            let catalog = LocalCatalog::open_with_config(path, config).await?;
            for warning in catalog.warnings() {
                warn!("Skipped {}: {}", warning.path.display(), warning.reason);
            }
            Ok(Box::new(catalog))
        }
        CatalogSource::Remote(url) => {
            let mut config = config.clone();
            if let Some(url) = url {
                config.remote.url = url.clone();
            }
            info!("Fetching catalog index from {}", config.remote.url);
            Ok(Box::new(RemoteCatalog::open_with_config(&config).await?))
        }
    }
}

/// Table row for search results
#[derive(Tabled)]
struct FindResultRow {
    #[tabled(rename = "Channel")]
    channel: String,
    #[tabled(rename = "Namespace")]
    namespace: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Dataset")]
    dataset: String,
    #[tabled(rename = "Table")]
    table: String,
    #[tabled(rename = "Dimensions")]
    dimensions: String,
    #[tabled(rename = "Formats")]
    formats: String,
}

impl From<&IndexRow> for FindResultRow {
    fn from(row: &IndexRow) -> Self {
        Self {
            channel: row.channel.to_string(),
            namespace: row.namespace.clone(),
            version: row.version_or_latest().to_string(),
            dataset: row.dataset.clone(),
            table: row.table.clone(),
            dimensions: join_or_dash(&row.dimensions),
            formats: row
                .formats
                .iter()
                .map(|f| f.to_string())
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

fn execute_find(catalog: &dyn Catalog, query: &Query, json_output: bool) -> Result<()> {
    let matches = catalog.find(query);

    if json_output {
        let rows: Vec<&IndexRow> = matches.iter().map(|row| row.entry()).collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if matches.is_empty() {
        println!("No tables found matching {query}.");
        return Ok(());
    }

    let table_rows: Vec<FindResultRow> = matches
        .iter()
        .map(|row| FindResultRow::from(row.entry()))
        .collect();

    let table = Table::new(&table_rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()))
        .to_string();

    println!("Found {} table(s):\n", matches.len());
    println!("{table}");
    Ok(())
}

async fn execute_show(
    catalog: &dyn Catalog,
    query: &Query,
    latest: bool,
    max_rows: usize,
    json_output: bool,
) -> Result<()> {
    let row = if latest {
        catalog.find_latest(query)?
    } else {
        catalog.find_one(query)?
    };
    let table = row
        .load()
        .await
        .with_context(|| format!("Failed to load {}", row.key()))?;

    if json_output {
        let rows: Vec<Vec<serde_json::Value>> = table
            .rows()
            .iter()
            .take(max_rows)
            .map(|cells| cells.iter().map(cell_to_json).collect())
            .collect();
        let output = serde_json::json!({
            "key": row.key().to_string(),
            "location": row.location,
            "metadata": table.metadata,
            "columns": table.columns(),
            "numRows": table.num_rows(),
            "rows": rows,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!();
    println!("Table:      {}", row.key());
    if let Some(title) = &table.metadata.title {
        println!("Title:      {title}");
    }
    println!("Dimensions: {}", join_or_dash(table.dimensions()));
    println!("Shape:      {} rows x {} columns", table.num_rows(), table.num_columns());

    if let Some(description) = &table.metadata.description {
        println!();
        println!("Description:");
        for line in description.lines() {
            println!("  {line}");
        }
    }

    if !table.metadata.sources.is_empty() {
        println!();
        println!("Sources:");
        for source in &table.metadata.sources {
            match &source.url {
                Some(url) => println!("  {} ({url})", source.name),
                None => println!("  {}", source.name),
            }
        }
    }

    let mut builder = Builder::default();
    builder.push_record(table.columns().iter().cloned());
    for cells in table.rows().iter().take(max_rows) {
        builder.push_record(cells.iter().map(|cell| cell.to_string()));
    }
    let preview = builder.build().with(Style::rounded()).to_string();

    println!();
    println!("{preview}");
    if table.num_rows() > max_rows {
        println!("  ... and {} more rows", table.num_rows() - max_rows);
    }

    Ok(())
}

async fn execute_reindex(path: &Path, config: &CatalogConfig) -> Result<()> {
    let catalog = LocalCatalog::open_with_config(path, config).await?;

    for warning in catalog.warnings() {
        println!("Skipped {}: {}", warning.path.display(), warning.reason);
    }

    let written = catalog.reindex().await?;
    println!("Indexed {} table(s) into {}", catalog.len(), written.display());
    Ok(())
}

/// Table row for the channel summary
#[derive(Tabled)]
struct ChannelRow {
    #[tabled(rename = "Channel")]
    channel: String,
    #[tabled(rename = "Tables")]
    tables: usize,
    #[tabled(rename = "Default")]
    default: String,
}

fn execute_channels(catalog: &dyn Catalog, json_output: bool) -> Result<()> {
    let frame = catalog.frame();
    let counts = frame.channel_counts();

    if json_output {
        let output: serde_json::Map<String, serde_json::Value> = counts
            .iter()
            .map(|(channel, count)| (channel.to_string(), serde_json::json!(count)))
            .collect();
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if counts.is_empty() {
        println!("The catalog is empty.");
        return Ok(());
    }

    let table_rows: Vec<ChannelRow> = counts
        .iter()
        .map(|(channel, count)| ChannelRow {
            channel: channel.to_string(),
            tables: *count,
            default: if catalog.default_channels().contains(channel) {
                "yes".to_string()
            } else {
                String::new()
            },
        })
        .collect();

    let table = Table::new(&table_rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()))
        .to_string();

    println!("{table}");
    println!(
        "\n{} namespace(s), {} dataset(s)",
        frame.namespaces().len(),
        frame.datasets().len()
    );
    Ok(())
}

fn cell_to_json(cell: &Cell) -> serde_json::Value {
    match cell {
        Cell::Null => serde_json::Value::Null,
        Cell::Bool(b) => serde_json::json!(b),
        Cell::Int(i) => serde_json::json!(i),
        Cell::Float(f) => serde_json::json!(f),
        Cell::Str(s) => serde_json::json!(s),
    }
}

fn join_or_dash(values: &[String]) -> String {
    if values.is_empty() {
        "-".to_string()
    } else {
        values.join(", ")
    }
}
