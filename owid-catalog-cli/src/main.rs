//! owid-catalog - search and load tables from OWID dataset catalogs
//!
//! Works against a local catalog directory (`--local`) or a published remote
//! catalog (the default, or `--url`).

use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use owid_catalog_core::config::CatalogConfig;

mod catalog_cli;

use catalog_cli::{CatalogSource, CatalogSubcommand};

/// Log levels
#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Parser, Debug)]
#[clap(
    name = "owid-catalog",
    about = "Search and load tables from OWID dataset catalogs",
    version
)]
struct Cli {
    #[clap(subcommand)]
    command: CatalogSubcommand,

    /// Set log level
    #[clap(long, default_value = "warn", global = true)]
    log_level: LogLevel,

    /// Emit logs as JSON lines
    #[clap(long, global = true)]
    json_logs: bool,

    /// Override the configuration file path
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// Use the local catalog rooted at this directory
    #[clap(long, global = true, conflicts_with = "url")]
    local: Option<PathBuf>,

    /// Use the remote catalog at this base URL
    #[clap(long, global = true)]
    url: Option<String>,
}

impl Cli {
    fn source(&self) -> CatalogSource {
        match &self.local {
            Some(path) => CatalogSource::Local(path.clone()),
            None => CatalogSource::Remote(self.url.clone()),
        }
    }
}

/// Initialize tracing with CLI flags
///
/// Logs always go to stderr so command output on stdout stays parseable.
fn initialize_tracing(log_level: &LogLevel, json_logs: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_filter_directive()));

    if json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn load_config(path: Option<&Path>) -> Result<CatalogConfig> {
    match path {
        Some(path) => {
            debug!("Loading catalog config from {}", path.display());
            CatalogConfig::load_from_path(path)?.with_env_overrides()
        }
        None => CatalogConfig::load(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    initialize_tracing(&cli.log_level, cli.json_logs);

    let config = load_config(cli.config.as_deref())?;
    let source = cli.source();

    cli.command.execute(source, &config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use owid_catalog_core::Channel;

    #[test]
    fn test_find_with_filters() {
        let cli = Cli::try_parse_from([
            "owid-catalog",
            "find",
            "population",
            "--channel",
            "meadow",
            "--namespace",
            "owid",
            "--local",
            "data",
        ])
        .unwrap();

        assert_eq!(cli.source(), CatalogSource::Local(PathBuf::from("data")));
        match cli.command {
            CatalogSubcommand::Find {
                table,
                filters,
                json,
            } => {
                assert_eq!(table.as_deref(), Some("population"));
                assert_eq!(filters.channel, Some(Channel::Meadow));
                assert_eq!(filters.namespace.as_deref(), Some("owid"));
                assert!(!json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_remote_is_the_default_source() {
        let cli = Cli::try_parse_from(["owid-catalog", "channels"]).unwrap();
        assert_eq!(cli.source(), CatalogSource::Remote(None));

        let cli =
            Cli::try_parse_from(["owid-catalog", "--url", "http://mirror/", "channels"]).unwrap();
        assert_eq!(
            cli.source(),
            CatalogSource::Remote(Some("http://mirror/".to_string()))
        );
    }

    #[test]
    fn test_local_and_url_conflict() {
        let result = Cli::try_parse_from([
            "owid-catalog",
            "channels",
            "--local",
            "data",
            "--url",
            "http://mirror/",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_channel_is_rejected() {
        let result = Cli::try_parse_from(["owid-catalog", "find", "--channel", "orchard"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_show_requires_a_table() {
        assert!(Cli::try_parse_from(["owid-catalog", "show"]).is_err());

        let cli = Cli::try_parse_from(["owid-catalog", "show", "population", "--latest"]).unwrap();
        match cli.command {
            CatalogSubcommand::Show {
                table, latest, rows, ..
            } => {
                assert_eq!(table, "population");
                assert!(latest);
                assert_eq!(rows, 10);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
