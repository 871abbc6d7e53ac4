//! Test helper functions for integration tests
//!
//! Shared across test files using the tests/common/ pattern. Catalog fixtures
//! are built in a temporary directory per test and passed around explicitly.

use anyhow::Result;
use owid_catalog_core::dataset::{Dataset, DatasetMetadata};
use owid_catalog_core::storage::{LocalStorage, Storage};
use owid_catalog_core::{Cell, Table, TableFormat, TableMetadata};
use std::path::Path;
use std::sync::{Arc, Mutex, Once};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Initialize logging for tests (only once per test run)
static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_target(true)
                    .with_level(true),
            )
            .with(tracing_subscriber::filter::EnvFilter::from_default_env())
            .try_init();
    });
}

/// A small country/year table named `name`
pub fn sample_table(name: &str) -> Table {
    let mut metadata = TableMetadata::new(name);
    metadata.title = Some(format!("Sample {name}"));
    metadata.dimensions = vec!["country".to_string(), "year".to_string()];

    Table::new(
        metadata,
        vec!["country".into(), "year".into(), "value".into()],
        vec![
            vec![Cell::from("France"), Cell::Int(2020), Cell::Float(67.39)],
            vec![Cell::from("France"), Cell::Int(2021), Cell::Float(67.75)],
            vec![Cell::from("Chile"), Cell::Int(2021), Cell::Null],
        ],
    )
}

/// Create a dataset at `<root>/<relative>` holding the given tables
///
/// The namespace is written to `index.json`, so `relative` does not need to
/// follow the `<channel>/<namespace>/<version>/<dataset>` layout.
pub async fn create_dataset(
    root: &Path,
    relative: &str,
    namespace: &str,
    tables: &[&str],
) -> Result<Dataset> {
    let metadata = DatasetMetadata {
        namespace: Some(namespace.to_string()),
        ..Default::default()
    };
    let dataset = Dataset::create(&root.join(relative), metadata)?;

    for name in tables {
        dataset
            .add_table(&sample_table(name), &[TableFormat::Bincode, TableFormat::Csv])
            .await?;
    }
    Ok(dataset)
}

/// How the test server answers a request
#[allow(dead_code)]
#[derive(Debug, Clone)]
enum Responder {
    Directory(LocalStorage),
    Status(u16),
}

/// Minimal HTTP/1.1 server on `127.0.0.1:0` for exercising `HttpStorage`
///
/// Records every raw request path; stops when dropped.
#[allow(dead_code)]
pub struct TestServer {
    base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    _task: JoinHandle<()>,
}

#[allow(dead_code)]
impl TestServer {
    /// Serve the files under `root`; anything missing is a 404
    pub async fn serve_dir(root: &Path) -> Result<Self> {
        Self::start(Responder::Directory(LocalStorage::new(root))).await
    }

    /// Answer every request with an empty body and `status`
    pub async fn with_status(status: u16) -> Result<Self> {
        Self::start(Responder::Status(status)).await
    }

    async fn start(responder: Responder) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let base_url = format!("http://{}/", listener.local_addr()?);
        let requests = Arc::new(Mutex::new(Vec::new()));
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let recorded = requests.clone();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    accepted = listener.accept() => {
                        let Ok((stream, _)) = accepted else { break };
                        let responder = responder.clone();
                        let recorded = recorded.clone();
                        tokio::spawn(async move {
                            let _ = respond(stream, responder, recorded).await;
                        });
                    }
                }
            }
        });

        Ok(Self {
            base_url,
            requests,
            shutdown_tx: Some(shutdown_tx),
            _task: task,
        })
    }

    /// Base URL with a trailing slash, e.g. `http://127.0.0.1:40123/`
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Raw (still percent-encoded) request paths, in arrival order
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

#[allow(dead_code)]
async fn respond(
    mut stream: TcpStream,
    responder: Responder,
    requests: Arc<Mutex<Vec<String>>>,
) -> std::io::Result<()> {
    let mut head = Vec::new();
    let mut chunk = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        head.extend_from_slice(&chunk[..n]);
    }

    let head = String::from_utf8_lossy(&head);
    let path = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();
    requests.lock().unwrap().push(path.clone());

    let (status, body) = match responder {
        Responder::Status(status) => (status, Vec::new()),
        Responder::Directory(storage) => {
            let key = urlencoding::decode(path.trim_start_matches('/'))
                .map(|key| key.into_owned())
                .unwrap_or_default();
            match storage.read(&key).await {
                Ok(bytes) => (200, bytes),
                Err(_) => (404, Vec::new()),
            }
        }
    };

    let reason = match status {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Unknown",
    };
    let header = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );
    stream.write_all(header.as_bytes()).await?;
    stream.write_all(&body).await?;
    stream.shutdown().await
}
