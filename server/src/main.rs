mod archive;
mod config;
mod identity;
mod normalize;
mod persistence;
mod registry;
mod service;
mod stats;
mod sync;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use archive::ChessComArchiveClient;
use config::ServerConfig;
use persistence::Stores;
use registry::{JobRegistry, JobStatus};
use service::AppState;
use sync::SyncService;

/// Command-line overrides. Anything not given falls back to the
/// `CHESSLOG_*` environment variables, then to built-in defaults.
#[derive(Debug, Parser)]
#[command(name = "chesslog-server", about = "Chess.com archive sync and stats server")]
struct Args {
    /// Directory holding one SQLite store per user.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Address to listen on.
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Root of the public archive API.
    #[arg(long)]
    archive_base_url: Option<String>,

    /// Write daily-rotated log files here in addition to stdout.
    #[arg(long)]
    log_dir: Option<PathBuf>,

    #[arg(long)]
    fetch_timeout_secs: Option<u64>,

    #[arg(long)]
    max_concurrent_fetches: Option<usize>,

    #[arg(long)]
    insert_batch_size: Option<usize>,
}

impl Args {
    fn apply(self, config: &mut ServerConfig) {
        if let Some(dir) = self.data_dir {
            config.data_dir = dir;
        }
        if let Some(addr) = self.bind {
            config.bind_addr = addr;
        }
        if let Some(url) = self.archive_base_url {
            config.archive_base_url = url;
        }
        if self.log_dir.is_some() {
            config.log_dir = self.log_dir;
        }
        if let Some(secs) = self.fetch_timeout_secs {
            config.sync.fetch_timeout = Duration::from_secs(secs);
        }
        if let Some(n) = self.max_concurrent_fetches.filter(|n| *n > 0) {
            config.sync.max_concurrent_fetches = n;
        }
        if let Some(n) = self.insert_batch_size.filter(|n| *n > 0) {
            config.sync.insert_batch_size = n;
        }
    }
}

/// Stdout logging with span durations, plus an optional rolling file. The
/// returned guard flushes the file writer on drop and must outlive `main`'s
/// work.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).ok();
            let appender = tracing_appender::rolling::daily(dir, "chesslog-server");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true)
                .with_span_events(FmtSpan::CLOSE);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_span_events(FmtSpan::CLOSE))
        .with(file_layer)
        .init();

    guard
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut config = ServerConfig::from_env();
    Args::parse().apply(&mut config);

    let _guard = init_tracing(config.log_dir.as_deref());
    tracing::info!("Starting chesslog server");
    tracing::info!(
        data_dir = %config.data_dir.display(),
        archive_base_url = %config.archive_base_url,
        fetch_timeout = ?config.sync.fetch_timeout,
        max_concurrent_fetches = config.sync.max_concurrent_fetches,
        insert_batch_size = config.sync.insert_batch_size,
        "Configuration loaded"
    );

    let stores = Arc::new(Stores::new(&config.data_dir));
    let registry = Arc::new(JobRegistry::new());
    let discovered = stores
        .discover()
        .await
        .with_context(|| format!("scanning data directory {}", config.data_dir.display()))?;
    for user_id in &discovered {
        registry.set(user_id, JobStatus::Pending).await;
    }
    tracing::info!(users = discovered.len(), "Loaded existing user stores");

    let source = ChessComArchiveClient::new(&config.archive_base_url, config.sync.fetch_timeout)
        .context("building archive client")?;
    let sync = Arc::new(SyncService::new(
        Arc::new(source),
        stores.clone(),
        registry,
        config.sync.clone(),
    ));

    let app = service::router(AppState { sync });
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    stores.close_all().await;
    tracing::info!("Server stopped");
    Ok(())
}
