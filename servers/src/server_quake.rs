//! # Earthquake API Server
//!
//! Serves the earthquake observation API over HTTP.
//!
//! ## Key Features:
//! - **Record Store**: PostgreSQL through `sqlx`, or an in-memory table for demos
//!   (`--store-backend memory`).
//! - **HTTP API**: list, fetch and create endpoints plus `/health/`, every request
//!   logged with its status and latency.
//! - **In-process Ingestion**: `--with-ingest` also runs the ingestion loop on
//!   the same store, from local mock data or the USGS feed.
//! - **Graceful Shutdown**: Ctrl-C or SIGTERM stops accepting connections,
//!   lets in-flight requests and the current ingestion cycle finish, then exits.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use lib_quake::api::router;
use lib_quake::configs::load_config;
use lib_quake::ingestors::IngestionLoop;
use lib_quake::loggers::setup_logging;
use lib_quake::QueryService;
use tokio::net::TcpListener;
use tracing::info;

mod quake_logic;
use quake_logic::components::{build_adapter, build_store};
use quake_logic::shutdown::shutdown_token;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = load_config()?;
    let _guard = setup_logging(&settings.log_dir, &settings.log_level, "server_quake")?;
    if let Some(path) = &settings.config_file {
        info!("Configuration file applied: {}", path.display());
    }

    let store = build_store(&settings).await?;
    info!(records = store.count().await?, "Record store ready");
    let shutdown = shutdown_token();

    let ingest_handle = if settings.with_ingest {
        let adapter = build_adapter(&settings)?;
        let ingest = IngestionLoop::new(adapter, store.clone(), settings.ingest_interval);
        Some(tokio::spawn(ingest.run(shutdown.clone())))
    } else {
        None
    };

    let app = router(QueryService::new(store));

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Starting HTTP server on http://{}", addr);

    let stop = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { stop.cancelled().await })
        .await?;

    // The server can also stop on its own; make sure the loop follows.
    shutdown.cancel();
    if let Some(handle) = ingest_handle {
        handle.await.context("ingestion task panicked")?;
    }

    info!("Shutdown complete.");
    Ok(())
}
