//! # Earthquake Ingestor
//!
//! Runs the ingestion loop on its own: every `ingest_interval_secs` it pulls a
//! batch from the configured source (local mock file or USGS feed) and inserts
//! the new records into the store. Stops cleanly on Ctrl-C or SIGTERM.
//!
//! Refuses to start with `store_backend = memory`: records written to a
//! process-local table would never reach the API server.

use anyhow::Result;
use lib_quake::configs::load_config;
use lib_quake::ingestors::IngestionLoop;
use lib_quake::loggers::setup_logging;
use tracing::info;

mod quake_logic;
use quake_logic::components::{build_adapter, build_store};
use quake_logic::shutdown::shutdown_token;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = load_config()?;
    settings.require_shared_store()?;
    let _guard = setup_logging(&settings.log_dir, &settings.log_level, "ingest_quake")?;

    let store = build_store(&settings).await?;
    info!(records = store.count().await?, "Record store ready");
    let adapter = build_adapter(&settings)?;
    let shutdown = shutdown_token();

    IngestionLoop::new(adapter, store, settings.ingest_interval)
        .run(shutdown)
        .await;

    info!("Shutdown complete.");
    Ok(())
}
