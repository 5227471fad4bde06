use std::sync::Arc;

use anyhow::{Context, Result};
use lib_quake::configs::{IngestSource, Settings, StoreBackend};
use lib_quake::connections::db_postgres::mask_url_password;
use lib_quake::connections::Database;
use lib_quake::ingestors::{LocalAdapter, SourceAdapter, UsgsAdapter, UsgsOptions};
use lib_quake::store::{MemoryRecordStore, PgRecordStore};
use lib_quake::RecordStore;
use tracing::{info, warn};

/// Connects to PostgreSQL with the configured pool size.
pub async fn connect_database(settings: &Settings) -> Result<Database> {
    let url = settings
        .database_url
        .as_deref()
        .context("database_url is required for the postgres backend")?;
    info!("Connecting to {}", mask_url_password(url));
    let database = Database::new(url, settings.db_max_connections).await?;
    database.ping().await?;
    Ok(database)
}

/// Builds the record store selected by `store_backend`.
pub async fn build_store(settings: &Settings) -> Result<Arc<dyn RecordStore>> {
    match settings.store_backend {
        StoreBackend::Postgres => {
            let database = connect_database(settings).await?;
            Ok(Arc::new(PgRecordStore::new(&database)))
        }
        StoreBackend::Memory => {
            warn!("Using the in-memory record store; records are lost on exit.");
            Ok(Arc::new(MemoryRecordStore::new()))
        }
    }
}

/// Builds the source adapter selected by `ingest_source`.
pub fn build_adapter(settings: &Settings) -> Result<Box<dyn SourceAdapter>> {
    match settings.ingest_source {
        IngestSource::Mock => {
            info!(path = %settings.mock_data_path.display(), "Ingesting from local mock data");
            Ok(Box::new(LocalAdapter::from_file(&settings.mock_data_path)))
        }
        IngestSource::Usgs => {
            info!(url = %settings.usgs_base_url, limit = settings.usgs_limit, "Ingesting from the USGS feed");
            let adapter = UsgsAdapter::new(&UsgsOptions {
                base_url: settings.usgs_base_url.clone(),
                limit: settings.usgs_limit,
                timeout: settings.fetch_timeout,
                max_retries: settings.fetch_max_retries,
            })?;
            Ok(Box::new(adapter))
        }
    }
}
