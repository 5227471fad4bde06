//! # Data Ingestors Module
//!
//! Everything that brings new earthquake observations into the record store.
//! Each source adapter turns a finite batch of raw, partially filled records
//! into normalized [`NewObservation`]s; the ingestion loop drives an adapter on
//! a fixed timer and inserts what it produces.
//!
//! ## Contained Modules:
//! - **`local_mock`**: re-reads a local definition (JSON file or shared list)
//!   on every cycle, so edits are picked up without a restart.
//! - **`usgs_polling`**: queries the USGS GeoJSON feed from a time cursor that
//!   only advances after a successful fetch.
//! - **`ingest_loop`**: the cancellable fetch, insert and sleep cycle.
//!
//! Malformed raw records are dropped by the adapter, logged and counted in
//! [`Batch::rejected`]. They never abort a cycle.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

/// The periodic fetch, insert and sleep cycle.
pub mod ingest_loop;
/// Local mock data adapter with explicit reload.
pub mod local_mock;
/// Remote USGS feed adapter with a time cursor.
pub mod usgs_polling;

use async_trait::async_trait;
use thiserror::Error;

use crate::store::NewObservation;

pub use ingest_loop::{CycleReport, IngestionLoop, LoopState};
pub use local_mock::{LocalAdapter, MockRecord, MockSource};
pub use usgs_polling::{UsgsAdapter, UsgsOptions};

/// The normalized output of one `produce_batch` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    /// Candidates ready for insertion, in source order.
    pub candidates: Vec<NewObservation>,
    /// Raw records dropped during normalization.
    pub rejected: usize,
}

impl Batch {
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// A whole-batch failure. The ingestion loop logs it and treats the cycle as empty.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("failed to read mock data from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse mock data: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("request to {url} failed: {reason}")]
    Fetch { url: String, reason: String },

    #[error("feed answered HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

/// # Source Adapter
///
/// Produces one finite batch of candidates per ingestion cycle. Takes
/// `&mut self` because adapters may carry state between cycles (the USGS
/// cursor).
#[async_trait]
pub trait SourceAdapter: Send {
    /// Short name used in logs.
    fn name(&self) -> &str;

    async fn produce_batch(&mut self) -> Result<Batch, AdapterError>;
}
