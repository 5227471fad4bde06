//! # Local Mock Ingestor
//!
//! Feeds the ingestion loop from a local definition of candidate records.
//! The definition is re-read through [`LocalAdapter::reload`] on every
//! `produce_batch` call and never cached, so a file edited (or a shared list
//! mutated) between cycles is picked up without restarting the process.
//! Re-offering the same records every cycle is expected; the store's
//! `(location, time)` constraint turns repeats into counted duplicates.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::{AdapterError, Batch, SourceAdapter};
use crate::store::model::parse_timestamp;
use crate::store::NewObservation;

/// One raw mock record. Every field is optional on the wire; missing ones are
/// caught during normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MockRecord {
    pub location: Option<String>,
    pub magnitude: Option<f64>,
    pub depth: Option<f64>,
    /// ISO-8601 naive datetime, RFC 3339 or bare date.
    pub time: Option<String>,
}

impl MockRecord {
    pub fn normalize(&self) -> Result<NewObservation, String> {
        let location = self.location.clone().ok_or("missing location")?;
        let magnitude = self.magnitude.ok_or("missing magnitude")?;
        let depth = self.depth.ok_or("missing depth")?;
        let raw_time = self.time.as_deref().ok_or("missing time")?;
        let time = parse_timestamp(raw_time).ok_or_else(|| format!("unparseable time `{raw_time}`"))?;

        let candidate = NewObservation {
            location,
            magnitude,
            depth,
            time,
        };
        candidate.validate()?;
        Ok(candidate)
    }
}

/// Where the mock definition lives.
#[derive(Debug, Clone)]
pub enum MockSource {
    /// A JSON array of [`MockRecord`]s on disk.
    File(PathBuf),
    /// A list owned elsewhere and editable between cycles through the shared handle.
    Shared(Arc<RwLock<Vec<MockRecord>>>),
}

/// Adapter over a [`MockSource`].
pub struct LocalAdapter {
    source: MockSource,
}

impl LocalAdapter {
    pub fn new(source: MockSource) -> Self {
        Self { source }
    }

    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self::new(MockSource::File(path.into()))
    }

    /// Reads the current definition from its source of truth.
    pub async fn reload(&self) -> Result<Vec<MockRecord>, AdapterError> {
        match &self.source {
            MockSource::File(path) => {
                let raw = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|source| AdapterError::Io {
                        path: path.display().to_string(),
                        source,
                    })?;
                Ok(serde_json::from_str(&raw)?)
            }
            MockSource::Shared(records) => Ok(records.read().await.clone()),
        }
    }
}

/// Normalizes raw records, dropping and logging the malformed ones.
pub fn normalize_records(source: &str, records: &[MockRecord]) -> Batch {
    let mut batch = Batch::default();
    for (index, record) in records.iter().enumerate() {
        match record.normalize() {
            Ok(candidate) => batch.candidates.push(candidate),
            Err(reason) => {
                warn!(source, index, %reason, "dropping malformed mock record");
                batch.rejected += 1;
            }
        }
    }
    batch
}

#[async_trait]
impl SourceAdapter for LocalAdapter {
    fn name(&self) -> &str {
        "mock"
    }

    async fn produce_batch(&mut self) -> Result<Batch, AdapterError> {
        let records = self.reload().await?;
        debug!(count = records.len(), "reloaded mock definition");
        Ok(normalize_records(self.name(), &records))
    }
}
