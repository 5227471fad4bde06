//! # Record Store
//!
//! The durable table of earthquake observations and the contract every
//! backend honors. The store is the only resource shared between the request
//! handlers and the ingestion loop; each operation is its own atomic unit.
//!
//! ## Contained Modules:
//! - **`model`**: `Observation`, `NewObservation` and timestamp normalization.
//! - **`memory`**: an in-process backend used by tests and the demo mode.
//! - **`postgres`**: the production backend on `sqlx`, with the parameterized
//!   list query builder.
//!
//! ## Invariants:
//! - `(location, time)` is unique. A second insert of the same pair fails with
//!   [`StoreError::Duplicate`] and changes nothing.
//! - `list` orders by `time DESC, id DESC` and applies all supplied bounds
//!   conjunctively before `offset` and `limit`.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

pub mod memory;
pub mod model;
pub mod postgres;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use thiserror::Error;

pub use memory::MemoryRecordStore;
pub use model::{NewObservation, Observation};
pub use postgres::PgRecordStore;

/// Default page size of list queries.
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Errors surfaced by a record store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("earthquake {id} not found")]
    NotFound { id: i64 },

    #[error("earthquake at {location} on {time} already exists")]
    Duplicate { location: String, time: NaiveDateTime },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, StoreError::Duplicate { .. })
    }
}

/// Bounds and paging of a list query. Absent bounds impose no constraint.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationFilter {
    pub min_magnitude: Option<f64>,
    pub start_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for ObservationFilter {
    fn default() -> Self {
        Self {
            min_magnitude: None,
            start_time: None,
            end_time: None,
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

impl ObservationFilter {
    /// Whether `obs` satisfies every supplied bound. Paging is not considered.
    pub fn matches(&self, obs: &Observation) -> bool {
        self.min_magnitude.is_none_or(|min| obs.magnitude >= min)
            && self.start_time.is_none_or(|start| obs.time >= start)
            && self.end_time.is_none_or(|end| obs.time <= end)
    }
}

/// # Record Store Contract
///
/// Implemented by [`PgRecordStore`] and [`MemoryRecordStore`]. Callers hold it
/// as `Arc<dyn RecordStore>` so the API layer and the ingestion loop do not
/// care which backend is configured.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persists a new observation and returns it with its assigned id.
    ///
    /// Either the full row is persisted or nothing is. A `(location, time)`
    /// collision yields [`StoreError::Duplicate`].
    async fn insert(&self, new: &NewObservation) -> Result<Observation, StoreError>;

    /// Point lookup by surrogate id.
    async fn get_by_id(&self, id: i64) -> Result<Observation, StoreError>;

    /// Filtered, ordered, paginated scan.
    async fn list(&self, filter: &ObservationFilter) -> Result<Vec<Observation>, StoreError>;

    /// Number of stored observations.
    async fn count(&self) -> Result<i64, StoreError>;
}
