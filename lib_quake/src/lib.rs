//! # lib_quake
//!
//! Shared library behind the quakewatch servers: the earthquake record store,
//! the ingestion adapters and loop, the query service and the HTTP router.
//! Each folder is gated behind a cargo feature of the same name.

#[cfg(feature = "configs")]
pub mod configs;
#[cfg(feature = "loggers")]
pub mod loggers;
#[cfg(feature = "store")]
pub mod connections;
#[cfg(feature = "store")]
pub mod store;
#[cfg(feature = "store")]
pub mod query;
#[cfg(feature = "retrieve")]
pub mod retrieve;
#[cfg(feature = "ingestors")]
pub mod ingestors;
#[cfg(feature = "api")]
pub mod api;

// Re-export the types most callers need.
#[cfg(feature = "store")]
pub use store::{NewObservation, Observation, ObservationFilter, RecordStore, StoreError};
#[cfg(feature = "store")]
pub use query::{QueryError, QueryService};
