//! # Memory Record Store
//!
//! An in-process backend with the same contract as the PostgreSQL one. Used by
//! the test suites and by `store_backend = "memory"` for running the server
//! without a database.

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::model::truncate_to_stored_precision;
use super::{NewObservation, Observation, ObservationFilter, RecordStore, StoreError};

#[derive(Debug, Default)]
struct Table {
    rows: Vec<Observation>,
    last_id: i64,
}

/// Observations kept in a mutex-guarded vector. Ids start at 1 and are never reused.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    table: Mutex<Table>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn insert(&self, new: &NewObservation) -> Result<Observation, StoreError> {
        let mut table = self.table.lock().await;
        let time = truncate_to_stored_precision(new.time);

        let exists = table
            .rows
            .iter()
            .any(|row| row.location == new.location && row.time == time);
        if exists {
            return Err(StoreError::Duplicate {
                location: new.location.clone(),
                time,
            });
        }

        table.last_id += 1;
        let row = NewObservation {
            time,
            ..new.clone()
        }
        .with_id(table.last_id);
        table.rows.push(row.clone());
        Ok(row)
    }

    async fn get_by_id(&self, id: i64) -> Result<Observation, StoreError> {
        let table = self.table.lock().await;
        table
            .rows
            .iter()
            .find(|row| row.id == id)
            .cloned()
            .ok_or(StoreError::NotFound { id })
    }

    async fn list(&self, filter: &ObservationFilter) -> Result<Vec<Observation>, StoreError> {
        let table = self.table.lock().await;

        let mut rows: Vec<Observation> = table
            .rows
            .iter()
            .filter(|row| filter.matches(row))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.time.cmp(&a.time).then(b.id.cmp(&a.id)));

        let offset = usize::try_from(filter.offset).unwrap_or(0);
        let limit = usize::try_from(filter.limit).unwrap_or(0);
        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }

    async fn count(&self) -> Result<i64, StoreError> {
        let table = self.table.lock().await;
        Ok(table.rows.len() as i64)
    }
}
