//! # PostgreSQL Record Store
//!
//! The production backend. Every operation is a single statement, so each one
//! commits atomically on its own. List filters are assembled with
//! `sqlx::QueryBuilder::push_bind`: caller values only ever travel as bind
//! parameters, never as SQL text.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::debug;

use super::model::truncate_to_stored_precision;
use super::{NewObservation, Observation, ObservationFilter, RecordStore, StoreError};
use crate::connections::Database;

const SELECT_COLUMNS: &str = "SELECT id, location, magnitude, depth, time FROM earthquakes";

/// Record store backed by the `earthquakes` table.
#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(database: &Database) -> Self {
        Self {
            pool: database.pool.clone(),
        }
    }
}

/// Builds the list query for `filter`.
///
/// Resulting shape, with only the supplied bounds present:
/// `SELECT … WHERE 1=1 AND magnitude >= $1 AND time >= $2 AND time <= $3
///  ORDER BY time DESC, id DESC LIMIT $4 OFFSET $5`
pub fn build_list_query(filter: &ObservationFilter) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(SELECT_COLUMNS);
    builder.push(" WHERE 1=1");

    if let Some(min_magnitude) = filter.min_magnitude {
        builder.push(" AND magnitude >= ").push_bind(min_magnitude);
    }
    if let Some(start_time) = filter.start_time {
        builder.push(" AND time >= ").push_bind(start_time);
    }
    if let Some(end_time) = filter.end_time {
        builder.push(" AND time <= ").push_bind(end_time);
    }

    builder
        .push(" ORDER BY time DESC, id DESC LIMIT ")
        .push_bind(filter.limit)
        .push(" OFFSET ")
        .push_bind(filter.offset);
    builder
}

/// Maps a unique violation on `(location, time)` to `Duplicate`.
fn classify_insert_error(err: sqlx::Error, new: &NewObservation) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => StoreError::Duplicate {
            location: new.location.clone(),
            time: truncate_to_stored_precision(new.time),
        },
        _ => StoreError::Database(err),
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn insert(&self, new: &NewObservation) -> Result<Observation, StoreError> {
        sqlx::query_as::<_, Observation>(
            "INSERT INTO earthquakes (location, magnitude, depth, time)
             VALUES ($1, $2, $3, $4)
             RETURNING id, location, magnitude, depth, time",
        )
        .bind(&new.location)
        .bind(new.magnitude)
        .bind(new.depth)
        .bind(truncate_to_stored_precision(new.time))
        .fetch_one(&self.pool)
        .await
        .map_err(|err| classify_insert_error(err, new))
    }

    async fn get_by_id(&self, id: i64) -> Result<Observation, StoreError> {
        sqlx::query_as::<_, Observation>(
            "SELECT id, location, magnitude, depth, time FROM earthquakes WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound { id })
    }

    async fn list(&self, filter: &ObservationFilter) -> Result<Vec<Observation>, StoreError> {
        let mut builder = build_list_query(filter);
        debug!("list query: {}", builder.sql());
        let rows = builder
            .build_query_as::<Observation>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn count(&self) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM earthquakes")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
