//! # Query Service
//!
//! Validates list parameters and delegates to the record store. No caching,
//! no aggregation: store failures reach the caller unchanged, and the API
//! layer decides the status code.
//!
//! ## Parameter policy:
//! - A negative `limit` or `offset` is rejected.
//! - A `limit` above [`MAX_PAGE_SIZE`] is clamped down to it.
//! - `start_time` after `end_time` is not an error; it simply matches nothing.

use std::sync::Arc;

use chrono::NaiveDateTime;
use thiserror::Error;
use tracing::debug;

use crate::store::{
    NewObservation, Observation, ObservationFilter, RecordStore, StoreError, DEFAULT_PAGE_SIZE,
};

/// Largest page a single list call returns.
pub const MAX_PAGE_SIZE: i64 = 500;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Raw list parameters as they arrive from a caller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListRequest {
    pub min_magnitude: Option<f64>,
    pub start_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ListRequest {
    /// Applies the parameter policy and produces a store filter.
    pub fn into_filter(self) -> Result<ObservationFilter, QueryError> {
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_SIZE);
        let offset = self.offset.unwrap_or(0);

        if limit < 0 {
            return Err(QueryError::InvalidParameter {
                name: "limit",
                reason: format!("must not be negative, got {limit}"),
            });
        }
        if offset < 0 {
            return Err(QueryError::InvalidParameter {
                name: "offset",
                reason: format!("must not be negative, got {offset}"),
            });
        }
        if let Some(min) = self.min_magnitude {
            if !min.is_finite() {
                return Err(QueryError::InvalidParameter {
                    name: "min_magnitude",
                    reason: "must be a finite number".to_string(),
                });
            }
        }

        Ok(ObservationFilter {
            min_magnitude: self.min_magnitude,
            start_time: self.start_time,
            end_time: self.end_time,
            limit: limit.min(MAX_PAGE_SIZE),
            offset,
        })
    }
}

/// Read and create operations over a shared record store.
#[derive(Clone)]
pub struct QueryService {
    store: Arc<dyn RecordStore>,
}

impl QueryService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self, request: ListRequest) -> Result<Vec<Observation>, QueryError> {
        let filter = request.into_filter()?;
        debug!(?filter, "listing earthquakes");
        Ok(self.store.list(&filter).await?)
    }

    pub async fn get(&self, id: i64) -> Result<Observation, QueryError> {
        Ok(self.store.get_by_id(id).await?)
    }

    /// Direct creation path used by `POST /earthquakes/`.
    pub async fn create(&self, new: NewObservation) -> Result<Observation, QueryError> {
        new.validate().map_err(|reason| QueryError::InvalidParameter {
            name: "body",
            reason,
        })?;
        Ok(self.store.insert(&new).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryRecordStore;
    use chrono::NaiveDate;

    fn quake(location: &str, day: u32) -> NewObservation {
        NewObservation {
            location: location.to_string(),
            magnitude: 4.0,
            depth: 12.5,
            time: NaiveDate::from_ymd_opt(2025, 10, day)
                .unwrap()
                .and_hms_opt(8, 30, 0)
                .unwrap(),
        }
    }

    #[test]
    fn test_defaults_apply_when_absent() {
        let filter = ListRequest::default().into_filter().unwrap();
        assert_eq!(filter.limit, DEFAULT_PAGE_SIZE);
        assert_eq!(filter.offset, 0);
    }

    #[test]
    fn test_negative_limit_is_rejected() {
        let request = ListRequest {
            limit: Some(-1),
            ..Default::default()
        };
        assert!(matches!(
            request.into_filter(),
            Err(QueryError::InvalidParameter { name: "limit", .. })
        ));
    }

    #[test]
    fn test_negative_offset_is_rejected() {
        let request = ListRequest {
            offset: Some(-5),
            ..Default::default()
        };
        assert!(matches!(
            request.into_filter(),
            Err(QueryError::InvalidParameter { name: "offset", .. })
        ));
    }

    #[test]
    fn test_oversized_limit_is_clamped() {
        let request = ListRequest {
            limit: Some(10_000),
            ..Default::default()
        };
        assert_eq!(request.into_filter().unwrap().limit, MAX_PAGE_SIZE);
    }

    #[tokio::test]
    async fn test_list_passes_filter_through() {
        let service = QueryService::new(Arc::new(MemoryRecordStore::new()));
        for (location, day) in [("Portugal", 26), ("Spain", 27), ("Italy", 28)] {
            service.create(quake(location, day)).await.unwrap();
        }

        let page = service
            .list(ListRequest {
                limit: Some(1),
                offset: Some(1),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(page.len(), 1);
        assert_eq!(page[0].location, "Spain");
    }

    #[tokio::test]
    async fn test_create_rejects_empty_location() {
        let store = Arc::new(MemoryRecordStore::new());
        let service = QueryService::new(store.clone());
        let err = service.create(quake("", 26)).await.unwrap_err();

        assert!(matches!(err, QueryError::InvalidParameter { name: "body", .. }));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_store_errors_propagate_unchanged() {
        let service = QueryService::new(Arc::new(MemoryRecordStore::new()));
        service.create(quake("Portugal", 26)).await.unwrap();

        let duplicate = service.create(quake("Portugal", 26)).await.unwrap_err();
        assert!(matches!(duplicate, QueryError::Store(StoreError::Duplicate { .. })));

        let missing = service.get(99).await.unwrap_err();
        assert!(matches!(missing, QueryError::Store(StoreError::NotFound { id: 99 })));
    }
}
