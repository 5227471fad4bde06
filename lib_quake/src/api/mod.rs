//! # Earthquake HTTP API
//!
//! The `axum` router that exposes the [`QueryService`] over HTTP.
//!
//! ## Routes:
//! - `GET /` → welcome message.
//! - `GET /health/` → `{"status":"ok"}`.
//! - `GET /earthquakes/` → filtered, paginated list, newest first.
//! - `GET /earthquakes/{id}/` → one observation or 404.
//! - `POST /earthquakes/` → creates an observation, 201.
//!
//! Errors are answered as `{"error_type": "...", "message": "..."}` with the
//! status picked by [`ApiError`]. Every request is logged with its method,
//! path, status and elapsed time.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

use std::time::Instant;

use axum::{
    Json, Router,
    extract::{Path, Query, Request, State, rejection::JsonRejection},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

use crate::query::{ListRequest, QueryError, QueryService};
use crate::store::model::parse_timestamp;
use crate::store::{NewObservation, Observation, StoreError};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub queries: QueryService,
}

/// # API Error
///
/// Everything a handler can fail with, mapped onto an HTTP status and a JSON body.
#[derive(Debug)]
pub enum ApiError {
    /// A query or store failure.
    Query(QueryError),
    /// The request body could not be decoded into an observation.
    InvalidBody(String),
}

impl From<QueryError> for ApiError {
    fn from(e: QueryError) -> Self {
        ApiError::Query(e)
    }
}

impl ApiError {
    fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        ApiError::Query(QueryError::InvalidParameter {
            name,
            reason: reason.into(),
        })
    }

    /// Status code and `error_type` tag of this error.
    pub fn classify(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::InvalidBody(_) => (StatusCode::BAD_REQUEST, "InvalidRequestBody"),
            ApiError::Query(QueryError::InvalidParameter { .. }) => {
                (StatusCode::BAD_REQUEST, "InvalidParameter")
            }
            ApiError::Query(QueryError::Store(StoreError::NotFound { .. })) => {
                (StatusCode::NOT_FOUND, "NotFound")
            }
            ApiError::Query(QueryError::Store(StoreError::Duplicate { .. })) => {
                (StatusCode::CONFLICT, "Duplicate")
            }
            ApiError::Query(QueryError::Store(StoreError::Database(_))) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "DatabaseError")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.classify();
        let message = match &self {
            ApiError::InvalidBody(detail) => detail.clone(),
            // Driver details stay in the log.
            ApiError::Query(QueryError::Store(StoreError::Database(e))) => {
                error!("Database error: {}", e);
                "The record store is unavailable.".to_string()
            }
            ApiError::Query(e) => e.to_string(),
        };
        (
            status,
            Json(json!({ "error_type": error_type, "message": message })),
        )
            .into_response()
    }
}

/// Query string of `GET /earthquakes/`. Kept as strings so that malformed
/// values are answered in the JSON error format.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub min_magnitude: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
}

impl ListParams {
    pub fn parse(self) -> Result<ListRequest, ApiError> {
        Ok(ListRequest {
            min_magnitude: parse_number(&self.min_magnitude, "min_magnitude")?,
            start_time: parse_time(&self.start_time, "start_time")?,
            end_time: parse_time(&self.end_time, "end_time")?,
            limit: parse_number(&self.limit, "limit")?,
            offset: parse_number(&self.offset, "offset")?,
        })
    }
}

fn parse_number<T: std::str::FromStr>(
    raw: &Option<String>,
    name: &'static str,
) -> Result<Option<T>, ApiError> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s
            .parse()
            .map(Some)
            .map_err(|_| ApiError::invalid(name, format!("`{s}` is not a valid number"))),
    }
}

fn parse_time(raw: &Option<String>, name: &'static str) -> Result<Option<chrono::NaiveDateTime>, ApiError> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => parse_timestamp(s)
            .map(Some)
            .ok_or_else(|| ApiError::invalid(name, format!("`{s}` is not a valid datetime"))),
    }
}

/// Builds the application router over `queries`.
pub fn router(queries: QueryService) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health/", get(health_check))
        .route("/earthquakes/", get(list_earthquakes).post(create_earthquake))
        .route("/earthquakes/{id}/", get(get_earthquake))
        .layer(middleware::from_fn(log_requests))
        .with_state(AppState { queries })
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started = Instant::now();

    let response = next.run(request).await;

    info!(
        %method,
        %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
        "request handled"
    );
    response
}

async fn index() -> Json<serde_json::Value> {
    Json(json!({ "message": "Welcome, Earthquake Monitoring API service is running." }))
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn list_earthquakes(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Observation>>, ApiError> {
    let request = params.parse()?;
    let rows = state.queries.list(request).await?;
    Ok(Json(rows))
}

async fn get_earthquake(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<Observation>, ApiError> {
    let id: i64 = raw_id
        .parse()
        .map_err(|_| ApiError::invalid("id", format!("`{raw_id}` is not a valid id")))?;
    Ok(Json(state.queries.get(id).await?))
}

async fn create_earthquake(
    State(state): State<AppState>,
    payload: Result<Json<NewObservation>, JsonRejection>,
) -> Result<(StatusCode, Json<Observation>), ApiError> {
    let Json(new) = payload.map_err(|rejection| {
        warn!("Rejected earthquake body: {}", rejection.body_text());
        ApiError::InvalidBody(rejection.body_text())
    })?;
    let created = state.queries.create(new).await?;
    info!(id = created.id, location = %created.location, "Created earthquake");
    Ok((StatusCode::CREATED, Json(created)))
}
