//! # Integration Test Harness
//!
//! Helpers shared by the cross-crate tests under `tests/`: starting the API
//! router on an ephemeral port, and a stand-in for the USGS event feed that
//! can be told what to answer.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::NaiveDateTime;
use lib_quake::api::router;
use lib_quake::store::MemoryRecordStore;
use lib_quake::{NewObservation, QueryService, RecordStore};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

/// Serves `app` on `127.0.0.1:0` in a background task and returns its base URL
/// (no trailing slash).
pub async fn serve(app: Router) -> anyhow::Result<String> {
    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}"))
}

/// Starts the API over `store` and returns its base URL.
pub async fn spawn_api(store: Arc<dyn RecordStore>) -> anyhow::Result<String> {
    serve(router(QueryService::new(store))).await
}

/// Starts the API over a fresh in-memory store.
pub async fn spawn_memory_api() -> anyhow::Result<(String, Arc<MemoryRecordStore>)> {
    let store = Arc::new(MemoryRecordStore::new());
    let url = spawn_api(store.clone()).await?;
    Ok((url, store))
}

/// The three reference records shipped in `data/sample_data.json`.
pub fn sample_observations() -> Vec<NewObservation> {
    [
        ("Portugal", 5.5, 322.7, "2025-10-26T18:51:46"),
        ("Spain", 3.5, 352.1, "2025-10-27T18:10:46"),
        ("Italy", 4.2, 539.1, "2025-10-28T12:51:46"),
    ]
    .into_iter()
    .map(|(location, magnitude, depth, time)| NewObservation {
        location: location.to_string(),
        magnitude,
        depth,
        time: at(time),
    })
    .collect()
}

/// Parses `%Y-%m-%dT%H:%M:%S`; panics on bad input.
pub fn at(raw: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S").unwrap()
}

/// Builds a USGS-style GeoJSON feature.
pub fn usgs_feature(id: &str, place: &str, mag: f64, epoch_millis: i64, depth: f64) -> Value {
    json!({
        "type": "Feature",
        "id": id,
        "properties": { "mag": mag, "place": place, "time": epoch_millis, "type": "earthquake" },
        "geometry": { "type": "Point", "coordinates": [-150.1, 61.2, depth] }
    })
}

#[derive(Default)]
struct FeedState {
    features: Vec<Value>,
    fail_with: Option<u16>,
    requests: Vec<HashMap<String, String>>,
}

/// # Mock Event Feed
///
/// Answers `GET /query` with a GeoJSON `FeatureCollection` of the configured
/// features, or with a configured error status. Every query string is recorded.
#[derive(Clone, Default)]
pub struct MockFeed {
    state: Arc<Mutex<FeedState>>,
}

impl MockFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_features(&self, features: Vec<Value>) {
        self.state.lock().await.features = features;
    }

    /// Makes every following request fail with `status`, or succeed again with `None`.
    pub async fn fail_with(&self, status: Option<u16>) {
        self.state.lock().await.fail_with = status;
    }

    /// Query strings received so far, oldest first.
    pub async fn requests(&self) -> Vec<HashMap<String, String>> {
        self.state.lock().await.requests.clone()
    }

    /// Starts the feed and returns a base URL ending in `/`.
    pub async fn spawn(&self) -> anyhow::Result<String> {
        let app = Router::new()
            .route("/query", get(feed_query))
            .with_state(self.clone());
        Ok(format!("{}/", serve(app).await?))
    }
}

async fn feed_query(
    State(feed): State<MockFeed>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let mut state = feed.state.lock().await;
    state.requests.push(params);

    if let Some(code) = state.fail_with {
        let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return (status, "feed unavailable").into_response();
    }

    Json(json!({
        "type": "FeatureCollection",
        "metadata": { "count": state.features.len() },
        "features": state.features,
    }))
    .into_response()
}
