//! # USGS Feed Ingestor
//!
//! Polls the USGS FDSN event service (`format=geojson`) for the most recent
//! events since a time cursor.
//!
//! ## Cursor rules:
//! - Starts at the current UTC instant when the adapter is built.
//! - After a successful fetch it moves forward to the newest event time in
//!   the response. It never moves backwards, and an empty response leaves it
//!   where it is.
//! - After a failed fetch (transport error, timeout, non-2xx, undecodable
//!   body) it stays put, so the next cycle retries from the same point.
//!
//! `starttime` is inclusive on the feed side, so the newest event of one cycle
//! comes back in the next one and is absorbed as a duplicate by the store.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{AdapterError, Batch, SourceAdapter};
use crate::retrieve::{ApiClient, ApiClientOptions};
use crate::store::model::from_epoch_millis;
use crate::store::NewObservation;

/// Format the feed expects for `starttime`.
const CURSOR_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Connection settings for [`UsgsAdapter`].
#[derive(Debug, Clone)]
pub struct UsgsOptions {
    /// Service root; `query` is joined onto it.
    pub base_url: String,
    /// Maximum events per fetch.
    pub limit: u32,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl Default for UsgsOptions {
    fn default() -> Self {
        Self {
            base_url: "https://earthquake.usgs.gov/fdsnws/event/1/".to_string(),
            limit: 10,
            timeout: Duration::from_secs(10),
            max_retries: 3,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct FeatureProperties {
    time: Option<i64>,
    mag: Option<f64>,
    place: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Geometry {
    #[serde(default)]
    coordinates: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    properties: FeatureProperties,
    geometry: Option<Geometry>,
}

/// Maps one GeoJSON feature to a candidate.
///
/// `place → location`, `mag → magnitude`, `coordinates[2] → depth`,
/// `time` (epoch millis, UTC) `→ time`.
pub fn normalize_feature(raw: &Value) -> Result<NewObservation, String> {
    let feature: Feature =
        serde_json::from_value(raw.clone()).map_err(|e| format!("malformed feature: {e}"))?;
    let props = feature.properties;

    let location = props.place.ok_or("missing properties.place")?;
    let magnitude = props.mag.ok_or("missing properties.mag")?;
    let millis = props.time.ok_or("missing properties.time")?;
    let time = from_epoch_millis(millis).ok_or_else(|| format!("time out of range: {millis}"))?;
    let depth = feature
        .geometry
        .and_then(|g| g.coordinates.get(2).copied().flatten())
        .ok_or("missing geometry.coordinates[2]")?;

    let candidate = NewObservation {
        location,
        magnitude,
        depth,
        time,
    };
    candidate.validate()?;
    Ok(candidate)
}

/// Normalizes every feature, dropping and logging the malformed ones.
pub fn normalize_features(features: &[Value]) -> Batch {
    let mut batch = Batch::default();
    for (index, raw) in features.iter().enumerate() {
        match normalize_feature(raw) {
            Ok(candidate) => batch.candidates.push(candidate),
            Err(reason) => {
                let id = raw.get("id").and_then(Value::as_str).unwrap_or("unknown");
                warn!(index, id, %reason, "dropping malformed USGS feature");
                batch.rejected += 1;
            }
        }
    }
    batch
}

/// Remote adapter over the USGS event feed.
pub struct UsgsAdapter {
    client: ApiClient,
    limit: u32,
    cursor: NaiveDateTime,
}

impl UsgsAdapter {
    /// Builds the adapter with its cursor at the current UTC instant.
    pub fn new(options: &UsgsOptions) -> anyhow::Result<Self> {
        let client = ApiClient::new(
            &options.base_url,
            &ApiClientOptions {
                timeout: options.timeout,
                max_retries: options.max_retries,
                ..Default::default()
            },
        )?;
        Ok(Self {
            client,
            limit: options.limit,
            cursor: Utc::now().naive_utc(),
        })
    }

    /// Replaces the starting cursor.
    pub fn with_cursor(mut self, cursor: NaiveDateTime) -> Self {
        self.cursor = cursor;
        self
    }

    /// Most recent successfully fetched instant.
    pub fn cursor(&self) -> NaiveDateTime {
        self.cursor
    }

    fn query_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("format", "geojson".to_string()),
            ("limit", self.limit.to_string()),
            ("orderby", "time".to_string()),
            ("starttime", self.cursor.format(CURSOR_FORMAT).to_string()),
        ]
    }

    fn advance_cursor(&mut self, batch: &Batch) {
        if let Some(newest) = batch.candidates.iter().map(|c| c.time).max() {
            if newest > self.cursor {
                debug!(from = %self.cursor, to = %newest, "advancing USGS cursor");
                self.cursor = newest;
            }
        }
    }
}

#[async_trait]
impl SourceAdapter for UsgsAdapter {
    fn name(&self) -> &str {
        "usgs"
    }

    async fn produce_batch(&mut self) -> Result<Batch, AdapterError> {
        let params = self.query_params();
        let response = self
            .client
            .request::<FeatureCollection>(Method::GET, "query", &params)
            .await
            .map_err(|e| AdapterError::Fetch {
                url: self.client.base_url().to_string(),
                reason: format!("{e:#}"),
            })?;

        if !response.success {
            return Err(AdapterError::Status {
                status: response.status,
                body: response.error_body.unwrap_or_default(),
            });
        }

        let features = response.data.map(|c| c.features).unwrap_or_default();
        info!(count = features.len(), since = %self.cursor, "Fetched records from USGS");

        let batch = normalize_features(&features);
        self.advance_cursor(&batch);
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn feature(place: Option<&str>, mag: Option<f64>, millis: i64, depth: f64) -> Value {
        json!({
            "type": "Feature",
            "id": "us7000test",
            "properties": { "mag": mag, "place": place, "time": millis },
            "geometry": { "type": "Point", "coordinates": [-122.8, 38.8, depth] }
        })
    }

    #[test]
    fn test_feature_maps_nested_fields() {
        let candidate =
            normalize_feature(&feature(Some("10 km W of Cobb, CA"), Some(2.1), 1_761_504_706_000, 3.4))
                .unwrap();

        assert_eq!(candidate.location, "10 km W of Cobb, CA");
        assert_eq!(candidate.magnitude, 2.1);
        assert_eq!(candidate.depth, 3.4);
        assert_eq!(
            candidate.time,
            NaiveDate::from_ymd_opt(2025, 10, 26).unwrap().and_hms_opt(18, 51, 46).unwrap()
        );
    }

    #[test]
    fn test_null_magnitude_is_rejected() {
        let err = normalize_feature(&feature(Some("Alaska"), None, 1_761_504_706_000, 10.0)).unwrap_err();
        assert!(err.contains("mag"));
    }

    #[test]
    fn test_short_coordinates_are_rejected() {
        let raw = json!({
            "properties": { "mag": 3.0, "place": "Fiji", "time": 1_761_504_706_000i64 },
            "geometry": { "coordinates": [178.1, -17.9] }
        });
        assert!(normalize_feature(&raw).unwrap_err().contains("coordinates"));
    }

    #[test]
    fn test_wrongly_typed_feature_is_rejected_alone() {
        let features = vec![
            feature(Some("Alaska"), Some(3.0), 1_761_504_706_000, 10.0),
            json!({ "properties": { "time": "yesterday" } }),
            feature(Some("Chile"), Some(4.5), 1_761_504_806_000, 35.0),
        ];

        let batch = normalize_features(&features);
        assert_eq!(batch.candidates.len(), 2);
        assert_eq!(batch.rejected, 1);
    }

    #[test]
    fn test_query_params_carry_cursor() {
        let cursor = NaiveDate::from_ymd_opt(2025, 10, 26).unwrap().and_hms_opt(18, 51, 46).unwrap();
        let adapter = UsgsAdapter::new(&UsgsOptions::default()).unwrap().with_cursor(cursor);

        let params = adapter.query_params();
        assert!(params.contains(&("starttime", "2025-10-26T18:51:46".to_string())));
        assert!(params.contains(&("orderby", "time".to_string())));
        assert!(params.contains(&("limit", "10".to_string())));
    }

    #[test]
    fn test_cursor_never_moves_backwards() {
        let cursor = NaiveDate::from_ymd_opt(2025, 10, 27).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let mut adapter = UsgsAdapter::new(&UsgsOptions::default()).unwrap().with_cursor(cursor);

        let older = normalize_features(&[feature(Some("Alaska"), Some(3.0), 1_761_504_706_000, 10.0)]);
        adapter.advance_cursor(&older);
        assert_eq!(adapter.cursor(), cursor);

        adapter.advance_cursor(&Batch::default());
        assert_eq!(adapter.cursor(), cursor);
    }
}
