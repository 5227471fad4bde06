//! # Observation Model
//!
//! The persisted earthquake record, its insert payload, and the helpers that
//! turn loosely formatted timestamps into the naive UTC instants the store keeps.
//!
//! Stored instants have microsecond precision, the resolution of a PostgreSQL
//! `TIMESTAMP`. Every parsed time is truncated to it so that both store
//! backends see the same `(location, time)` key.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SubsecRound};
use serde::{Deserialize, Deserializer, Serialize};

/// One earthquake record as stored. `id` is assigned by the store on insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Observation {
    pub id: i64,
    pub location: String,
    pub magnitude: f64,
    pub depth: f64,
    pub time: NaiveDateTime,
}

/// An observation that has not been persisted yet.
///
/// This is both the body of `POST /earthquakes/` and the normalized candidate
/// handed from a source adapter to the ingestion loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewObservation {
    pub location: String,
    pub magnitude: f64,
    pub depth: f64,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub time: NaiveDateTime,
}

impl NewObservation {
    /// Checks the field rules the store relies on: a non-blank location and
    /// finite numbers. Ranges are deliberately not enforced.
    pub fn validate(&self) -> Result<(), String> {
        if self.location.trim().is_empty() {
            return Err("location must not be empty".to_string());
        }
        if !self.magnitude.is_finite() {
            return Err(format!("magnitude is not a finite number: {}", self.magnitude));
        }
        if !self.depth.is_finite() {
            return Err(format!("depth is not a finite number: {}", self.depth));
        }
        Ok(())
    }

    /// Attaches a store-assigned id.
    pub fn with_id(self, id: i64) -> Observation {
        Observation {
            id,
            location: self.location,
            magnitude: self.magnitude,
            depth: self.depth,
            time: self.time,
        }
    }
}

/// Digits of fractional seconds a stored instant keeps.
pub const STORED_SUBSEC_DIGITS: u16 = 6;

/// Drops sub-microsecond digits.
pub fn truncate_to_stored_precision(time: NaiveDateTime) -> NaiveDateTime {
    time.trunc_subsecs(STORED_SUBSEC_DIGITS)
}

/// Parses a timestamp given as RFC 3339 (converted to UTC), a naive ISO-8601
/// datetime, or a bare `YYYY-MM-DD` date (midnight), truncated to microseconds.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(truncate_to_stored_precision(dt.naive_utc()));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(truncate_to_stored_precision(naive));
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("unrecognized timestamp: {raw}")))
}

/// Converts epoch milliseconds to a naive UTC instant.
pub fn from_epoch_millis(millis: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(millis).map(|dt| dt.naive_utc())
}
