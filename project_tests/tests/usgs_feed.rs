//! # USGS Adapter Integration Tests
//!
//! Points the remote adapter at an in-process stand-in for the event feed to
//! check the query it sends, the cursor rules and failure handling.

use std::sync::Arc;
use std::time::Duration;

use lib_quake::RecordStore;
use lib_quake::ingestors::{AdapterError, IngestionLoop, SourceAdapter, UsgsAdapter, UsgsOptions};
use lib_quake::store::MemoryRecordStore;
use project_tests::{MockFeed, at, usgs_feature};
use serde_json::json;

// 2025-10-26T18:51:46Z and 100 s later.
const FIRST_MILLIS: i64 = 1_761_504_706_000;
const SECOND_MILLIS: i64 = 1_761_504_806_000;

async fn adapter_for(feed: &MockFeed) -> UsgsAdapter {
    let base_url = feed.spawn().await.unwrap();
    UsgsAdapter::new(&UsgsOptions {
        base_url,
        limit: 25,
        timeout: Duration::from_secs(2),
        max_retries: 0,
    })
    .unwrap()
    .with_cursor(at("2025-10-26T00:00:00"))
}

fn two_events() -> Vec<serde_json::Value> {
    vec![
        usgs_feature("ak1", "50 km N of Anchorage, Alaska", 3.1, SECOND_MILLIS, 40.2),
        usgs_feature("ak0", "12 km S of Willow, Alaska", 2.4, FIRST_MILLIS, 18.0),
    ]
}

#[tokio::test]
async fn test_query_carries_cursor_and_paging() {
    let feed = MockFeed::new();
    let mut adapter = adapter_for(&feed).await;

    adapter.produce_batch().await.unwrap();

    let requests = feed.requests().await;
    assert_eq!(requests.len(), 1);
    let query = &requests[0];
    assert_eq!(query["format"], "geojson");
    assert_eq!(query["orderby"], "time");
    assert_eq!(query["limit"], "25");
    assert_eq!(query["starttime"], "2025-10-26T00:00:00");
}

#[tokio::test]
async fn test_success_advances_cursor_to_newest_event() {
    let feed = MockFeed::new();
    feed.set_features(two_events()).await;
    let mut adapter = adapter_for(&feed).await;

    let batch = adapter.produce_batch().await.unwrap();
    assert_eq!(batch.candidates.len(), 2);
    assert_eq!(batch.candidates[0].location, "50 km N of Anchorage, Alaska");
    assert_eq!(batch.candidates[0].depth, 40.2);
    assert_eq!(adapter.cursor(), at("2025-10-26T18:53:26"));

    adapter.produce_batch().await.unwrap();
    let requests = feed.requests().await;
    assert_eq!(requests[1]["starttime"], "2025-10-26T18:53:26");
}

#[tokio::test]
async fn test_empty_response_keeps_cursor() {
    let feed = MockFeed::new();
    let mut adapter = adapter_for(&feed).await;

    let batch = adapter.produce_batch().await.unwrap();
    assert!(batch.is_empty());
    assert_eq!(adapter.cursor(), at("2025-10-26T00:00:00"));
}

#[tokio::test]
async fn test_failed_fetch_keeps_cursor_and_recovers() {
    let feed = MockFeed::new();
    feed.set_features(two_events()).await;
    feed.fail_with(Some(503)).await;
    let mut adapter = adapter_for(&feed).await;

    let err = adapter.produce_batch().await.unwrap_err();
    assert!(matches!(err, AdapterError::Status { status: 503, .. }));
    assert_eq!(adapter.cursor(), at("2025-10-26T00:00:00"));

    feed.fail_with(None).await;
    let batch = adapter.produce_batch().await.unwrap();
    assert_eq!(batch.candidates.len(), 2);
    assert_eq!(feed.requests().await[1]["starttime"], "2025-10-26T00:00:00");
}

#[tokio::test]
async fn test_unreachable_feed_is_a_fetch_error() {
    // Nothing listens on the discard port.
    let mut adapter = UsgsAdapter::new(&UsgsOptions {
        base_url: "http://127.0.0.1:9/".to_string(),
        limit: 10,
        timeout: Duration::from_secs(2),
        max_retries: 0,
    })
    .unwrap();
    let before = adapter.cursor();

    let err = adapter.produce_batch().await.unwrap_err();
    assert!(matches!(err, AdapterError::Fetch { .. }));
    assert_eq!(adapter.cursor(), before);
}

#[tokio::test]
async fn test_malformed_feature_is_dropped_alone() {
    let feed = MockFeed::new();
    let mut features = two_events();
    features.push(json!({
        "type": "Feature",
        "id": "broken",
        "properties": { "mag": null, "place": "Nowhere", "time": FIRST_MILLIS },
        "geometry": { "type": "Point", "coordinates": [0.0, 0.0, 5.0] }
    }));
    feed.set_features(features).await;
    let mut adapter = adapter_for(&feed).await;

    let batch = adapter.produce_batch().await.unwrap();
    assert_eq!(batch.candidates.len(), 2);
    assert_eq!(batch.rejected, 1);
}

#[tokio::test]
async fn test_overlapping_cycles_insert_each_event_once() {
    let feed = MockFeed::new();
    feed.set_features(two_events()).await;
    let adapter = adapter_for(&feed).await;

    let store = Arc::new(MemoryRecordStore::new());
    let mut ingest = IngestionLoop::new(Box::new(adapter), store.clone(), Duration::from_secs(10));

    let first = ingest.run_cycle().await;
    assert_eq!(first.inserted, 2);

    // The feed's starttime is inclusive; the same events come back.
    let second = ingest.run_cycle().await;
    assert_eq!(second.inserted, 0);
    assert_eq!(second.duplicates, 2);
    assert_eq!(store.count().await.unwrap(), 2);
}
