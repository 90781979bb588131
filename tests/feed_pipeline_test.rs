use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::json;
use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use powercheck::app::ports::{Geocoder, HttpClientPort, HttpGetResult};
use powercheck::infra::geocoder::PostcodesIoGeocoder;
use powercheck::sources::{HtmlTableSource, JsonFeedSource, PayloadOrigin};
use powercheck::{FeedNormalizer, FeedPipeline, FetchStatus, Severity, SnapshotCache, SnapshotSummary};

const FEED_URL: &str = "https://feed.test/incidents.json";
const GEOCODER_URL: &str = "https://geo.test";

/// Serves canned bodies by URL and counts every request
struct StubHttp {
    routes: HashMap<String, (u16, String)>,
    calls: Mutex<Vec<String>>,
}

impl StubHttp {
    fn new(routes: Vec<(&str, u16, String)>) -> Arc<Self> {
        Arc::new(Self {
            routes: routes
                .into_iter()
                .map(|(url, status, body)| (url.to_string(), (status, body)))
                .collect(),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| u.as_str() == url).count()
    }

    fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpClientPort for StubHttp {
    async fn get(&self, url: &str) -> Result<HttpGetResult, String> {
        self.calls.lock().unwrap().push(url.to_string());
        // Let concurrently polled callers interleave
        tokio::task::yield_now().await;
        match self.routes.get(url) {
            Some((status, body)) => Ok(HttpGetResult {
                status: *status,
                bytes: body.clone().into_bytes(),
                content_type: "application/json".to_string(),
                content_length: body.len() as u64,
            }),
            None => Err(format!("connection refused: {}", url)),
        }
    }
}

fn outcode_body(lat: f64, lng: f64) -> String {
    json!({"status": 200, "result": {"latitude": lat, "longitude": lng}}).to_string()
}

fn json_pipeline(http: Arc<StubHttp>, geocode: bool) -> FeedPipeline {
    let geocoder: Option<Arc<dyn Geocoder>> = if geocode {
        Some(Arc::new(PostcodesIoGeocoder::new(http.clone(), GEOCODER_URL)))
    } else {
        None
    };
    FeedPipeline::new(
        Box::new(JsonFeedSource::new(http, PayloadOrigin::Url(FEED_URL.to_string()))),
        FeedNormalizer::new(geocoder),
    )
}

#[tokio::test]
async fn test_wrapped_feed_with_geocoding() {
    let feed = json!({
        "lastUpdated": "2025-12-01T09:00:00Z",
        "incidents": [
            {"Incident ID": "F-1", "Type": "HV Fault", "Postcodes Affected": "BT12 3; BT9 4", "Status": "Investigating"},
            {"Incident ID": "F-2", "Type": "Planned Work", "Location": "Bangor", "coordinates": [54.66, -5.67]},
            {"Incident ID": "F-3", "Type": "Planned Work", "Location": "Rathlin Island"},
            {"Incident ID": "F-4", "Type": "Unplanned Outage", "Postcode": "BT99"}
        ]
    });
    let http = StubHttp::new(vec![
        (FEED_URL, 200, feed.to_string()),
        ("https://geo.test/outcodes/BT12", 200, outcode_body(54.59, -5.95)),
        ("https://geo.test/outcodes/BT99", 404, r#"{"status":404,"error":"Outcode not found"}"#.to_string()),
    ]);

    let snapshot = json_pipeline(http.clone(), true).run().await;

    assert_eq!(snapshot.status, FetchStatus::Live);
    let ids: Vec<&str> = snapshot.incidents.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, ["F-1", "F-2"]);

    let first = &snapshot.incidents[0];
    assert_eq!(first.coordinates(), (54.59, -5.95));
    assert_eq!(first.location_label, "BT12 3; BT9 4");
    assert_eq!(first.severity(), Severity::Urgent);
    assert_eq!(snapshot.incidents[1].severity(), Severity::Informational);

    // One lookup per record that needed one, no retries
    assert_eq!(http.calls_to("https://geo.test/outcodes/BT12"), 1);
    assert_eq!(http.calls_to("https://geo.test/outcodes/BT99"), 1);
    assert_eq!(http.total_calls(), 3);
}

#[tokio::test]
async fn test_unreachable_upstream_gives_failed_empty_snapshot() {
    let http = StubHttp::new(vec![]);
    let snapshot = json_pipeline(http, true).run().await;

    assert!(snapshot.is_failed());
    assert!(snapshot.incidents.is_empty());
}

#[tokio::test]
async fn test_non_success_status_is_total_failure() {
    let http = StubHttp::new(vec![(FEED_URL, 503, "Service Unavailable".to_string())]);
    let snapshot = json_pipeline(http, false).run().await;

    match &snapshot.status {
        FetchStatus::Failed { reason } => assert!(reason.contains("503")),
        other => panic!("expected failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unparsable_payload_is_total_failure() {
    let http = StubHttp::new(vec![(FEED_URL, 200, "<html>maintenance</html>".to_string())]);
    let snapshot = json_pipeline(http, false).run().await;
    assert!(snapshot.is_failed());
}

#[tokio::test]
async fn test_empty_feed_is_live_with_no_incidents() {
    let http = StubHttp::new(vec![(FEED_URL, 200, r#"{"incidents": []}"#.to_string())]);
    let snapshot = json_pipeline(http, false).run().await;

    assert_eq!(snapshot.status, FetchStatus::Live);
    assert!(snapshot.incidents.is_empty());
}

#[tokio::test]
async fn test_cache_serves_within_ttl_and_refreshes_once_after() {
    let feed = json!([{"id": "INC-1", "lat": 54.6, "lng": -5.9}]).to_string();
    let http = StubHttp::new(vec![(FEED_URL, 200, feed)]);
    let pipeline = json_pipeline(http.clone(), false);
    let cache = SnapshotCache::new(Duration::minutes(5));
    let t0 = Utc::now();

    let first = pipeline.fetch_at(&cache, t0).await;
    let second = pipeline.fetch_at(&cache, t0 + Duration::minutes(2)).await;
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(http.calls_to(FEED_URL), 1);

    let after_expiry = t0 + Duration::minutes(6);
    let (a, b) = tokio::join!(
        pipeline.fetch_at(&cache, after_expiry),
        pipeline.fetch_at(&cache, after_expiry)
    );
    assert!(Arc::ptr_eq(&a, &b));
    assert!(!Arc::ptr_eq(&first, &a));
    assert_eq!(http.calls_to(FEED_URL), 2);
}

#[tokio::test]
async fn test_concurrent_fetches_share_one_failed_attempt() {
    let http = StubHttp::new(vec![]);
    let pipeline = json_pipeline(http.clone(), false);
    let cache = SnapshotCache::new(Duration::minutes(5));
    let now = Utc::now();

    let (a, b, c) = tokio::join!(
        pipeline.fetch_at(&cache, now),
        pipeline.fetch_at(&cache, now),
        pipeline.fetch_at(&cache, now)
    );

    assert!(a.is_failed());
    assert!(Arc::ptr_eq(&a, &b) && Arc::ptr_eq(&b, &c));
    assert_eq!(http.calls_to(FEED_URL), 1);
    assert!(cache.peek().await.is_none());
}

/// Fails the first request, succeeds afterwards
struct FlakyHttp {
    attempts: AtomicUsize,
    body: String,
}

#[async_trait]
impl HttpClientPort for FlakyHttp {
    async fn get(&self, _url: &str) -> Result<HttpGetResult, String> {
        if self.attempts.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err("timed out".to_string());
        }
        Ok(HttpGetResult {
            status: 200,
            bytes: self.body.clone().into_bytes(),
            content_type: "application/json".to_string(),
            content_length: self.body.len() as u64,
        })
    }
}

#[tokio::test]
async fn test_failed_fetch_is_not_cached() {
    let http = Arc::new(FlakyHttp {
        attempts: AtomicUsize::new(0),
        body: json!([{"id": "INC-9", "coordinates": [54.34, -7.64]}]).to_string(),
    });
    let pipeline = FeedPipeline::new(
        Box::new(JsonFeedSource::new(http.clone(), PayloadOrigin::Url(FEED_URL.to_string()))),
        FeedNormalizer::default(),
    );
    let cache = SnapshotCache::new(Duration::minutes(5));
    let now = Utc::now();

    let failed = pipeline.fetch_at(&cache, now).await;
    assert!(failed.is_failed());

    let recovered = pipeline.fetch_at(&cache, now).await;
    assert_eq!(recovered.status, FetchStatus::Live);
    assert_eq!(recovered.incidents.len(), 1);
    assert_eq!(http.attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_html_table_from_file() {
    let mut page = tempfile::NamedTempFile::new().unwrap();
    write!(
        page,
        r#"<html><body><table id="faults">
            <tr><th>Reference</th><th>Fault Type</th><th>Cluster</th><th>Postcode</th><th>Customers Affected</th><th>Time Reported</th></tr>
            <tr><td>NIE-441</td><td>Unplanned</td><td>Enniskillen</td><td>BT74 6</td><td>1,204</td><td>07:55</td></tr>
            <tr><td>NIE-442</td><td>Planned</td><td>Coleraine</td><td>n/a</td><td>18</td><td>08:10</td></tr>
        </table></body></html>"#
    )
    .unwrap();

    let http = StubHttp::new(vec![("https://geo.test/outcodes/BT74", 200, outcode_body(54.34, -7.64))]);
    let geocoder: Arc<dyn Geocoder> = Arc::new(PostcodesIoGeocoder::new(http.clone(), GEOCODER_URL));
    let pipeline = FeedPipeline::new(
        Box::new(HtmlTableSource::new(
            http.clone(),
            PayloadOrigin::File(page.path().to_path_buf()),
            "table#faults",
        )),
        FeedNormalizer::new(Some(geocoder)),
    );

    let snapshot = pipeline.run().await;
    assert_eq!(snapshot.incidents.len(), 1);

    let incident = &snapshot.incidents[0];
    assert_eq!(incident.id, "NIE-441");
    assert_eq!(incident.kind, "Unplanned");
    assert_eq!(incident.location_label, "Enniskillen");
    assert_eq!(incident.customers_affected, Some(1204));
    assert_eq!(incident.reported_at, "07:55");
    assert_eq!(incident.status, "Unknown");

    let summary = SnapshotSummary::from_snapshot(&snapshot);
    assert_eq!(summary.urgent, 1);
    assert_eq!(summary.customers_affected, 1204);
}
