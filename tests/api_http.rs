// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.

use std::sync::Arc;

use serde_json::{json, Value as Json};
use shuttle_axum::axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use tower::ServiceExt as _; // for `oneshot`

use asean_energy_ingest::api::{self, AppState, DEFAULT_ARTICLES_LIMIT};
use asean_energy_ingest::ingest::providers::{EventPageProvider, EventPageSource};
use asean_energy_ingest::ingest::{IngestConfig, Pipeline};
use asean_energy_ingest::store::{MemoryStore, RecordStore};

const BODY_LIMIT: usize = 1024 * 1024;

fn upcoming_page() -> String {
    let year = chrono::Utc::now().date_naive().format("%Y").to_string();
    let next = (year.parse::<i32>().unwrap() + 1).to_string();
    format!(
        r#"<html><body><h1>Energy Conference in Singapore</h1>
           <table>
             <thead><tr><th>Date</th><th>Conference</th><th>Venue</th></tr></thead>
             <tbody>
               <tr><td>10 Jan {next}</td><td>Grid Summit</td><td>Singapore</td></tr>
               <tr><td>11 Jan {next}</td><td>Storage Expo</td><td>Singapore</td></tr>
             </tbody>
           </table></body></html>"#
    )
}

fn test_app(store: Arc<MemoryStore>) -> Router {
    let pipeline = Pipeline::new(IngestConfig::default_seed(), store).with_event_providers(vec![
        Box::new(EventPageProvider::from_fixture(
            EventPageSource {
                url: "https://conf.test/sg".into(),
                label: "AllConferenceAlert".into(),
                region: "Singapore".into(),
            },
            &upcoming_page(),
        )),
    ]);
    api::router(AppState::new(Arc::new(pipeline)), None)
}

async fn json_body(resp: shuttle_axum::axum::response::Response) -> Json {
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    serde_json::from_slice(&bytes).expect("parse json")
}

#[tokio::test]
async fn health_reports_backend() {
    let app = test_app(Arc::new(MemoryStore::new()));
    let req = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .expect("build GET /health");

    let resp = app.oneshot(req).await.expect("oneshot /health");
    assert_eq!(resp.status(), StatusCode::OK);
    let v = json_body(resp).await;
    assert_eq!(v["status"], "ok");
    assert_eq!(v["backend"], "memory");
}

#[tokio::test]
async fn refresh_events_then_list_upcoming() {
    let store = Arc::new(MemoryStore::new());
    let app = test_app(store.clone());

    let req = Request::builder()
        .method("POST")
        .uri("/refresh/events")
        .body(Body::empty())
        .expect("build POST /refresh/events");
    let resp = app.clone().oneshot(req).await.expect("oneshot refresh");
    assert_eq!(resp.status(), StatusCode::OK);
    let v = json_body(resp).await;
    assert_eq!(v["ok"], true);
    assert_eq!(v["stats"]["upserted"], 2);

    // A past event written directly must not be listed.
    store
        .upsert(
            "events",
            &[json!({"dedupe_key": "old", "title": "Old Expo", "starts_on": "2001-01-01"})],
            "dedupe_key",
        )
        .await
        .unwrap();

    let req = Request::builder()
        .uri("/events")
        .body(Body::empty())
        .expect("build GET /events");
    let resp = app.oneshot(req).await.expect("oneshot /events");
    assert_eq!(resp.status(), StatusCode::OK);
    let v = json_body(resp).await;
    let titles: Vec<_> = v
        .as_array()
        .expect("array")
        .iter()
        .map(|r| r["title"].as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(titles, vec!["Grid Summit", "Storage Expo"]);
}

#[tokio::test]
async fn articles_are_newest_first_and_limited() {
    let store = Arc::new(MemoryStore::new());
    store
        .upsert(
            "articles",
            &[
                json!({"link": "https://a.test/1", "title": "older", "published_at": "2025-10-01T00:00:00+00:00"}),
                json!({"link": "https://a.test/2", "title": "newest", "published_at": "2025-10-19T00:00:00+00:00"}),
                json!({"link": "https://a.test/3", "title": "middle", "published_at": "2025-10-10T00:00:00+00:00"}),
            ],
            "link",
        )
        .await
        .unwrap();
    let app = test_app(store);

    let req = Request::builder()
        .uri("/articles?limit=2")
        .body(Body::empty())
        .expect("build GET /articles");
    let resp = app.oneshot(req).await.expect("oneshot /articles");
    assert_eq!(resp.status(), StatusCode::OK);
    let v = json_body(resp).await;
    let titles: Vec<_> = v
        .as_array()
        .expect("array")
        .iter()
        .map(|r| r["title"].as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(titles, vec!["newest", "middle"]);
}

#[tokio::test]
async fn articles_default_to_a_row_cap() {
    let store = Arc::new(MemoryStore::new());
    let rows: Vec<_> = (0..DEFAULT_ARTICLES_LIMIT + 5)
        .map(|i| {
            json!({
                "link": format!("https://a.test/{i}"),
                "title": format!("story {i}"),
                "published_at": format!("2025-10-{:02}T00:00:00+00:00", 1 + i % 28),
            })
        })
        .collect();
    store.upsert("articles", &rows, "link").await.unwrap();
    let app = test_app(store);

    let req = Request::builder()
        .uri("/articles")
        .body(Body::empty())
        .expect("build GET /articles");
    let resp = app.oneshot(req).await.expect("oneshot /articles");
    assert_eq!(resp.status(), StatusCode::OK);
    let v = json_body(resp).await;
    assert_eq!(v.as_array().expect("array").len(), DEFAULT_ARTICLES_LIMIT);
}

#[tokio::test]
async fn refresh_news_with_no_feeds_returns_empty_stats() {
    let app = test_app(Arc::new(MemoryStore::new()));
    let req = Request::builder()
        .method("POST")
        .uri("/refresh")
        .body(Body::empty())
        .expect("build POST /refresh");
    let resp = app.oneshot(req).await.expect("oneshot /refresh");
    assert_eq!(resp.status(), StatusCode::OK);
    let v = json_body(resp).await;
    assert_eq!(v["status"], "updated");
    assert_eq!(v["stats"]["raw"], 0);
}

#[tokio::test]
async fn metrics_route_without_recorder_is_404() {
    let app = test_app(Arc::new(MemoryStore::new()));
    let req = Request::builder()
        .uri("/metrics")
        .body(Body::empty())
        .expect("build GET /metrics");
    let resp = app.oneshot(req).await.expect("oneshot /metrics");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
