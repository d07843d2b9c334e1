// tests/ingest_events.rs
//
// End-to-end events ingestion over canned listing pages and the in-memory store.

use std::sync::Arc;

use chrono::NaiveDate;

use asean_energy_ingest::ingest::providers::{EventPageProvider, EventPageSource};
use asean_energy_ingest::ingest::types::DocumentProvider;
use asean_energy_ingest::ingest::{IngestConfig, Pipeline};
use asean_energy_ingest::store::MemoryStore;
use asean_energy_ingest::transport::StaticFetcher;

const SG_URL: &str = "https://www.allconferencealert.com/singapore/energy-conference.html";
const MY_URL: &str = "https://www.allconferencealert.com/malaysia/energy-conference.html";
const PH_URL: &str = "https://www.allconferencealert.com/philippines/energy-conference.html";

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 10, 19).unwrap()
}

fn source(url: &str, label: &str, region: &str) -> EventPageSource {
    EventPageSource {
        url: url.into(),
        label: label.into(),
        region: region.into(),
    }
}

fn providers() -> Vec<Box<dyn DocumentProvider>> {
    let blocked = Arc::new(StaticFetcher::new().with_page(
        PH_URL,
        200,
        "<html><body>Just a moment...</body></html>",
    ));
    vec![
        Box::new(EventPageProvider::from_fixture(
            source(SG_URL, "ACA Singapore", "Singapore"),
            include_str!("fixtures/events_singapore.html"),
        )),
        Box::new(EventPageProvider::from_fixture(
            source(MY_URL, "ACA Malaysia", "Malaysia"),
            include_str!("fixtures/events_malaysia.html"),
        )),
        Box::new(EventPageProvider::fetched(
            source(PH_URL, "ACA Philippines", "Philippines"),
            blocked,
        )),
    ]
}

fn pipeline(store: Arc<MemoryStore>) -> Pipeline {
    Pipeline::new(IngestConfig::default_seed(), store).with_event_providers(providers())
}

fn find<'a>(rows: &'a [serde_json::Value], title: &str) -> &'a serde_json::Value {
    rows.iter()
        .find(|r| r["title"] == title)
        .unwrap_or_else(|| panic!("no row titled {title:?}"))
}

#[tokio::test]
async fn events_are_extracted_normalized_deduped_and_stored() {
    let store = Arc::new(MemoryStore::new());
    let stats = pipeline(store.clone()).run_events(today()).await;

    // 3 header-table rows (TBA row fails the gate) + 2 heuristic rows.
    assert_eq!(stats.raw, 5);
    assert_eq!(stats.normalized, 4, "case/whitespace duplicate collapses");
    assert_eq!(stats.upserted, 4);
    assert_eq!(stats.skipped, 0);
    assert_eq!(stats.failed_sources, vec!["ACA Philippines".to_string()]);
    assert!(stats.chunk_errors.is_empty());

    let rows = store.rows("events");
    assert_eq!(rows.len(), 4);

    let grid = find(&rows, "International Conference on Grid Modernization");
    assert_eq!(grid["starts_on"], "2025-11-02");
    assert_eq!(grid["region"], "Singapore");
    assert_eq!(grid["city"], "Singapore");
    assert_eq!(grid["link"], "https://www.allconferencealert.com/event/1001");
    assert!(grid["venue"].is_null());

    let summit = find(&rows, "Renewable Energy and Storage Summit");
    assert_eq!(summit["city"], "Marina Bay");
    assert_eq!(summit["starts_on"], "2025-12-15");
    assert_eq!(summit["link"], "https://www.allconferencealert.com/event/1002");

    let kl = find(&rows, "ASEAN Power Week");
    assert_eq!(kl["city"], "Kuala Lumpur");
    assert_eq!(kl["region"], "Malaysia");
    assert_eq!(kl["link"], "https://conf.test/e/2001");

    // Past-looking, year-less date rolls into next year; city falls back to the page.
    let penang = find(&rows, "Carbon Capture Forum");
    assert_eq!(penang["starts_on"], "2026-01-05");
    assert_eq!(penang["city"], "Penang");
    assert_eq!(penang["region"], "Malaysia");
    assert_eq!(penang["link"], MY_URL);
}

#[tokio::test]
async fn rerunning_the_same_batch_is_idempotent() {
    let store = Arc::new(MemoryStore::new());
    let p = pipeline(store.clone());

    let first = p.run_events(today()).await;
    let second = p.run_events(today()).await;

    assert_eq!(first.upserted, second.upserted);
    assert!(second.chunk_errors.is_empty());
    assert_eq!(store.len("events"), 4);
}

#[tokio::test]
async fn text_only_page_falls_through_to_loose_sniffing() {
    let store = Arc::new(MemoryStore::new());
    let p = Pipeline::new(IngestConfig::default_seed(), store.clone()).with_event_providers(vec![
        Box::new(EventPageProvider::from_fixture(
            source("https://events.test/vn", "Cards", "Vietnam"),
            include_str!("fixtures/events_text_only.html"),
        )),
    ]);

    let stats = p.run_events(today()).await;
    assert_eq!(stats.raw, 1);
    assert_eq!(stats.upserted, 1);

    let rows = store.rows("events");
    assert_eq!(rows[0]["title"], "Vietnam Energy Transition Dialogue");
    assert_eq!(rows[0]["starts_on"], "2025-10-28");
    assert_eq!(rows[0]["ends_on"], "2025-10-30");
    assert_eq!(rows[0]["city"], "Hanoi");
    assert_eq!(rows[0]["region"], "Vietnam");
}

#[tokio::test]
async fn every_source_failing_still_returns_stats() {
    let store = Arc::new(MemoryStore::new());
    let dead = Arc::new(StaticFetcher::new().with_timeout(SG_URL));
    let p = Pipeline::new(IngestConfig::default_seed(), store.clone()).with_event_providers(vec![
        Box::new(EventPageProvider::rendered(
            source(SG_URL, "ACA Singapore", "Singapore"),
            dead.clone(),
        )),
        Box::new(EventPageProvider::fetched(
            source(MY_URL, "ACA Malaysia", "Malaysia"),
            dead,
        )),
    ]);

    let stats = p.run_events(today()).await;
    assert_eq!(stats.raw, 0);
    assert_eq!(stats.upserted, 0);
    assert_eq!(stats.failed_sources.len(), 2);
    assert!(store.is_empty("events"));
}
