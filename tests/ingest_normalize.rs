// tests/ingest_normalize.rs
//
// Behavioural checks across the normalizers, the extraction chain, the keyword gate
// and batch dedupe.

use chrono::NaiveDate;

use asean_energy_ingest::ingest::assemble::assemble_events;
use asean_energy_ingest::ingest::keywords::matches;
use asean_energy_ingest::ingest::types::RawDocument;
use asean_energy_ingest::ingest::{Deduplicator, ExtractionChain};
use asean_energy_ingest::normalize::{
    infer_regions, normalize_location, normalize_partial_date, RegionTable,
};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn doc(html: &str) -> RawDocument {
    RawDocument {
        url: "https://listing.test/asean/energy.html".into(),
        source_label: "Listing".into(),
        fallback_region: "Indonesia".into(),
        html: html.into(),
    }
}

#[test]
fn yearless_dates_resolve_to_the_upcoming_occurrence() {
    let span = normalize_partial_date("02 Jan", None, d(2025, 12, 30)).unwrap();
    assert_eq!(span.start, d(2026, 1, 2));

    // Yesterday is still "upcoming".
    let span = normalize_partial_date("29 Dec", None, d(2025, 12, 30)).unwrap();
    assert_eq!(span.start, d(2025, 12, 29));

    // An explicit year is taken at face value.
    let span = normalize_partial_date("02 Jan 2025", None, d(2025, 12, 30)).unwrap();
    assert_eq!(span.start, d(2025, 1, 2));

    assert!(normalize_partial_date("TBA", None, d(2025, 12, 30)).is_err());
    assert!(normalize_partial_date("31 Feb", None, d(2025, 12, 30)).is_err());
}

#[test]
fn locations_split_and_canonicalize() {
    let kl = normalize_location("Kuala Lumpur, Malaysia", None).unwrap();
    assert_eq!(kl.city.as_deref(), Some("Kuala Lumpur"));
    assert_eq!(kl.region.as_deref(), Some("Malaysia"));

    let sg = normalize_location("Singapore", None).unwrap();
    assert_eq!(sg.city.as_deref(), Some("Singapore"));
    assert_eq!(sg.region.as_deref(), Some("Singapore"));

    for text in ["Hanoi, Viet Nam", "Hanoi, Vietnam"] {
        let loc = normalize_location(text, None).unwrap();
        assert_eq!(loc.region.as_deref(), Some("Vietnam"), "{text}");
    }

    assert!(normalize_location("   ", None).is_err());
}

#[test]
fn hyphenated_title_yields_every_region_by_priority() {
    let table = RegionTable::asean();
    assert_eq!(
        infer_regions("Vietnam-Malaysia-Singapore Power Summit", &table),
        vec!["Singapore", "Malaysia", "Vietnam"]
    );
    assert!(infer_regions("Global oil outlook", &table).is_empty());
}

#[test]
fn heuristic_table_wins_before_loose_text() {
    let html = r#"<html><body>
        <table>
          <tr><td>05 Dec</td><td>Java Grid Forum</td><td>Surabaya</td></tr>
          <tr><td>12 Dec</td><td>Bali Renewable Expo</td><td>Denpasar, Indonesia</td></tr>
        </table>
        <p>NOV 12</p><p>Footer Forum Name</p><p>Jakarta, Indonesia</p>
    </body></html>"#;
    let got = ExtractionChain::standard()
        .extract(&doc(html), d(2025, 10, 19))
        .unwrap();
    assert_eq!(got.strategy, "heuristic_table");
    let titles: Vec<_> = got.tuples.iter().map(|t| t.title_text.as_str()).collect();
    assert_eq!(titles, vec!["Java Grid Forum", "Bali Renewable Expo"]);
}

#[test]
fn tableless_page_falls_through_to_loose_text() {
    let html = r#"<html><body>
        <p>NOV 12</p><p>Jakarta Clean Power Forum</p><p>Jakarta, Indonesia</p>
    </body></html>"#;
    let got = ExtractionChain::standard()
        .extract(&doc(html), d(2025, 10, 19))
        .unwrap();
    assert_eq!(got.strategy, "loose_text");
    assert_eq!(got.tuples.len(), 1);
    assert_eq!(got.tuples[0].title_text, "Jakarta Clean Power Forum");
    assert_eq!(got.tuples[0].location_text, "Jakarta, Indonesia");

    let (events, dropped) = assemble_events(&got, "Indonesia", d(2025, 10, 19));
    assert_eq!(dropped, 0);
    assert_eq!(events[0].starts_on, d(2025, 11, 12));
    assert_eq!(events[0].city.as_deref(), Some("Jakarta"));
}

#[test]
fn page_with_nothing_usable_is_an_empty_extraction() {
    let html = "<html><body><p>No events scheduled.</p></body></html>";
    assert!(ExtractionChain::standard()
        .extract(&doc(html), d(2025, 10, 19))
        .is_err());
}

#[test]
fn keyword_gate_any_list() {
    let any = ["energy", "solar"];
    let none: [&str; 0] = [];

    let m = matches("Solar park opens in Laos", &any, &none);
    assert!(m.keep);
    assert_eq!(m.matched, vec!["solar".to_string()]);

    assert!(!matches("City council meeting", &any, &none).keep);
}

#[test]
fn case_and_whitespace_variants_collapse_to_one_event() {
    let html = r#"<html><body><h1>Energy Conference 2025</h1>
        <table>
          <thead><tr><th>Date</th><th>Name</th><th>Venue</th></tr></thead>
          <tbody>
            <tr><td>02 Nov</td><td>Grid   Summit</td><td>Singapore</td></tr>
            <tr><td>02 Nov</td><td>grid summit</td><td>Singapore</td></tr>
          </tbody>
        </table></body></html>"#;
    let extraction = ExtractionChain::standard()
        .extract(&doc(html), d(2025, 10, 19))
        .unwrap();
    let (events, _) = assemble_events(&extraction, "Singapore", d(2025, 10, 19));
    assert_eq!(events.len(), 2);

    let (kept, removed) = Deduplicator::new().dedupe(events);
    assert_eq!(kept.len(), 1);
    assert_eq!(removed, 1);
    assert_eq!(kept[0].title, "Grid Summit");
}
