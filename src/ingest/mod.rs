// src/ingest/mod.rs
pub mod assemble;
pub mod config;
pub mod dedup;
pub mod extract;
pub mod keywords;
pub mod pipeline;
pub mod providers;
pub mod scheduler;
pub mod types;

pub use config::IngestConfig;
pub use dedup::{DedupeKey, Deduplicator};
pub use extract::{Extraction, ExtractionChain};
pub use pipeline::Pipeline;
pub use types::{EventRecord, IngestStats, NewsRecord};

use chrono::NaiveDate;
use futures::future::join_all;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;
use std::collections::HashSet;

use crate::error::ExtractError;
use crate::ingest::assemble::{assemble_events, assemble_news, NewsContext};
use crate::ingest::types::{DocumentProvider, FeedProvider};
use crate::store::BatchUpsertWriter;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_sources_total", "Sources fetched per run.");
        describe_counter!(
            "ingest_source_failures_total",
            "Sources that contributed zero records (fetch error, block, empty extraction)."
        );
        describe_counter!(
            "ingest_tuples_extracted_total",
            "Raw tuples recovered by the extraction chain."
        );
        describe_counter!(
            "ingest_records_dropped_total",
            "Tuples or feed entries dropped before assembly completed."
        );
        describe_counter!(
            "ingest_dedup_total",
            "Records removed by batch deduplication."
        );
        describe_counter!("ingest_upserted_total", "Rows confirmed by storage.");
        describe_counter!("ingest_runs_total", "Scheduled ingestion ticks.");
        describe_counter!(
            "ingest_chunk_failures_total",
            "Upsert chunks that failed after retries."
        );
        describe_histogram!(
            "ingest_extract_ms",
            "Document extraction / feed parse time in milliseconds."
        );
        describe_gauge!(
            "ingest_pipeline_last_run_ts",
            "Unix ts when an ingestion run last finished."
        );
    });
}

/// Clean feed/page text: decode entities, strip tags, ASCII quotes, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace (nbsp included)
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"[\s\x{00A0}]+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // 5) Length cap: 1500 chars
    if out.chars().count() > 1500 {
        out = out.chars().take(1500).collect();
    }

    out
}

fn mark_run_finished() {
    gauge!("ingest_pipeline_last_run_ts").set(chrono::Utc::now().timestamp().max(0) as f64);
}

/// Fetch every document source, extract, assemble, dedupe and upsert.
///
/// Sources are fetched concurrently but consumed in the order given, so the first
/// occurrence of a duplicate is the same on every run. A failing source is logged and
/// listed in `failed_sources`; it never stops the others.
pub async fn run_events_ingest(
    providers: &[Box<dyn DocumentProvider>],
    chain: &ExtractionChain,
    writer: &BatchUpsertWriter,
    today: NaiveDate,
) -> IngestStats {
    ensure_metrics_described();
    counter!("ingest_sources_total").increment(providers.len() as u64);

    let fetched = join_all(providers.iter().map(|p| p.fetch_document())).await;

    let mut stats = IngestStats::default();
    let mut records = Vec::new();
    for (p, res) in providers.iter().zip(fetched) {
        let doc = match res {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(target: "ingest", source = p.name(), error = ?e, "source fetch failed");
                counter!("ingest_source_failures_total").increment(1);
                stats.failed_sources.push(p.name().to_string());
                continue;
            }
        };

        let extraction = match chain.extract(&doc, today) {
            Ok(x) => x,
            Err(ExtractError::EmptyExtraction { url }) => {
                tracing::warn!(target: "ingest", source = p.name(), url = %url, "no rows recovered");
                counter!("ingest_source_failures_total").increment(1);
                stats.failed_sources.push(p.name().to_string());
                continue;
            }
        };

        stats.raw += extraction.tuples.len();
        let (mut recs, dropped) = assemble_events(&extraction, &doc.fallback_region, today);
        counter!("ingest_records_dropped_total").increment(dropped as u64);
        tracing::info!(
            target: "ingest",
            source = p.name(),
            url = %doc.url,
            strategy = extraction.strategy,
            rows = extraction.tuples.len(),
            kept = recs.len(),
            dropped,
            "source assembled"
        );
        records.append(&mut recs);
    }

    let (records, removed) = Deduplicator::new().dedupe(records);
    counter!("ingest_dedup_total").increment(removed as u64);
    stats.normalized = records.len();

    let outcome = writer.upsert(&records).await;
    stats.upserted = outcome.written;
    stats.skipped = outcome.skipped;
    stats.chunk_errors = outcome.chunk_errors;

    mark_run_finished();
    tracing::info!(
        target: "ingest",
        raw = stats.raw,
        normalized = stats.normalized,
        upserted = stats.upserted,
        skipped = stats.skipped,
        failed = stats.failed_sources.len(),
        "events ingest finished"
    );
    stats
}

/// Fetch every feed, gate and assemble entries, dedupe and upsert.
/// Links already taken by an earlier feed in the list are dropped.
pub async fn run_news_ingest(
    providers: &[Box<dyn FeedProvider>],
    ctx: &NewsContext<'_>,
    writer: &BatchUpsertWriter,
) -> IngestStats {
    ensure_metrics_described();
    counter!("ingest_sources_total").increment(providers.len() as u64);

    let fetched = join_all(providers.iter().map(|p| p.fetch_feed())).await;

    let mut stats = IngestStats::default();
    let mut seen_links = HashSet::new();
    let mut records = Vec::new();
    for (p, res) in providers.iter().zip(fetched) {
        let feed = match res {
            Ok(feed) => feed,
            Err(e) => {
                tracing::warn!(target: "ingest", source = p.name(), error = ?e, "feed fetch failed");
                counter!("ingest_source_failures_total").increment(1);
                stats.failed_sources.push(p.name().to_string());
                continue;
            }
        };

        stats.raw += feed.entries.len();
        let (mut recs, tally) = assemble_news(&feed, ctx, &mut seen_links);
        counter!("ingest_records_dropped_total").increment(tally.dropped as u64);
        tracing::info!(
            target: "ingest",
            source = p.name(),
            entries = feed.entries.len(),
            kept = tally.kept,
            dropped = tally.dropped,
            "feed assembled"
        );
        records.append(&mut recs);
    }

    let (records, removed) = Deduplicator::new().dedupe(records);
    counter!("ingest_dedup_total").increment(removed as u64);
    stats.normalized = records.len();

    let outcome = writer.upsert(&records).await;
    stats.upserted = outcome.written;
    stats.skipped = outcome.skipped;
    stats.chunk_errors = outcome.chunk_errors;

    mark_run_finished();
    tracing::info!(
        target: "ingest",
        raw = stats.raw,
        normalized = stats.normalized,
        upserted = stats.upserted,
        failed = stats.failed_sources.len(),
        "news ingest finished"
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_decodes_strips_and_collapses() {
        let s = "  <b>Grid</b>&nbsp;&nbsp;upgrade&amp;&#8220;storage&#8221;  ";
        assert_eq!(normalize_text(s), "Grid upgrade&\"storage\"");
    }

    #[test]
    fn normalize_text_keeps_trailing_punctuation() {
        assert_eq!(normalize_text("Is LNG back?"), "Is LNG back?");
    }

    #[test]
    fn normalize_text_caps_length() {
        let long = "a".repeat(2000);
        assert_eq!(normalize_text(&long).chars().count(), 1500);
    }
}
