// src/ingest/assemble.rs
//! Record assembly: validated tuples / feed entries → canonical records.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Timelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use url::Url;

use crate::error::NormalizeError;
use crate::ingest::extract::Extraction;
use crate::ingest::keywords;
use crate::ingest::normalize_text;
use crate::ingest::types::{EventRecord, ExtractedTuple, Feed, FeedEntry, NewsRecord};
use crate::normalize::{
    infer_regions_with_fallback, normalize_location, normalize_partial_date, primary_region,
    RegionTable,
};

/// Summaries longer than this are cut.
pub const SUMMARY_MAX_CHARS: usize = 300;

const AGGREGATOR_HOST: &str = "news.google.com";

/* ----------------------------
Events
---------------------------- */

/// Build one `EventRecord`; `venue` stays unset because the location text is consumed
/// into city/region.
pub fn assemble_event(
    tuple: &ExtractedTuple,
    fallback_year: Option<i32>,
    fallback_region: &str,
    today: NaiveDate,
) -> Result<EventRecord, NormalizeError> {
    let title = tuple.title_text.trim().to_string();
    if title.is_empty() {
        return Err(NormalizeError::EmptyTitle);
    }
    let span = normalize_partial_date(&tuple.date_text, fallback_year, today)?;
    let loc = normalize_location(&tuple.location_text, Some(fallback_region))?;
    let link = Some(tuple.link.trim().to_string()).filter(|l| !l.is_empty());

    Ok(EventRecord {
        title,
        region: loc.region,
        city: loc.city,
        venue: None,
        starts_on: span.start,
        ends_on: span.end,
        link,
        source: tuple.source_label.clone(),
    })
}

/// Assemble every tuple of one extraction, dropping the ones that fail normalization.
/// Returns the records and the number dropped.
pub fn assemble_events(
    extraction: &Extraction,
    fallback_region: &str,
    today: NaiveDate,
) -> (Vec<EventRecord>, usize) {
    let mut dropped = 0usize;
    let mut out = Vec::with_capacity(extraction.tuples.len());
    for t in &extraction.tuples {
        match assemble_event(t, extraction.fallback_year, fallback_region, today) {
            Ok(rec) => out.push(rec),
            Err(e) => {
                tracing::debug!(target: "ingest", error = %e, title = %t.title_text, "tuple dropped");
                dropped += 1;
            }
        }
    }
    (out, dropped)
}

/* ----------------------------
News
---------------------------- */

/// `scheme://host/path` without query or fragment. Unparseable input is returned trimmed.
pub fn canonical_url(u: &str) -> String {
    let u = u.trim();
    match Url::parse(u) {
        Ok(mut url) => {
            url.set_query(None);
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => u.to_string(),
    }
}

pub fn host_of(u: &str) -> String {
    Url::parse(u.trim())
        .ok()
        .and_then(|p| p.host_str().map(str::to_string))
        .unwrap_or_default()
}

pub fn is_aggregator(u: &str) -> bool {
    host_of(u).ends_with(AGGREGATOR_HOST)
}

static RE_PUBLISHER_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s[-\x{2013}]\s([^\x{2013}-]+)$").expect("publisher suffix regex")
});

/// Real publisher behind an aggregator entry: entry metadata, then a trailing
/// ` - Publisher` in the title, then `fallback`.
pub fn repair_source_label(entry: &FeedEntry, title: &str, fallback: &str) -> String {
    let meta = entry
        .source_name
        .as_deref()
        .or(entry.source_url.as_deref())
        .map(str::trim)
        .filter(|s| !s.is_empty());
    if let Some(m) = meta {
        return m.to_string();
    }
    if let Some(c) = RE_PUBLISHER_SUFFIX.captures(title) {
        let p = c[1].trim();
        if !p.is_empty() {
            return p.to_string();
        }
    }
    fallback.to_string()
}

fn to_second(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.with_nanosecond(0).unwrap_or(dt)
}

/// Best-effort parse of a free-text timestamp. Naive values are taken as UTC.
pub fn parse_timestamp_text(text: &str) -> Option<DateTime<Utc>> {
    let s = text.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S %z", "%a, %d %b %Y %H:%M:%S %z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%d %b %Y %H:%M",
        "%a, %d %b %Y %H:%M:%S",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.and_utc());
        }
    }
    for fmt in ["%Y-%m-%d", "%d %b %Y", "%d %B %Y", "%b %d, %Y", "%B %d, %Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
    }
    None
}

/// Structured feed timestamp, else free text, else `now`; UTC, second precision.
pub fn resolve_published(entry: &FeedEntry, now: DateTime<Utc>) -> DateTime<Utc> {
    let ts = entry
        .published
        .or_else(|| entry.published_text.as_deref().and_then(parse_timestamp_text))
        .unwrap_or(now);
    to_second(ts)
}

/// Per-run inputs for news assembly.
pub struct NewsContext<'a> {
    pub now: DateTime<Utc>,
    pub recency: Duration,
    pub any_keywords: &'a [String],
    pub all_keywords: &'a [String],
    pub regions: &'a RegionTable,
    /// Max kept entries per feed; 0 means unlimited.
    pub max_items: usize,
}

/// Counters from one feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NewsAssembly {
    pub kept: usize,
    pub dropped: usize,
}

/// Assemble the entries of one feed. `seen_links` carries canonical links (lower-cased)
/// across feeds of the same run so the first occurrence wins.
pub fn assemble_news(
    feed: &Feed,
    ctx: &NewsContext<'_>,
    seen_links: &mut HashSet<String>,
) -> (Vec<NewsRecord>, NewsAssembly) {
    // No lower bound when the window reaches past the representable range.
    let since = ctx.now.checked_sub_signed(ctx.recency);
    let feed_is_aggregator = is_aggregator(&feed.url);
    let mut stats = NewsAssembly::default();
    let mut out = Vec::new();

    for entry in &feed.entries {
        if ctx.max_items > 0 && stats.kept >= ctx.max_items {
            break;
        }

        let title = normalize_text(entry.title.as_deref().unwrap_or_default());
        let link = canonical_url(entry.link.as_deref().unwrap_or_default());
        if title.is_empty() || link.is_empty() || seen_links.contains(&link.to_lowercase()) {
            stats.dropped += 1;
            continue;
        }

        let gate = keywords::matches(&title, ctx.any_keywords, ctx.all_keywords);
        if !gate.keep {
            stats.dropped += 1;
            continue;
        }

        let aggregator = feed_is_aggregator || is_aggregator(&link);
        let base_label = if feed.label.trim().is_empty() {
            host_of(&link)
        } else {
            feed.label.clone()
        };
        let source = if aggregator {
            repair_source_label(entry, &title, &base_label)
        } else {
            base_label
        };

        let published_at = resolve_published(entry, ctx.now);
        if since.is_some_and(|since| published_at < since) {
            stats.dropped += 1;
            continue;
        }

        let summary = if aggregator {
            String::new()
        } else {
            normalize_text(entry.summary.as_deref().unwrap_or_default())
                .chars()
                .take(SUMMARY_MAX_CHARS)
                .collect()
        };

        let regions = infer_regions_with_fallback(&title, &source, &link, ctx.regions);
        let primary = primary_region(&regions, ctx.regions);

        seen_links.insert(link.to_lowercase());
        out.push(NewsRecord {
            title,
            link,
            source,
            published_at,
            summary,
            topic: gate.matched,
            regions,
            primary_region: primary,
        });
        stats.kept += 1;
    }

    (out, stats)
}
