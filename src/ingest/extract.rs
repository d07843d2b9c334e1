// src/ingest/extract.rs
//! Ordered fallback chain that recovers `(date, title, location, link)` rows from a
//! listing page.
//!
//! Strategies, in order:
//! 1. `HeaderMatchedTable`: a table whose header mentions both "date" and "venue".
//! 2. `HeuristicTable`: the first table with a 3+ cell first row and at least two rows
//!    that parse as dates.
//! 3. `LooseText`: three adjacent text chunks shaped like date / title / location.
//!
//! The first strategy returning rows wins. Every strategy applies the same validity gate:
//! a non-empty title and a date the date normalizer accepts. Everything here is sync;
//! `scraper::Html` must not be held across an await.

use chrono::NaiveDate;
use metrics::{counter, histogram};
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::ExtractError;
use crate::ingest::types::{ExtractedTuple, RawDocument};
use crate::normalize::{infer_year_from_heading, normalize_partial_date};

const MIN_HEURISTIC_ROWS: usize = 2;
const MIN_LOOSE_TITLE_CHARS: usize = 4;
const MIN_LOOSE_LOCATION_CHARS: usize = 3;

/// What a strategy needs besides the parsed document.
#[derive(Debug, Clone)]
pub struct ExtractContext<'a> {
    pub page_url: &'a str,
    pub source_label: &'a str,
    pub fallback_year: Option<i32>,
    pub today: NaiveDate,
}

impl ExtractContext<'_> {
    fn date_parses(&self, text: &str) -> bool {
        normalize_partial_date(text, self.fallback_year, self.today).is_ok()
    }

    fn tuple(&self, date: String, title: String, location: String, link: String) -> Option<ExtractedTuple> {
        if title.is_empty() || !self.date_parses(&date) {
            return None;
        }
        Some(ExtractedTuple {
            title_text: title,
            date_text: date,
            location_text: location,
            link,
            source_label: self.source_label.to_string(),
        })
    }
}

pub trait ExtractionStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn attempt(&self, doc: &Html, ctx: &ExtractContext<'_>) -> Vec<ExtractedTuple>;
}

fn sel(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

/// Visible text with whitespace collapsed.
pub(crate) fn element_text(el: &ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolve `href` against the page; fall back to the page URL itself.
pub(crate) fn resolve_link(page_url: &str, href: Option<&str>) -> String {
    let href = href.map(str::trim).filter(|h| {
        !h.is_empty() && !h.starts_with('#') && !h.starts_with("javascript:") && !h.starts_with("mailto:")
    });
    let Some(href) = href else {
        return page_url.to_string();
    };
    match Url::parse(page_url) {
        Ok(base) => base
            .join(href)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| page_url.to_string()),
        Err(_) => Url::parse(href)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| page_url.to_string()),
    }
}

fn row_cells<'a>(tr: &ElementRef<'a>) -> Vec<ElementRef<'a>> {
    tr.children()
        .filter_map(ElementRef::wrap)
        .filter(|c| matches!(c.value().name(), "td" | "th"))
        .collect()
}

fn table_body<'a>(table: &ElementRef<'a>) -> ElementRef<'a> {
    table.select(&sel("tbody")).next().unwrap_or(*table)
}

/// `[date, title, venue, ..]` rows of one table that pass the validity gate.
fn rows_from_table(table: &ElementRef<'_>, ctx: &ExtractContext<'_>) -> Vec<ExtractedTuple> {
    let anchor = sel("a[href]");
    let mut out = Vec::new();
    for tr in table_body(table).select(&sel("tr")) {
        let cells = row_cells(&tr);
        if cells.len() < 3 {
            continue;
        }
        let title_anchor = cells[1].select(&anchor).next();
        let title = title_anchor
            .as_ref()
            .map(element_text)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| element_text(&cells[1]));
        let href = title_anchor
            .or_else(|| tr.select(&anchor).next())
            .and_then(|a| a.value().attr("href"));
        let link = resolve_link(ctx.page_url, href);

        if let Some(t) = ctx.tuple(element_text(&cells[0]), title, element_text(&cells[2]), link) {
            out.push(t);
        }
    }
    out
}

pub struct HeaderMatchedTable;

impl ExtractionStrategy for HeaderMatchedTable {
    fn name(&self) -> &'static str {
        "header_matched_table"
    }

    fn attempt(&self, doc: &Html, ctx: &ExtractContext<'_>) -> Vec<ExtractedTuple> {
        let th = sel("th");
        for table in doc.select(&sel("table")) {
            let header_line = table
                .select(&th)
                .map(|h| element_text(&h))
                .collect::<Vec<_>>()
                .join(" | ")
                .to_lowercase();
            if header_line.contains("date") && header_line.contains("venue") {
                return rows_from_table(&table, ctx);
            }
        }
        Vec::new()
    }
}

pub struct HeuristicTable;

impl ExtractionStrategy for HeuristicTable {
    fn name(&self) -> &'static str {
        "heuristic_table"
    }

    fn attempt(&self, doc: &Html, ctx: &ExtractContext<'_>) -> Vec<ExtractedTuple> {
        let tr = sel("tr");
        for table in doc.select(&sel("table")) {
            let Some(first_row) = table_body(&table).select(&tr).next() else {
                continue;
            };
            if row_cells(&first_row).len() < 3 {
                continue;
            }
            let rows = rows_from_table(&table, ctx);
            if rows.len() >= MIN_HEURISTIC_ROWS {
                return rows;
            }
        }
        Vec::new()
    }
}

pub struct LooseText;

impl ExtractionStrategy for LooseText {
    fn name(&self) -> &'static str {
        "loose_text"
    }

    fn attempt(&self, doc: &Html, ctx: &ExtractContext<'_>) -> Vec<ExtractedTuple> {
        let texts: Vec<String> = doc
            .select(&sel("div, li, p, span"))
            .map(|el| element_text(&el))
            .filter(|t| !t.is_empty())
            .collect();

        let mut out = Vec::new();
        for w in texts.windows(3) {
            let (date, title, location) = (&w[0], &w[1], &w[2]);
            if title.chars().count() <= MIN_LOOSE_TITLE_CHARS
                || location.chars().count() <= MIN_LOOSE_LOCATION_CHARS
            {
                continue;
            }
            if let Some(t) = ctx.tuple(
                date.clone(),
                title.clone(),
                location.clone(),
                ctx.page_url.to_string(),
            ) {
                out.push(t);
            }
        }
        out
    }
}

/// Rows recovered from one document, with what the assembler needs to re-read them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub strategy: &'static str,
    pub fallback_year: Option<i32>,
    pub tuples: Vec<ExtractedTuple>,
}

/// Ordered list of strategies; the first non-empty result wins.
pub struct ExtractionChain {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl Default for ExtractionChain {
    fn default() -> Self {
        Self::standard()
    }
}

impl ExtractionChain {
    pub fn new(strategies: Vec<Box<dyn ExtractionStrategy>>) -> Self {
        Self { strategies }
    }

    /// Header table → heuristic table → loose text.
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(HeaderMatchedTable),
            Box::new(HeuristicTable),
            Box::new(LooseText),
        ])
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Returns the winning strategy name with its rows.
    pub fn run(
        &self,
        doc: &Html,
        ctx: &ExtractContext<'_>,
    ) -> Result<(&'static str, Vec<ExtractedTuple>), ExtractError> {
        for strategy in &self.strategies {
            let rows = strategy.attempt(doc, ctx);
            tracing::debug!(
                target: "extract",
                strategy = strategy.name(),
                rows = rows.len(),
                url = ctx.page_url,
                "strategy attempted"
            );
            if !rows.is_empty() {
                return Ok((strategy.name(), rows));
            }
        }
        Err(ExtractError::EmptyExtraction {
            url: ctx.page_url.to_string(),
        })
    }

    /// Parse `document`, read the heading year, and run the chain.
    pub fn extract(
        &self,
        document: &RawDocument,
        today: NaiveDate,
    ) -> Result<Extraction, ExtractError> {
        let t0 = std::time::Instant::now();
        let html = Html::parse_document(&document.html);
        let fallback_year = html
            .select(&sel("h1, h2, h3"))
            .next()
            .and_then(|h| infer_year_from_heading(&element_text(&h)));

        let ctx = ExtractContext {
            page_url: &document.url,
            source_label: &document.source_label,
            fallback_year,
            today,
        };
        let result = self.run(&html, &ctx);

        histogram!("ingest_extract_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        match &result {
            Ok((strategy, rows)) => {
                counter!("ingest_tuples_extracted_total").increment(rows.len() as u64);
                tracing::info!(
                    target: "extract",
                    url = %document.url,
                    strategy = *strategy,
                    rows = rows.len(),
                    fallback_year = ?fallback_year,
                    "extracted rows"
                );
            }
            Err(e) => tracing::warn!(target: "extract", error = %e, "empty extraction"),
        }
        result.map(|(strategy, tuples)| Extraction {
            strategy,
            fallback_year,
            tuples,
        })
    }
}
