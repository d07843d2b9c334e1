// src/ingest/providers/rss_feed.rs
//! RSS 2.0 and Atom feeds.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use metrics::histogram;
use quick_xml::de::from_str;
use serde::Deserialize;
use std::sync::Arc;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::OffsetDateTime;

use crate::error::FetchError;
use crate::ingest::types::{Feed, FeedEntry, FeedProvider};
use crate::transport::HttpFetcher;

/// One configured feed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeedSource {
    pub url: String,
    pub label: String,
}

/* ----------------------------
Wire shapes
---------------------------- */

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    source: Option<ItemSource>,
}

#[derive(Debug, Deserialize)]
struct ItemSource {
    #[serde(rename = "@url")]
    url: Option<String>,
    #[serde(rename = "$text")]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entry: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<String>,
    #[serde(rename = "link", default)]
    link: Vec<AtomLink>,
    published: Option<String>,
    updated: Option<String>,
    summary: Option<String>,
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

/* ----------------------------
Parsing
---------------------------- */

fn to_chrono(dt: OffsetDateTime) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(dt.unix_timestamp(), 0).single()
}

/// Structured timestamp when the text is RFC 2822 or RFC 3339; the raw text otherwise.
fn split_timestamp(raw: Option<String>) -> (Option<DateTime<Utc>>, Option<String>) {
    let Some(raw) = raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()) else {
        return (None, None);
    };
    let parsed = OffsetDateTime::parse(&raw, &Rfc2822)
        .or_else(|_| OffsetDateTime::parse(&raw, &Rfc3339))
        .ok()
        .and_then(to_chrono);
    match parsed {
        Some(dt) => (Some(dt), None),
        None => (None, Some(raw)),
    }
}

// HTML entities that are not predeclared in XML and would abort the parser.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}

fn nonempty(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn rss_entries(xml: &str) -> Result<Vec<FeedEntry>, quick_xml::DeError> {
    let rss: Rss = from_str(xml)?;
    Ok(rss
        .channel
        .item
        .into_iter()
        .map(|it| {
            let (published, published_text) = split_timestamp(it.pub_date);
            let (source_name, source_url) = match it.source {
                Some(s) => (nonempty(s.name), nonempty(s.url)),
                None => (None, None),
            };
            FeedEntry {
                title: nonempty(it.title),
                link: nonempty(it.link),
                published,
                published_text,
                summary: nonempty(it.description),
                source_name,
                source_url,
            }
        })
        .collect())
}

fn atom_entries(xml: &str) -> Result<Vec<FeedEntry>, quick_xml::DeError> {
    let atom: AtomFeed = from_str(xml)?;
    Ok(atom
        .entry
        .into_iter()
        .map(|e| {
            let link = e
                .link
                .iter()
                .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
                .or(e.link.first())
                .and_then(|l| l.href.clone());
            let (published, published_text) = split_timestamp(e.published.or(e.updated));
            FeedEntry {
                title: nonempty(e.title),
                link: nonempty(link),
                published,
                published_text,
                summary: nonempty(e.summary.or(e.content)),
                source_name: None,
                source_url: None,
            }
        })
        .collect())
}

/// Parse an RSS or Atom document into entries, in document order.
pub fn parse_feed(xml: &str) -> Result<Vec<FeedEntry>, quick_xml::DeError> {
    let clean = scrub_html_entities_for_xml(xml);
    let head: String = clean.chars().take(512).collect();
    if head.contains("<feed") && !head.contains("<rss") {
        atom_entries(&clean)
    } else {
        rss_entries(&clean)
    }
}

/* ----------------------------
Provider
---------------------------- */

enum Mode {
    Fixture(String),
    Http(Arc<dyn HttpFetcher>),
}

pub struct RssFeedProvider {
    source: FeedSource,
    mode: Mode,
}

impl RssFeedProvider {
    pub fn from_fixture(source: FeedSource, xml: &str) -> Self {
        Self {
            source,
            mode: Mode::Fixture(xml.to_string()),
        }
    }

    pub fn fetched(source: FeedSource, fetcher: Arc<dyn HttpFetcher>) -> Self {
        Self {
            source,
            mode: Mode::Http(fetcher),
        }
    }

    pub fn source(&self) -> &FeedSource {
        &self.source
    }

    async fn body(&self) -> Result<String, FetchError> {
        match &self.mode {
            Mode::Fixture(s) => Ok(s.clone()),
            Mode::Http(fetcher) => {
                let page = fetcher.fetch(&self.source.url).await?;
                if page.status != 200 {
                    return Err(FetchError::Status {
                        url: self.source.url.clone(),
                        status: page.status,
                    });
                }
                Ok(page.body)
            }
        }
    }
}

#[async_trait]
impl FeedProvider for RssFeedProvider {
    async fn fetch_feed(&self) -> Result<Feed, FetchError> {
        let body = self.body().await?;
        let t0 = std::time::Instant::now();
        let entries = parse_feed(&body).map_err(|e| FetchError::Parse {
            url: self.source.url.clone(),
            message: e.to_string(),
        })?;
        histogram!("ingest_extract_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        tracing::debug!(
            target: "ingest",
            feed = %self.source.label,
            entries = entries.len(),
            "feed parsed"
        );
        Ok(Feed {
            url: self.source.url.clone(),
            label: self.source.label.clone(),
            entries,
        })
    }

    fn name(&self) -> &str {
        &self.source.label
    }
}
