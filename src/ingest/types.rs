// src/ingest/types.rs
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FetchError;

/// One fetched listing page, consumed once by the extraction chain.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub url: String,
    pub source_label: String, // e.g. "AllConferenceAlert"
    pub fallback_region: String,
    pub html: String,
}

/// One syndication item as it came off the wire.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedEntry {
    pub title: Option<String>,
    pub link: Option<String>,
    /// Timestamp the feed supplied in a well-known format (RFC 2822 / RFC 3339).
    pub published: Option<DateTime<Utc>>,
    /// Raw timestamp text when it did not parse as a structured value.
    pub published_text: Option<String>,
    pub summary: Option<String>,
    /// Per-entry publisher metadata (`<source url="…">Name</source>`).
    pub source_name: Option<String>,
    pub source_url: Option<String>,
}

/// A fetched feed with its configured identity.
#[derive(Debug, Clone, Default)]
pub struct Feed {
    pub url: String,
    pub label: String,
    pub entries: Vec<FeedEntry>,
}

/// Unvalidated strings straight from a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedTuple {
    pub title_text: String,
    pub date_text: String,
    pub location_text: String,
    pub link: String,
    pub source_label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub title: String,
    pub region: Option<String>,
    pub city: Option<String>,
    pub venue: Option<String>,
    pub starts_on: NaiveDate,
    pub ends_on: Option<NaiveDate>,
    pub link: Option<String>,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsRecord {
    pub title: String,
    pub link: String, // canonical: scheme + host + path
    pub source: String,
    pub published_at: DateTime<Utc>,
    pub summary: String,
    pub topic: Vec<String>,   // matched keywords, sorted
    pub regions: Vec<String>, // priority-sorted
    pub primary_region: String,
}

/// Summary returned by every ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestStats {
    pub raw: usize,
    pub normalized: usize,
    pub upserted: usize,
    pub skipped: usize,
    #[serde(default)]
    pub failed_sources: Vec<String>,
    #[serde(default)]
    pub chunk_errors: Vec<String>,
}

/// Something that yields one listing page per call.
#[async_trait]
pub trait DocumentProvider: Send + Sync {
    async fn fetch_document(&self) -> Result<RawDocument, FetchError>;
    fn name(&self) -> &str;
}

/// Something that yields one parsed feed per call.
#[async_trait]
pub trait FeedProvider: Send + Sync {
    async fn fetch_feed(&self) -> Result<Feed, FetchError>;
    fn name(&self) -> &str;
}
