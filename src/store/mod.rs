// src/store/mod.rs
//! Durable storage boundary.
//!
//! The writer only ever talks to [`RecordStore`]; rows are plain JSON objects so the same
//! records can go to PostgREST or to the in-process [`MemoryStore`].

pub mod memory;
pub mod supabase;
pub mod writer;

pub use memory::MemoryStore;
pub use supabase::SupabaseStore;
pub use writer::{BatchUpsertWriter, UpsertOutcome};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::StoreError;
use crate::ingest::dedup::Dedupe;
use crate::ingest::types::{EventRecord, NewsRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    pub fn as_str(self) -> &'static str {
        match self {
            Order::Asc => "asc",
            Order::Desc => "desc",
        }
    }
}

/// Read-side query: one optional lower bound, one optional sort column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    /// `(column, value)`; rows with `column >= value` are kept.
    pub gte: Option<(String, String)>,
    pub order: Option<(String, Order)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gte(mut self, column: &str, value: impl Into<String>) -> Self {
        self.gte = Some((column.to_string(), value.into()));
        self
    }

    pub fn order_by(mut self, column: &str, order: Order) -> Self {
        self.order = Some((column.to_string(), order));
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert-or-merge `rows` on `conflict_key`. Returns the rows storage confirmed.
    async fn upsert(
        &self,
        table: &str,
        rows: &[Value],
        conflict_key: &str,
    ) -> Result<usize, StoreError>;

    async fn query(&self, table: &str, query: &Query) -> Result<Vec<Value>, StoreError>;

    /// Short name reported by the health endpoint.
    fn backend_name(&self) -> &'static str;
}

/// A record with a persisted row shape.
pub trait StoredRecord {
    /// Column the unique constraint lives on.
    const CONFLICT_KEY: &'static str;

    fn to_row(&self) -> Value;

    /// Minimal validity; failing records are counted as skipped and never sent.
    fn is_valid(&self) -> bool;

    fn conflict_value(&self) -> String;
}

impl StoredRecord for EventRecord {
    const CONFLICT_KEY: &'static str = "dedupe_key";

    fn to_row(&self) -> Value {
        json!({
            "title": self.title,
            "region": self.region,
            "city": self.city,
            "venue": self.venue,
            "starts_on": self.starts_on.format("%Y-%m-%d").to_string(),
            "ends_on": self.ends_on.map(|d| d.format("%Y-%m-%d").to_string()),
            "link": self.link,
            "source": self.source,
            "dedupe_key": self.conflict_value(),
        })
    }

    fn is_valid(&self) -> bool {
        !self.title.trim().is_empty()
    }

    fn conflict_value(&self) -> String {
        self.dedupe_key().digest()
    }
}

impl StoredRecord for NewsRecord {
    const CONFLICT_KEY: &'static str = "link";

    fn to_row(&self) -> Value {
        let keywords = if self.topic.is_empty() {
            "Energy".to_string()
        } else {
            self.topic.join(", ")
        };
        let region = if self.primary_region.trim().is_empty() {
            crate::normalize::GLOBAL_REGION.to_string()
        } else {
            self.primary_region.clone()
        };
        json!({
            "title": self.title,
            "link": self.link,
            "source": self.source,
            "published": self.published_at.date_naive().format("%Y-%m-%d").to_string(),
            "published_at": self.published_at.to_rfc3339(),
            "summary": self.summary,
            "keywords": keywords,
            "region": region,
            "regions": self.regions,
            "topic": self.topic,
        })
    }

    fn is_valid(&self) -> bool {
        !self.title.trim().is_empty() && !self.link.trim().is_empty()
    }

    fn conflict_value(&self) -> String {
        self.link.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};

    #[test]
    fn event_row_carries_dedupe_digest() {
        let ev = EventRecord {
            title: "Grid Summit".into(),
            region: Some("Singapore".into()),
            city: Some("Singapore".into()),
            venue: None,
            starts_on: NaiveDate::from_ymd_opt(2026, 3, 12).unwrap(),
            ends_on: None,
            link: None,
            source: "AllConferenceAlert".into(),
        };
        let row = ev.to_row();
        assert_eq!(row["starts_on"], "2026-03-12");
        assert_eq!(row["dedupe_key"].as_str().unwrap().len(), 64);
        assert!(row["ends_on"].is_null());
    }

    #[test]
    fn news_row_defaults_keywords_and_region() {
        let n = NewsRecord {
            title: "Power market update".into(),
            link: "https://x.test/a".into(),
            source: "X".into(),
            published_at: Utc.with_ymd_and_hms(2025, 10, 19, 8, 0, 0).unwrap(),
            summary: String::new(),
            topic: vec![],
            regions: vec![],
            primary_region: String::new(),
        };
        let row = n.to_row();
        assert_eq!(row["keywords"], "Energy");
        assert_eq!(row["region"], "Global");
        assert_eq!(row["published"], "2025-10-19");
        assert!(n.is_valid());
    }

    #[test]
    fn query_builder_sets_fields() {
        let q = Query::new()
            .gte("starts_on", "2025-10-19")
            .order_by("starts_on", Order::Asc)
            .limit(50);
        assert_eq!(q.gte, Some(("starts_on".into(), "2025-10-19".into())));
        assert_eq!(q.order.as_ref().map(|(_, o)| o.as_str()), Some("asc"));
        assert_eq!(q.limit, Some(50));
    }
}
