// src/ingest/dedup.rs
//! Logical record identity and batch-scoped duplicate removal.
//!
//! Identity is `(normalized title, normalized region or none, date)`. Normalization
//! lower-cases and collapses whitespace, so `Grid  Summit` and `grid summit` collide.
//! Storage enforces the same key through a unique constraint on its digest.

use chrono::NaiveDate;
use sha2::{Digest, Sha256};
use std::collections::HashSet;

use crate::ingest::types::{EventRecord, NewsRecord};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupeKey {
    pub title: String,
    pub region: Option<String>,
    pub date: NaiveDate,
}

pub fn normalize_key_text(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

impl DedupeKey {
    pub fn new(title: &str, region: Option<&str>, date: NaiveDate) -> Self {
        Self {
            title: normalize_key_text(title),
            region: region.map(normalize_key_text).filter(|r| !r.is_empty()),
            date,
        }
    }

    /// Stable hex digest used as the storage conflict column.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.title.as_bytes());
        hasher.update([0x1f]);
        hasher.update(self.region.as_deref().unwrap_or_default().as_bytes());
        hasher.update([0x1f]);
        hasher.update(self.date.format("%Y-%m-%d").to_string().as_bytes());
        let digest = hasher.finalize();
        let mut out = String::with_capacity(64);
        for b in digest.iter() {
            use std::fmt::Write as _;
            let _ = write!(&mut out, "{:02x}", b);
        }
        out
    }
}

pub trait Dedupe {
    fn dedupe_key(&self) -> DedupeKey;
}

impl Dedupe for EventRecord {
    fn dedupe_key(&self) -> DedupeKey {
        DedupeKey::new(&self.title, self.region.as_deref(), self.starts_on)
    }
}

impl Dedupe for NewsRecord {
    fn dedupe_key(&self) -> DedupeKey {
        DedupeKey::new(
            &self.title,
            Some(self.primary_region.as_str()),
            self.published_at.date_naive(),
        )
    }
}

/// Seen-key state for one ingestion batch.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashSet<DedupeKey>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` the first time a key is offered.
    pub fn admit(&mut self, key: DedupeKey) -> bool {
        self.seen.insert(key)
    }

    /// Keep the first record per key, in encounter order. Returns (kept, removed).
    pub fn dedupe<T: Dedupe>(&mut self, records: Vec<T>) -> (Vec<T>, usize) {
        let before = records.len();
        let kept: Vec<T> = records
            .into_iter()
            .filter(|r| self.admit(r.dedupe_key()))
            .collect();
        let removed = before - kept.len();
        (kept, removed)
    }
}
