// src/store/writer.rs
//! Chunked, retried, idempotent upserts.

use metrics::counter;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use super::{RecordStore, StoredRecord};

pub const DEFAULT_CHUNK_SIZE: usize = 200;
/// Upper bound for `with_retries`.
pub const MAX_ATTEMPTS: u8 = 10;

/// Result of one writer call. `written + skipped` always equals the input length.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub written: usize,
    pub skipped: usize,
    /// One message per chunk that still failed after retries.
    pub chunk_errors: Vec<String>,
}

#[derive(Clone)]
pub struct BatchUpsertWriter {
    store: Arc<dyn RecordStore>,
    table: String,
    chunk_size: usize,
    max_attempts: u8,
    backoff_base: Duration,
}

impl BatchUpsertWriter {
    pub fn new(store: Arc<dyn RecordStore>, table: impl Into<String>) -> Self {
        Self {
            store,
            table: table.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_attempts: 3,
            backoff_base: Duration::from_millis(500),
        }
    }

    pub fn with_chunk_size(mut self, n: usize) -> Self {
        self.chunk_size = n.max(1);
        self
    }

    pub fn with_retries(mut self, attempts: u8) -> Self {
        self.max_attempts = attempts.clamp(1, MAX_ATTEMPTS);
        self
    }

    pub fn with_backoff(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Invalid records and repeated conflict values are skipped; the rest go out in
    /// chunks. A failing chunk is retried, then recorded, and later chunks still run.
    pub async fn upsert<R: StoredRecord>(&self, records: &[R]) -> UpsertOutcome {
        let mut seen = HashSet::new();
        let rows: Vec<Value> = records
            .iter()
            .filter(|r| r.is_valid())
            .filter(|r| seen.insert(r.conflict_value()))
            .map(StoredRecord::to_row)
            .collect();

        let mut outcome = UpsertOutcome::default();
        for (i, chunk) in rows.chunks(self.chunk_size).enumerate() {
            match self.submit_chunk(chunk, R::CONFLICT_KEY).await {
                Ok(n) => {
                    outcome.written += n;
                    counter!("ingest_upserted_total").increment(n as u64);
                }
                Err(msg) => {
                    tracing::warn!(
                        target: "store",
                        table = %self.table,
                        chunk = i,
                        rows = chunk.len(),
                        error = %msg,
                        "chunk upsert failed"
                    );
                    counter!("ingest_chunk_failures_total").increment(1);
                    outcome.chunk_errors.push(format!("chunk {i}: {msg}"));
                }
            }
        }
        outcome.skipped = records.len().saturating_sub(outcome.written);
        outcome
    }

    /// `backoff_base << (attempt - 1)`, saturating.
    fn backoff(&self, attempt: u8) -> Duration {
        let factor = 1u32
            .checked_shl(u32::from(attempt.saturating_sub(1)))
            .unwrap_or(u32::MAX);
        self.backoff_base.saturating_mul(factor)
    }

    async fn submit_chunk(&self, chunk: &[Value], conflict_key: &str) -> Result<usize, String> {
        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            match self.store.upsert(&self.table, chunk, conflict_key).await {
                Ok(n) => return Ok(n),
                Err(e) => {
                    if attempt < self.max_attempts {
                        tracing::debug!(target: "store", attempt, error = ?e, "retrying chunk");
                        tokio::time::sleep(self.backoff(attempt)).await;
                        continue;
                    }
                    return Err(e.to_string());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::EventRecord;
    use crate::store::MemoryStore;
    use chrono::NaiveDate;

    fn ev(i: u32) -> EventRecord {
        EventRecord {
            title: format!("Event {i}"),
            region: Some("Malaysia".into()),
            city: Some("Kuala Lumpur".into()),
            venue: None,
            starts_on: NaiveDate::from_ymd_opt(2026, 1, i).unwrap(),
            ends_on: None,
            link: None,
            source: "AllConferenceAlert".into(),
        }
    }

    #[tokio::test]
    async fn invalid_and_repeated_records_are_skipped() {
        let store = Arc::new(MemoryStore::new());
        let w = BatchUpsertWriter::new(store.clone(), "events");
        let mut blank = ev(2);
        blank.title = "  ".into();
        let out = w.upsert(&[ev(1), blank, ev(1), ev(3)]).await;
        assert_eq!(out.written, 2);
        assert_eq!(out.skipped, 2);
        assert_eq!(store.len("events"), 2);
    }

    #[tokio::test]
    async fn rows_are_chunked() {
        let store = Arc::new(MemoryStore::new());
        let w = BatchUpsertWriter::new(store.clone(), "events").with_chunk_size(2);
        let recs: Vec<_> = (1..=5).map(ev).collect();
        let out = w.upsert(&recs).await;
        assert_eq!(out.written, 5);
        assert_eq!(store.upsert_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_is_retried() {
        let store = Arc::new(MemoryStore::new());
        store.fail_next(2);
        let w = BatchUpsertWriter::new(store.clone(), "events");
        let out = w.upsert(&[ev(1)]).await;
        assert_eq!(out.written, 1);
        assert!(out.chunk_errors.is_empty());
        assert_eq!(store.upsert_calls(), 3);
    }

    #[test]
    fn retries_are_capped_and_backoff_saturates() {
        let store = Arc::new(MemoryStore::new());
        let w = BatchUpsertWriter::new(store, "events").with_retries(200);
        assert_eq!(w.max_attempts, MAX_ATTEMPTS);
        assert_eq!(w.backoff(1), Duration::from_millis(500));
        assert_eq!(w.backoff(3), Duration::from_millis(2000));

        let huge = w.clone().with_backoff(Duration::MAX);
        assert_eq!(huge.backoff(40), Duration::MAX);
        assert_eq!(huge.backoff(u8::MAX), Duration::MAX);
    }
}
