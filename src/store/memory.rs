// src/store/memory.rs
//! In-process store with the same uniqueness and merge rules as the real table.

use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Mutex;

use super::{Order, Query, RecordStore};
use crate::error::StoreError;

#[derive(Default)]
struct Table {
    rows: Vec<Value>,
    index: HashMap<String, usize>,
}

/// Rows live in insertion order; a conflict merges the incoming object over the stored one.
/// A chunk that names the same key twice is rejected as a whole, and `fail_next` makes the
/// next N upsert calls fail with a 503.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<String, Table>>,
    fail_next: AtomicUsize,
    upsert_calls: AtomicUsize,
}

fn key_of(row: &Value, column: &str) -> Option<String> {
    match row.get(column)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn cmp_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Less,
        (_, None | Some(Value::Null)) => Ordering::Greater,
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, AtomicOrdering::SeqCst);
    }

    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(AtomicOrdering::SeqCst)
    }

    /// Snapshot of one table in insertion order.
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.tables
            .lock()
            .map(|t| t.get(table).map(|t| t.rows.clone()).unwrap_or_default())
            .unwrap_or_default()
    }

    pub fn len(&self, table: &str) -> usize {
        self.rows(table).len()
    }

    pub fn is_empty(&self, table: &str) -> bool {
        self.len(table) == 0
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn upsert(
        &self,
        table: &str,
        rows: &[Value],
        conflict_key: &str,
    ) -> Result<usize, StoreError> {
        self.upsert_calls.fetch_add(1, AtomicOrdering::SeqCst);
        let pending = self.fail_next.load(AtomicOrdering::SeqCst);
        if pending > 0 {
            self.fail_next.store(pending - 1, AtomicOrdering::SeqCst);
            return Err(StoreError::Api {
                status: 503,
                message: "injected failure".into(),
            });
        }

        let mut keys = Vec::with_capacity(rows.len());
        let mut in_chunk = HashSet::new();
        for row in rows {
            let key = key_of(row, conflict_key).ok_or_else(|| StoreError::Api {
                status: 400,
                message: format!("row without `{conflict_key}`"),
            })?;
            if !in_chunk.insert(key.clone()) {
                return Err(StoreError::Conflict {
                    key,
                    message: "upsert cannot affect the same row twice in one command".into(),
                });
            }
            keys.push(key);
        }

        let mut tables = self
            .tables
            .lock()
            .map_err(|_| StoreError::Network("memory store poisoned".into()))?;
        let t = tables.entry(table.to_string()).or_default();
        for (key, row) in keys.into_iter().zip(rows) {
            match t.index.get(&key) {
                Some(&i) => {
                    if let (Value::Object(stored), Value::Object(incoming)) = (&mut t.rows[i], row)
                    {
                        for (k, v) in incoming {
                            stored.insert(k.clone(), v.clone());
                        }
                    } else {
                        t.rows[i] = row.clone();
                    }
                }
                None => {
                    t.index.insert(key, t.rows.len());
                    t.rows.push(row.clone());
                }
            }
        }
        Ok(rows.len())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn query(&self, table: &str, query: &Query) -> Result<Vec<Value>, StoreError> {
        let mut out: Vec<Value> = self
            .rows(table)
            .into_iter()
            .filter(|row| match &query.gte {
                Some((col, min)) => {
                    cmp_values(row.get(col), Some(&Value::String(min.clone()))) != Ordering::Less
                }
                None => true,
            })
            .collect();

        if let Some((col, order)) = &query.order {
            out.sort_by(|a, b| {
                let o = cmp_values(a.get(col), b.get(col));
                match order {
                    Order::Asc => o,
                    Order::Desc => o.reverse(),
                }
            });
        }
        if let Some(n) = query.limit {
            out.truncate(n);
        }
        Ok(out)
    }
}
