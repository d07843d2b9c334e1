// src/store/supabase.rs
//! PostgREST (Supabase) adapter.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use super::{Query, RecordStore};
use crate::error::StoreError;

#[derive(Clone)]
pub struct SupabaseStore {
    base_url: String,
    service_key: String,
    client: Client,
    timeout: Duration,
}

impl SupabaseStore {
    pub fn new(base_url: &str, service_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
            client: Client::new(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .timeout(self.timeout)
    }
}

const ERROR_BODY_MAX_CHARS: usize = 300;

/// First `ERROR_BODY_MAX_CHARS` characters; error bodies often echo non-ASCII titles.
fn clip_error_body(body: &str) -> String {
    body.chars().take(ERROR_BODY_MAX_CHARS).collect()
}

async fn api_error(resp: reqwest::Response) -> StoreError {
    let status = resp.status().as_u16();
    let message = clip_error_body(&resp.text().await.unwrap_or_default());
    if status == 409 {
        StoreError::Conflict {
            key: String::new(),
            message,
        }
    } else {
        StoreError::Api { status, message }
    }
}

#[async_trait]
impl RecordStore for SupabaseStore {
    async fn upsert(
        &self,
        table: &str,
        rows: &[Value],
        conflict_key: &str,
    ) -> Result<usize, StoreError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let resp = self
            .authed(self.client.post(self.table_url(table)))
            .query(&[("on_conflict", conflict_key)])
            .header("Content-Type", "application/json")
            .header("Prefer", "return=representation,resolution=merge-duplicates")
            .json(rows)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(api_error(resp).await);
        }
        let echoed: Vec<Value> = resp.json().await?;
        Ok(echoed.len())
    }

    fn backend_name(&self) -> &'static str {
        "supabase"
    }

    async fn query(&self, table: &str, query: &Query) -> Result<Vec<Value>, StoreError> {
        let mut params: Vec<(String, String)> = vec![("select".into(), "*".into())];
        if let Some((col, min)) = &query.gte {
            params.push((col.clone(), format!("gte.{min}")));
        }
        if let Some((col, order)) = &query.order {
            params.push(("order".into(), format!("{col}.{}", order.as_str())));
        }
        if let Some(n) = query.limit {
            params.push(("limit".into(), n.to_string()));
        }

        let resp = self
            .authed(self.client.get(self.table_url(table)))
            .query(&params)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(api_error(resp).await);
        }
        Ok(resp.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_url_is_rest_v1() {
        let s = SupabaseStore::new("https://proj.supabase.co/", "k");
        assert_eq!(s.table_url("events"), "https://proj.supabase.co/rest/v1/events");
    }

    #[tokio::test]
    async fn multibyte_error_body_is_clipped_on_char_boundary() {
        let body = format!("{}ội tail", "x".repeat(299));
        let resp = reqwest::Response::from(
            http::Response::builder()
                .status(500)
                .body(body)
                .unwrap(),
        );
        match api_error(resp).await {
            StoreError::Api { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message.chars().count(), 300);
                assert!(message.ends_with('ộ'));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn conflict_status_maps_to_conflict() {
        let resp = reqwest::Response::from(
            http::Response::builder()
                .status(409)
                .body("duplicate key value violates unique constraint".to_string())
                .unwrap(),
        );
        assert!(matches!(api_error(resp).await, StoreError::Conflict { .. }));
    }
}
