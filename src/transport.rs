// src/transport.rs
//! Outbound document transport: plain HTTP fetches and browser-rendered pages.
//!
//! Both sides are traits so providers can run against canned bodies in tests
//! ([`StaticFetcher`]) and against the network in the binary.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER, USER_AGENT};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::error::FetchError;

pub const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";
const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(25);

/// Status code and body of one GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub status: u16,
    pub body: String,
}

#[async_trait]
pub trait HttpFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError>;
}

/// Loads a page in a headless browser and returns the DOM once `wait_selector` matches.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(
        &self,
        url: &str,
        wait_selector: &str,
        timeout: Duration,
    ) -> Result<String, FetchError>;
}

fn network_error(url: &str, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
            secs: DEFAULT_FETCH_TIMEOUT.as_secs(),
        }
    } else {
        FetchError::Network {
            url: url.to_string(),
            message: e.to_string(),
        }
    }
}

/* ----------------------------
reqwest
---------------------------- */

/// GET with browser-like headers. Non-200 responses are returned, not raised, so the
/// caller can decide what counts as blocked.
#[derive(Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_timeout(DEFAULT_FETCH_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(DESKTOP_USER_AGENT));
        headers.insert(REFERER, HeaderValue::from_static("https://www.google.com/"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| network_error(url, e))?;
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(|e| network_error(url, e))?;
        tracing::debug!(target: "ingest", url, status, bytes = body.len(), "fetched");
        Ok(FetchedPage { status, body })
    }
}

/* ----------------------------
Browserless
---------------------------- */

/// Browserless `/content` endpoint with a `waitForSelector` readiness condition.
#[derive(Clone)]
pub struct BrowserlessRenderer {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl BrowserlessRenderer {
    pub fn new(base_url: &str, token: Option<&str>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(String::from),
        })
    }

    fn endpoint(&self) -> String {
        let mut endpoint = format!("{}/content", self.base_url);
        if let Some(ref token) = self.token {
            endpoint.push_str(&format!("?token={token}"));
        }
        endpoint
    }

    async fn content(
        &self,
        url: &str,
        wait_selector: &str,
        timeout: Duration,
    ) -> Result<String, FetchError> {
        let body = serde_json::json!({
            "url": url,
            "userAgent": DESKTOP_USER_AGENT,
            "gotoOptions": { "waitUntil": "domcontentloaded" },
            "waitForSelector": {
                "selector": wait_selector,
                "timeout": timeout.as_millis() as u64,
            },
        });

        let resp = self
            .client
            .post(self.endpoint())
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| network_error(url, e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        resp.text().await.map_err(|e| network_error(url, e))
    }
}

#[async_trait]
impl PageRenderer for BrowserlessRenderer {
    async fn render(
        &self,
        url: &str,
        wait_selector: &str,
        timeout: Duration,
    ) -> Result<String, FetchError> {
        // Outer bound covers navigation as well as the selector wait.
        let outer = timeout + Duration::from_secs(10);
        match tokio::time::timeout(outer, self.content(url, wait_selector, timeout)).await {
            Ok(res) => res,
            Err(_) => Err(FetchError::Timeout {
                url: url.to_string(),
                secs: outer.as_secs(),
            }),
        }
    }
}

/* ----------------------------
Canned transport
---------------------------- */

enum Canned {
    Page(FetchedPage),
    Fail(fn(&str) -> FetchError),
}

/// In-memory transport keyed by URL. Unknown URLs yield a network error.
/// Serves both plain fetches and renders; `render` ignores the selector.
#[derive(Default)]
pub struct StaticFetcher {
    pages: Mutex<HashMap<String, Canned>>,
    hits: Mutex<Vec<String>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: &str, status: u16, body: impl Into<String>) -> Self {
        if let Ok(mut pages) = self.pages.lock() {
            pages.insert(
                url.to_string(),
                Canned::Page(FetchedPage {
                    status,
                    body: body.into(),
                }),
            );
        }
        self
    }

    pub fn with_timeout(self, url: &str) -> Self {
        if let Ok(mut pages) = self.pages.lock() {
            pages.insert(
                url.to_string(),
                Canned::Fail(|u| FetchError::Timeout {
                    url: u.to_string(),
                    secs: 15,
                }),
            );
        }
        self
    }

    /// URLs requested so far, in call order.
    pub fn hits(&self) -> Vec<String> {
        self.hits.lock().map(|h| h.clone()).unwrap_or_default()
    }

    fn lookup(&self, url: &str) -> Result<FetchedPage, FetchError> {
        if let Ok(mut hits) = self.hits.lock() {
            hits.push(url.to_string());
        }
        let pages = self.pages.lock().map_err(|_| FetchError::Network {
            url: url.to_string(),
            message: "canned transport poisoned".into(),
        })?;
        match pages.get(url) {
            Some(Canned::Page(p)) => Ok(p.clone()),
            Some(Canned::Fail(make)) => Err(make(url)),
            None => Err(FetchError::Network {
                url: url.to_string(),
                message: "no canned response".into(),
            }),
        }
    }
}

#[async_trait]
impl HttpFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        self.lookup(url)
    }
}

#[async_trait]
impl PageRenderer for StaticFetcher {
    async fn render(
        &self,
        url: &str,
        _wait_selector: &str,
        _timeout: Duration,
    ) -> Result<String, FetchError> {
        let page = self.lookup(url)?;
        if page.status != 200 {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: page.status,
            });
        }
        Ok(page.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_fetcher_serves_and_records() {
        let f = StaticFetcher::new()
            .with_page("https://a.test/", 200, "<html></html>")
            .with_timeout("https://slow.test/");

        let p = f.fetch("https://a.test/").await.unwrap();
        assert_eq!(p.status, 200);
        assert!(matches!(
            f.fetch("https://slow.test/").await,
            Err(FetchError::Timeout { .. })
        ));
        assert!(matches!(
            f.fetch("https://missing.test/").await,
            Err(FetchError::Network { .. })
        ));
        assert_eq!(f.hits().len(), 3);
    }

    #[tokio::test]
    async fn render_rejects_non_200() {
        let f = StaticFetcher::new().with_page("https://b.test/", 403, "denied");
        let err = f
            .render("https://b.test/", "table tbody tr", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 403, .. }));
    }

    #[test]
    fn browserless_endpoint_carries_token() {
        let r = BrowserlessRenderer::new("https://chrome.test/", Some("k")).unwrap();
        assert_eq!(r.endpoint(), "https://chrome.test/content?token=k");
    }
}
