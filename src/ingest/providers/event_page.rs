// src/ingest/providers/event_page.rs
//! Conference listing pages, fetched statically or rendered in a browser.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::error::FetchError;
use crate::ingest::types::{DocumentProvider, RawDocument};
use crate::transport::{HttpFetcher, PageRenderer};

/// Shorter bodies are treated as a bot wall or an empty shell.
pub const MIN_PAGE_BYTES: usize = 500;
pub const DEFAULT_WAIT_SELECTOR: &str = "table tbody tr";
pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(15);

/// One configured listing page.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EventPageSource {
    pub url: String,
    pub label: String,
    pub region: String,
}

enum Mode {
    Fixture(String),
    Static(Arc<dyn HttpFetcher>),
    Rendered {
        renderer: Arc<dyn PageRenderer>,
        wait_selector: String,
        timeout: Duration,
    },
}

pub struct EventPageProvider {
    source: EventPageSource,
    mode: Mode,
}

impl EventPageProvider {
    pub fn from_fixture(source: EventPageSource, html: &str) -> Self {
        Self {
            source,
            mode: Mode::Fixture(html.to_string()),
        }
    }

    pub fn fetched(source: EventPageSource, fetcher: Arc<dyn HttpFetcher>) -> Self {
        Self {
            source,
            mode: Mode::Static(fetcher),
        }
    }

    pub fn rendered(source: EventPageSource, renderer: Arc<dyn PageRenderer>) -> Self {
        Self {
            source,
            mode: Mode::Rendered {
                renderer,
                wait_selector: DEFAULT_WAIT_SELECTOR.to_string(),
                timeout: DEFAULT_RENDER_TIMEOUT,
            },
        }
    }

    pub fn with_wait(mut self, selector: &str, timeout: Duration) -> Self {
        if let Mode::Rendered {
            wait_selector,
            timeout: t,
            ..
        } = &mut self.mode
        {
            *wait_selector = selector.to_string();
            *t = timeout;
        }
        self
    }

    pub fn source(&self) -> &EventPageSource {
        &self.source
    }

    async fn load_html(&self) -> Result<String, FetchError> {
        let url = self.source.url.as_str();
        match &self.mode {
            Mode::Fixture(html) => Ok(html.clone()),
            Mode::Static(fetcher) => {
                let page = fetcher.fetch(url).await?;
                if page.status != 200 {
                    return Err(FetchError::Status {
                        url: url.to_string(),
                        status: page.status,
                    });
                }
                if page.body.len() < MIN_PAGE_BYTES {
                    return Err(FetchError::Blocked {
                        url: url.to_string(),
                        bytes: page.body.len(),
                    });
                }
                Ok(page.body)
            }
            Mode::Rendered {
                renderer,
                wait_selector,
                timeout,
            } => renderer.render(url, wait_selector, *timeout).await,
        }
    }
}

#[async_trait]
impl DocumentProvider for EventPageProvider {
    async fn fetch_document(&self) -> Result<RawDocument, FetchError> {
        let html = self.load_html().await?;
        tracing::debug!(
            target: "ingest",
            url = %self.source.url,
            bytes = html.len(),
            "document loaded"
        );
        Ok(RawDocument {
            url: self.source.url.clone(),
            source_label: self.source.label.clone(),
            fallback_region: self.source.region.clone(),
            html,
        })
    }

    fn name(&self) -> &str {
        &self.source.label
    }
}
