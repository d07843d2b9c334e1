// src/ingest/pipeline.rs
//! Everything one ingestion run needs, assembled once and shared by the API and the
//! scheduler.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::sync::Arc;

use crate::ingest::assemble::NewsContext;
use crate::ingest::config::IngestConfig;
use crate::ingest::extract::ExtractionChain;
use crate::ingest::providers::{EventPageProvider, RssFeedProvider};
use crate::ingest::types::{DocumentProvider, FeedProvider, IngestStats};
use crate::normalize::RegionTable;
use crate::store::{BatchUpsertWriter, RecordStore};
use crate::transport::{HttpFetcher, PageRenderer};

pub struct Pipeline {
    config: IngestConfig,
    regions: RegionTable,
    chain: ExtractionChain,
    event_providers: Vec<Box<dyn DocumentProvider>>,
    feed_providers: Vec<Box<dyn FeedProvider>>,
    store: Arc<dyn RecordStore>,
}

impl Pipeline {
    /// Pipeline with no sources; add them with the `with_*` builders.
    pub fn new(config: IngestConfig, store: Arc<dyn RecordStore>) -> Self {
        Self {
            config,
            regions: RegionTable::asean(),
            chain: ExtractionChain::standard(),
            event_providers: Vec::new(),
            feed_providers: Vec::new(),
            store,
        }
    }

    /// Build providers for every configured page and feed. Pages go through `renderer`
    /// when one is given and rendering is enabled.
    pub fn from_config(
        config: IngestConfig,
        store: Arc<dyn RecordStore>,
        fetcher: Arc<dyn HttpFetcher>,
        renderer: Option<Arc<dyn PageRenderer>>,
    ) -> Self {
        let wait = std::time::Duration::from_secs(config.events.render_timeout_secs);
        let event_providers: Vec<Box<dyn DocumentProvider>> = config
            .events
            .pages
            .iter()
            .cloned()
            .map(|src| -> Box<dyn DocumentProvider> {
                match (&renderer, config.events.render) {
                    (Some(r), true) => Box::new(
                        EventPageProvider::rendered(src, r.clone())
                            .with_wait(&config.events.wait_selector, wait),
                    ),
                    _ => Box::new(EventPageProvider::fetched(src, fetcher.clone())),
                }
            })
            .collect();
        let feed_providers: Vec<Box<dyn FeedProvider>> = config
            .rss
            .feeds
            .iter()
            .cloned()
            .map(|src| -> Box<dyn FeedProvider> {
                Box::new(RssFeedProvider::fetched(src, fetcher.clone()))
            })
            .collect();

        Self {
            event_providers,
            feed_providers,
            ..Self::new(config, store)
        }
    }

    pub fn with_event_providers(mut self, providers: Vec<Box<dyn DocumentProvider>>) -> Self {
        self.event_providers = providers;
        self
    }

    pub fn with_feed_providers(mut self, providers: Vec<Box<dyn FeedProvider>>) -> Self {
        self.feed_providers = providers;
        self
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<dyn RecordStore> {
        self.store.clone()
    }

    pub fn events_table(&self) -> &str {
        &self.config.storage.events_table
    }

    pub fn articles_table(&self) -> &str {
        &self.config.storage.articles_table
    }

    pub async fn run_events(&self, today: NaiveDate) -> IngestStats {
        let writer = BatchUpsertWriter::new(self.store.clone(), self.events_table());
        super::run_events_ingest(&self.event_providers, &self.chain, &writer, today).await
    }

    /// No-op (empty stats) while RSS is disabled.
    pub async fn run_news(&self, now: DateTime<Utc>) -> IngestStats {
        if !self.config.rss.enabled {
            tracing::info!(target: "ingest", "rss disabled, skipping news ingest");
            return IngestStats::default();
        }
        let ctx = NewsContext {
            now,
            recency: Duration::try_days(self.config.rss.days_limit).unwrap_or(Duration::MAX),
            any_keywords: &self.config.keywords.any,
            all_keywords: &self.config.keywords.all,
            regions: &self.regions,
            max_items: self.config.rss.max_items,
        };
        let writer = BatchUpsertWriter::new(self.store.clone(), self.articles_table());
        super::run_news_ingest(&self.feed_providers, &ctx, &writer).await
    }
}
