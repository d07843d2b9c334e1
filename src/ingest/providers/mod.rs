// src/ingest/providers/mod.rs
pub mod event_page;
pub mod rss_feed;

pub use event_page::{EventPageProvider, EventPageSource};
pub use rss_feed::{parse_feed, FeedSource, RssFeedProvider};
