// src/ingest/config.rs
//! Ingestion configuration: TOML file (or built-in seed) plus environment overrides.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::ingest::providers::{EventPageSource, FeedSource};

const ENV_PATH: &str = "INGEST_CONFIG_PATH";
const DEFAULT_PATH: &str = "config/ingest.toml";

/// Upper bound for the news recency window, in days.
pub const MAX_DAYS_LIMIT: i64 = 3650;

/// Placeholder meaning "read the value from the environment".
const FROM_ENV: &str = "ENV";

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct IngestConfig {
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub rss: RssConfig,
    #[serde(default)]
    pub keywords: KeywordConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct EventsConfig {
    #[serde(default)]
    pub pages: Vec<EventPageSource>,
    /// Render pages in a headless browser instead of a plain GET.
    #[serde(default)]
    pub render: bool,
    #[serde(default = "default_wait_selector")]
    pub wait_selector: String,
    #[serde(default = "default_render_timeout")]
    pub render_timeout_secs: u64,
    #[serde(default)]
    pub browserless_url: Option<String>,
    #[serde(default)]
    pub browserless_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RssConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    /// Recency window in days.
    #[serde(default = "default_days_limit")]
    pub days_limit: i64,
    #[serde(default)]
    pub feeds: Vec<FeedSource>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct KeywordConfig {
    #[serde(default)]
    pub any: Vec<String>,
    #[serde(default)]
    pub all: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StorageConfig {
    #[serde(default)]
    pub url: String,
    /// `"ENV"` reads `SUPABASE_SERVICE_KEY` at startup.
    #[serde(default = "default_service_key")]
    pub service_key: String,
    #[serde(default = "default_articles_table")]
    pub articles_table: String,
    #[serde(default = "default_events_table")]
    pub events_table: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ScheduleConfig {
    /// 0 disables the background scheduler.
    #[serde(default)]
    pub interval_secs: u64,
}

fn default_true() -> bool {
    true
}
fn default_max_items() -> usize {
    20
}
fn default_days_limit() -> i64 {
    7
}
fn default_wait_selector() -> String {
    crate::ingest::providers::event_page::DEFAULT_WAIT_SELECTOR.to_string()
}
fn default_render_timeout() -> u64 {
    15
}
fn default_service_key() -> String {
    FROM_ENV.into()
}
fn default_articles_table() -> String {
    "articles".into()
}
fn default_events_table() -> String {
    "events".into()
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            pages: Vec::new(),
            render: false,
            wait_selector: default_wait_selector(),
            render_timeout_secs: default_render_timeout(),
            browserless_url: None,
            browserless_token: None,
        }
    }
}

impl Default for RssConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_items: default_max_items(),
            days_limit: default_days_limit(),
            feeds: Vec::new(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            service_key: default_service_key(),
            articles_table: default_articles_table(),
            events_table: default_events_table(),
        }
    }
}

fn page(url: &str, region: &str) -> EventPageSource {
    EventPageSource {
        url: url.into(),
        label: "AllConferenceAlert".into(),
        region: region.into(),
    }
}

fn feed(label: &str, url: &str) -> FeedSource {
    FeedSource {
        url: url.into(),
        label: label.into(),
    }
}

fn gnews(site: &str) -> String {
    format!(
        "https://news.google.com/rss/search?q=site:{site}+when:7d&hl=en-SG&gl=SG&ceid=SG:en"
    )
}

impl IngestConfig {
    /// Built-in fallback covering the production listing pages and feeds.
    pub fn default_seed() -> Self {
        Self {
            events: EventsConfig {
                pages: vec![
                    page(
                        "https://www.allconferencealert.com/singapore/energy-conference.html",
                        "Singapore",
                    ),
                    page(
                        "https://www.allconferencealert.com/malaysia/energy-conference.html",
                        "Malaysia",
                    ),
                    page(
                        "https://www.allconferencealert.com/philippines/energy-conference.html",
                        "Philippines",
                    ),
                ],
                ..EventsConfig::default()
            },
            rss: RssConfig {
                feeds: vec![
                    feed("Eco-Business", "https://www.eco-business.com/feeds/news/"),
                    feed("Asian Power", &gnews("asian-power.com")),
                    feed("IEMOP", &gnews("iemop.ph")),
                    feed("Power Philippines", "https://powerphilippines.com/feed/"),
                    feed("Business Times", &gnews("businesstimes.com.sg")),
                    feed("The Edge Malaysia", &gnews("theedgemalaysia.com")),
                    feed("Reuters", &gnews("reuters.com")),
                ],
                ..RssConfig::default()
            },
            keywords: KeywordConfig {
                any: [
                    "engie",
                    "solar",
                    "energy",
                    "hydrogen",
                    "grid",
                    "wind",
                    "carbon",
                    "LNG",
                    "district cooling",
                    "fuel",
                    "policy",
                    "regulation",
                    "emissions",
                    "renewable",
                    "storage",
                    "power",
                    "electricity",
                ]
                .iter()
                .map(|s| s.to_string())
                .collect(),
                all: Vec::new(),
            },
            storage: StorageConfig::default(),
            schedule: ScheduleConfig::default(),
        }
    }

    /// Resolved `(url, service_key)`. Missing values are a startup error.
    pub fn storage_credentials(&self) -> Result<(String, String), ConfigError> {
        let url = self.storage.url.trim();
        if url.is_empty() {
            return Err(ConfigError::Missing("SUPABASE_URL"));
        }
        let key = if self.storage.service_key.trim() == FROM_ENV {
            std::env::var("SUPABASE_SERVICE_KEY").unwrap_or_default()
        } else {
            self.storage.service_key.trim().to_string()
        };
        if key.is_empty() {
            return Err(ConfigError::Missing("SUPABASE_SERVICE_KEY"));
        }
        Ok((url.trim_end_matches('/').to_string(), key))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_DAYS_LIMIT).contains(&self.rss.days_limit) {
            return Err(ConfigError::Invalid(format!(
                "rss.days_limit must be within 1..={MAX_DAYS_LIMIT}, got {}",
                self.rss.days_limit
            )));
        }
        if self.events.render && self.events.browserless_url.is_none() {
            return Err(ConfigError::Missing("BROWSERLESS_URL"));
        }
        self.storage_credentials().map(|_| ())
    }

    /// Apply the recognised environment variables on top of the file values.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(v) = env_nonempty("DAYS_LIMIT") {
            self.rss.days_limit = v.parse().with_context(|| format!("DAYS_LIMIT={v}"))?;
        }
        if let Some(v) = env_nonempty("RSS_ENABLED") {
            self.rss.enabled = parse_bool(&v).ok_or_else(|| anyhow!("RSS_ENABLED={v}"))?;
        }
        if let Some(v) = env_nonempty("RSS_MAX_ITEMS") {
            self.rss.max_items = v.parse().with_context(|| format!("RSS_MAX_ITEMS={v}"))?;
        }
        if let Some(v) = env_nonempty("TITLE_KEYWORDS_ANY") {
            self.keywords.any = split_csv(&v);
        }
        if let Some(v) = env_nonempty("TITLE_KEYWORDS_ALL") {
            self.keywords.all = split_csv(&v);
        }
        if let Some(v) = env_nonempty("SUPABASE_URL") {
            self.storage.url = v;
        }
        if let Some(v) = env_nonempty("SUPABASE_SERVICE_KEY") {
            self.storage.service_key = v;
        }
        if let Some(v) = env_nonempty("SUPABASE_TABLE") {
            self.storage.articles_table = v;
        }
        if let Some(v) = env_nonempty("INGEST_SCHEDULE_SECS") {
            self.schedule.interval_secs = v
                .parse()
                .with_context(|| format!("INGEST_SCHEDULE_SECS={v}"))?;
        }
        if let Some(v) = env_nonempty("BROWSERLESS_URL") {
            self.events.browserless_url = Some(v);
            self.events.render = true;
        }
        if let Some(v) = env_nonempty("BROWSERLESS_TOKEN") {
            self.events.browserless_token = Some(v);
        }
        Ok(())
    }
}

fn env_nonempty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

/// Load config from an explicit TOML path (no env overrides).
pub fn load_config_from(path: &Path) -> Result<IngestConfig> {
    let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

/// Load config using env var + fallbacks, then apply env overrides:
/// 1) $INGEST_CONFIG_PATH
/// 2) config/ingest.toml
/// 3) built-in seed
pub fn load_config_default() -> Result<IngestConfig> {
    let mut cfg = if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if !pb.exists() {
            return Err(anyhow!("{ENV_PATH} points to non-existent path"));
        }
        load_config_from(&pb)?
    } else {
        let default = PathBuf::from(DEFAULT_PATH);
        if default.exists() {
            load_config_from(&default)?
        } else {
            IngestConfig::default_seed()
        }
    };
    cfg.apply_env_overrides()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_has_sources_and_keywords() {
        let cfg = IngestConfig::default_seed();
        assert_eq!(cfg.events.pages.len(), 3);
        assert_eq!(cfg.events.pages[2].region, "Philippines");
        assert_eq!(cfg.rss.feeds.len(), 7);
        assert!(cfg.keywords.any.iter().any(|k| k == "LNG"));
        assert_eq!(cfg.rss.max_items, 20);
        assert_eq!(cfg.rss.days_limit, 7);
    }

    #[test]
    fn partial_toml_takes_defaults() {
        let cfg: IngestConfig = toml::from_str(
            r#"
            [rss]
            max_items = 5

            [[rss.feeds]]
            url = "https://eco.test/feed"
            label = "Eco"

            [storage]
            url = "https://db.test"
            service_key = "secret"
            "#,
        )
        .unwrap();
        assert!(cfg.rss.enabled);
        assert_eq!(cfg.rss.max_items, 5);
        assert_eq!(cfg.rss.days_limit, 7);
        assert_eq!(cfg.storage.events_table, "events");
        assert_eq!(
            cfg.storage_credentials().unwrap(),
            ("https://db.test".to_string(), "secret".to_string())
        );
    }

    #[test]
    fn missing_storage_url_is_a_config_error() {
        let cfg = IngestConfig::default_seed();
        assert!(matches!(
            cfg.storage_credentials(),
            Err(ConfigError::Missing("SUPABASE_URL"))
        ));
    }

    #[test]
    fn days_limit_outside_range_is_invalid() {
        let mut cfg = IngestConfig::default_seed();
        cfg.storage.url = "https://db.test".into();
        cfg.storage.service_key = "secret".into();
        cfg.validate().unwrap();

        for bad in [0, -1, MAX_DAYS_LIMIT + 1, 200_000_000] {
            cfg.rss.days_limit = bad;
            assert!(
                matches!(cfg.validate(), Err(ConfigError::Invalid(_))),
                "days_limit {bad} accepted"
            );
        }
        cfg.rss.days_limit = MAX_DAYS_LIMIT;
        cfg.validate().unwrap();
    }

    #[test]
    fn csv_and_bool_helpers() {
        assert_eq!(split_csv(" solar, ,wind "), vec!["solar", "wind"]);
        assert_eq!(parse_bool("Off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
