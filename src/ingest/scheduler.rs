// src/ingest/scheduler.rs
use crate::ingest::Pipeline;
use metrics::counter;
use std::sync::Arc;
use tokio::task::JoinHandle;

#[derive(Clone, Copy, Debug)]
pub struct IngestSchedulerCfg {
    pub interval_secs: u64,
}

/// Spawn a background task running events then news ingestion every `interval_secs`.
/// Returns `None` when the interval is 0.
pub fn spawn_scheduler(cfg: IngestSchedulerCfg, pipeline: Arc<Pipeline>) -> Option<JoinHandle<()>> {
    if cfg.interval_secs == 0 {
        return None;
    }
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(cfg.interval_secs));
        loop {
            ticker.tick().await;
            let now = chrono::Utc::now();

            let events = pipeline.run_events(now.date_naive()).await;
            let news = pipeline.run_news(now).await;

            counter!("ingest_runs_total").increment(1);
            tracing::info!(
                target: "ingest",
                events_upserted = events.upserted,
                news_upserted = news.upserted,
                failed_sources = events.failed_sources.len() + news.failed_sources.len(),
                "scheduled ingest tick"
            );
        }
    }))
}
