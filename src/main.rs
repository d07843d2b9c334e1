//! ASEAN energy ingest service: binary entrypoint.
//! Loads config, wires transport + storage into the pipeline, and serves the Axum router.

use std::sync::Arc;

use anyhow::Context;
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use asean_energy_ingest::api;
use asean_energy_ingest::ingest::config::load_config_default;
use asean_energy_ingest::ingest::scheduler::IngestSchedulerCfg;
use asean_energy_ingest::ingest::Pipeline;
use asean_energy_ingest::store::{RecordStore, SupabaseStore};
use asean_energy_ingest::transport::{BrowserlessRenderer, PageRenderer, ReqwestFetcher};

/// Compact logs by default, JSON lines when `LOG_FORMAT=json`.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ingest=info,warn"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    let res = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    if let Err(e) = res {
        eprintln!("tracing already initialised: {e}");
    }
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = load_config_default().context("loading ingest config")?;
    config.validate().context("invalid ingest config")?;
    let (url, key) = config.storage_credentials().context("storage credentials")?;

    let store: Arc<dyn RecordStore> = Arc::new(SupabaseStore::new(&url, &key));
    let fetcher = Arc::new(ReqwestFetcher::new().context("building http client")?);
    let renderer: Option<Arc<dyn PageRenderer>> = match &config.events.browserless_url {
        Some(base) if config.events.render => Some(Arc::new(
            BrowserlessRenderer::new(base, config.events.browserless_token.as_deref())
                .context("building browserless client")?,
        )),
        _ => None,
    };

    let schedule = IngestSchedulerCfg {
        interval_secs: config.schedule.interval_secs,
    };
    let pipeline = Arc::new(Pipeline::from_config(config, store, fetcher, renderer));
    let router = api::app(pipeline, schedule);
    Ok(router.into())
}
