use std::sync::Arc;

use serde_json::{json, Value};
use shuttle_axum::axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::ingest::scheduler::{spawn_scheduler, IngestSchedulerCfg};
use crate::ingest::Pipeline;
use crate::metrics::{disabled_router, Metrics};
use crate::store::{self, Order};

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
}

impl AppState {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self { pipeline }
    }
}

type ApiError = (StatusCode, Json<Value>);

/// Row cap for `/articles` when the caller gives no `limit`.
pub const DEFAULT_ARTICLES_LIMIT: usize = 1000;

fn storage_error(e: crate::error::StoreError) -> ApiError {
    tracing::warn!(target: "api", error = ?e, "storage query failed");
    (
        StatusCode::BAD_GATEWAY,
        Json(json!({ "error": e.to_string() })),
    )
}

/// Router with ingestion triggers and read-only listings. `/metrics` is served from
/// `metrics` when a recorder is installed.
pub fn router(state: AppState, metrics: Option<&Metrics>) -> Router {
    let metrics_routes = metrics.map(Metrics::router).unwrap_or_else(disabled_router);
    Router::new()
        .route("/health", get(health))
        .route("/articles", get(list_articles))
        .route("/refresh", post(refresh_news))
        .route("/events", get(list_events))
        .route("/refresh/events", post(refresh_events))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
        .merge(metrics_routes)
}

/// Full service: installs the Prometheus recorder, then starts the scheduler, then
/// builds the router. The recorder must exist before the first ingest run registers
/// metric descriptions.
pub fn app(pipeline: Arc<Pipeline>, schedule: IngestSchedulerCfg) -> Router {
    let metrics = match Metrics::init() {
        Ok(m) => Some(m),
        Err(e) => {
            tracing::warn!(target: "api", error = ?e, "prometheus recorder not installed");
            None
        }
    };
    if spawn_scheduler(schedule, pipeline.clone()).is_some() {
        tracing::info!(target: "ingest", interval_secs = schedule.interval_secs, "scheduler started");
    }
    router(AppState::new(pipeline), metrics.as_ref())
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "backend": state.pipeline.store().backend_name(),
    }))
}

#[derive(serde::Deserialize)]
struct ListParams {
    #[serde(default)]
    limit: Option<usize>,
}

/// Articles, newest first, at most `limit` (default [`DEFAULT_ARTICLES_LIMIT`]).
async fn list_articles(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Value>>, ApiError> {
    let q = store::Query::new()
        .order_by("published_at", Order::Desc)
        .limit(params.limit.unwrap_or(DEFAULT_ARTICLES_LIMIT));
    let rows = state
        .pipeline
        .store()
        .query(state.pipeline.articles_table(), &q)
        .await
        .map_err(storage_error)?;
    Ok(Json(rows))
}

/// Events starting today or later, soonest first.
async fn list_events(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Value>>, ApiError> {
    let today = chrono::Utc::now().date_naive().format("%Y-%m-%d").to_string();
    let mut q = store::Query::new()
        .gte("starts_on", today)
        .order_by("starts_on", Order::Asc);
    if let Some(n) = params.limit {
        q = q.limit(n);
    }
    let rows = state
        .pipeline
        .store()
        .query(state.pipeline.events_table(), &q)
        .await
        .map_err(storage_error)?;
    Ok(Json(rows))
}

async fn refresh_news(State(state): State<AppState>) -> Json<Value> {
    tracing::info!(target: "api", "news refresh requested");
    let stats = state.pipeline.run_news(chrono::Utc::now()).await;
    Json(json!({ "status": "updated", "stats": stats }))
}

async fn refresh_events(State(state): State<AppState>) -> Json<Value> {
    tracing::info!(target: "api", "events refresh requested");
    let stats = state
        .pipeline
        .run_events(chrono::Utc::now().date_naive())
        .await;
    Json(json!({ "ok": true, "stats": stats }))
}
