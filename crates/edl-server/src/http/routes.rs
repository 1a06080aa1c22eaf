use super::{AppResult, AppState, JsonResponse};
use crate::report;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use edl_core::OutputFormat;
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::info;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(edl_values))
        .route("/update-edl", post(update_edl))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// The list itself, as polled by firewalls.
async fn edl_values(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    state.metrics.record_request("edl");
    let snapshot = state.service.serve().await?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, snapshot.content_type())],
        snapshot.render(),
    ))
}

#[derive(Deserialize)]
struct UpdateRequest {
    query: String,
    format: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct UpdateResponse {
    pub indicators: Vec<String>,
    pub count: usize,
    pub readable: String,
}

/// Manual rebuild; only allowed when the list is on-demand.
async fn update_edl(
    State(state): State<AppState>,
    payload: Result<Json<UpdateRequest>, JsonRejection>,
) -> AppResult<Json<JsonResponse<UpdateResponse>>> {
    state.metrics.record_request("update-edl");
    let Json(req) = payload?;

    let format = match req.format.as_deref() {
        Some(f) => f.parse::<OutputFormat>()?,
        None => state.service.settings().format,
    };
    let snapshot = state.service.update_on_demand(&req.query, format).await?;
    info!(
        "EDL updated on demand: query={:?} format={} indicators={}",
        req.query, format, snapshot.indicator_count
    );

    let values = snapshot.values();
    Ok(Json(JsonResponse::ok(UpdateResponse {
        readable: report::update_table(&values),
        indicators: values.into_iter().map(str::to_string).collect(),
        count: snapshot.indicator_count,
    })))
}

#[derive(Serialize, Deserialize)]
pub struct CacheStatus {
    pub format: OutputFormat,
    pub indicators: usize,
    pub refreshed_at: Option<DateTime<Utc>>,
    pub on_demand: bool,
    pub refresh_rate: String,
    pub source: String,
}

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: String,
    pub uptime_seconds: u64,
    pub cache: CacheStatus,
}

async fn health(State(state): State<AppState>) -> Json<JsonResponse<HealthResponse>> {
    let snapshot = state.service.snapshot();
    let settings = state.service.settings();

    Json(JsonResponse::ok(HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        cache: CacheStatus {
            format: snapshot.format,
            indicators: snapshot.indicator_count,
            refreshed_at: snapshot.refreshed_at,
            on_demand: settings.on_demand,
            refresh_rate: settings.refresh_rate.to_string(),
            source: state.service.source_name().to_string(),
        },
    }))
}

async fn metrics(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    state
        .metrics
        .uptime_seconds
        .set(state.start_time.elapsed().as_secs() as i64);
    let body = state
        .metrics
        .encode()
        .map_err(|e| anyhow::anyhow!("failed to encode metrics: {}", e))?;
    Ok((
        [(
            header::CONTENT_TYPE,
            "application/openmetrics-text; version=1.0.0; charset=utf-8",
        )],
        body,
    ))
}
