// HTTP handlers: ping, version, metrics query, ingestion, systems, disk usage/history, container logs

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use super::AppState;
use super::auth::{Principal, bearer_token};
use super::error::ApiError;
use crate::identity::ModeRouter;
use crate::models::NewSystem;
use crate::store::LOCAL_KEY;
use crate::version::{NAME, VERSION};

const DEFAULT_HISTORY_LIMIT: u32 = 30;
const MAX_HISTORY_LIMIT: u32 = 1_000;
const DEFAULT_LOG_TAIL: u32 = 100;
const MAX_LOG_TAIL: u32 = 10_000;

fn hub(state: &AppState) -> Result<&ModeRouter, ApiError> {
    state.router.as_ref().ok_or(ApiError::NotFound("Not found"))
}

/// GET /version: returns service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
    }))
}

/// GET /api/v1/ping: unauthenticated liveness check.
pub(super) async fn ping_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
pub(super) struct MetricsQuery {
    system_id: Option<i64>,
}

/// GET /api/v1/metrics: this process's own snapshot, or with `system_id` (hub only) the
/// snapshot of a monitored system, pulled or read from pushed data.
pub(super) async fn metrics_handler(
    State(state): State<AppState>,
    principal: Principal,
    Query(q): Query<MetricsQuery>,
) -> Result<Response, ApiError> {
    let metrics = match q.system_id {
        Some(id) => hub(&state)?.query(principal.tenant, id).await?,
        None => state
            .store
            .get(LOCAL_KEY)
            .await
            .ok_or(ApiError::Unavailable("Collecting metrics..."))?,
    };
    Ok(Json(metrics.as_ref()).into_response())
}

/// POST /api/v1/ingest: a push agent delivers its snapshot.
pub(super) async fn ingest_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let router = hub(&state)?;
    let credential = bearer_token(&headers).unwrap_or_default();
    router.ingest(credential, &body).await?;
    Ok(Json(serde_json::json!({ "status": "ok" })))
}

/// GET /api/v1/systems
pub(super) async fn list_systems_handler(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<impl IntoResponse, ApiError> {
    let systems = hub(&state)?.systems().list(principal.tenant).await?;
    Ok(Json(systems))
}

/// POST /api/v1/systems: body `{ "name", "url", "api_key" }`; `url` is "push", "dynamic" or an agent URL.
pub(super) async fn add_system_handler(
    State(state): State<AppState>,
    principal: Principal,
    Json(new): Json<NewSystem>,
) -> Result<impl IntoResponse, ApiError> {
    if new.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name is required".into()));
    }
    if new.api_key.trim().is_empty() {
        return Err(ApiError::BadRequest("api_key is required".into()));
    }
    let system = hub(&state)?.systems().add(principal.tenant, &new).await?;
    tracing::info!(system_id = system.id, name = %system.name, push = system.mode.is_push(), "system added");
    Ok((StatusCode::CREATED, Json(system)))
}

/// DELETE /api/v1/systems/{id}
pub(super) async fn delete_system_handler(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if hub(&state)?.systems().delete(id, principal.tenant).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("System not found"))
    }
}

/// GET /api/v1/disk-usage: largest top-level folders from the last background scan.
pub(super) async fn disk_usage_handler(
    State(state): State<AppState>,
    _principal: Principal,
) -> impl IntoResponse {
    let snapshot = state.disk_usage.get().await;
    Json(serde_json::json!({
        "path": state.disk_usage.root().to_string_lossy(),
        "scanned_at": snapshot.scanned_at,
        "folders": snapshot.folders,
    }))
}

#[derive(Debug, Deserialize)]
pub(super) struct HistoryQuery {
    limit: Option<u32>,
}

/// GET /api/v1/disk-history?limit=N: newest first.
pub(super) async fn disk_history_handler(
    State(state): State<AppState>,
    _principal: Principal,
    Query(q): Query<HistoryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = q
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);
    let entries = state.history_repo.recent(limit).await?;
    Ok(Json(entries))
}

#[derive(Debug, Deserialize)]
pub(super) struct LogsQuery {
    tail: Option<u32>,
}

/// GET /api/v1/containers/{id}/logs?tail=N: combined stdout/stderr as plain text.
pub(super) async fn container_logs_handler(
    State(state): State<AppState>,
    _principal: Principal,
    Path(id): Path<String>,
    Query(q): Query<LogsQuery>,
) -> Result<Response, ApiError> {
    let docker = state
        .docker_repo
        .as_ref()
        .ok_or(ApiError::Unavailable("Docker is not available"))?;
    let tail = q.tail.unwrap_or(DEFAULT_LOG_TAIL).clamp(1, MAX_LOG_TAIL);
    let text = docker
        .container_logs(&id, tail)
        .await
        .map_err(|e| ApiError::BadGateway(format!("Failed to fetch logs: {e}")))?;
    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], text).into_response())
}
