// HTTP + WebSocket routes

mod auth;
mod error;
mod http;
mod ws;

use axum::{
    Router,
    routing::{delete, get, post},
};
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::disk_usage::DiskUsageCache;
use crate::docker_repo::DockerRepo;
use crate::history_repo::HistoryRepo;
use crate::identity::ModeRouter;
use crate::models::SystemMetrics;
use crate::store::MetricStore;

/// Everything the HTTP layer needs. `router` is set only in the hub role and gates the
/// ingestion and system-record endpoints.
pub struct AppDeps {
    pub api_key: String,
    pub store: Arc<MetricStore>,
    pub metrics_tx: broadcast::Sender<Arc<SystemMetrics>>,
    pub ws_metrics_connections: Arc<AtomicUsize>,
    pub disk_usage: Arc<DiskUsageCache>,
    pub history_repo: Arc<HistoryRepo>,
    pub docker_repo: Option<Arc<DockerRepo>>,
    pub router: Option<ModeRouter>,
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) api_key: Arc<str>,
    pub(crate) store: Arc<MetricStore>,
    pub(crate) metrics_tx: broadcast::Sender<Arc<SystemMetrics>>,
    pub(crate) ws_metrics_connections: Arc<AtomicUsize>,
    pub(crate) disk_usage: Arc<DiskUsageCache>,
    pub(crate) history_repo: Arc<HistoryRepo>,
    pub(crate) docker_repo: Option<Arc<DockerRepo>>,
    pub(crate) router: Option<ModeRouter>,
}

pub fn app(deps: AppDeps) -> Router {
    let is_hub = deps.router.is_some();
    let state = AppState {
        api_key: Arc::from(deps.api_key),
        store: deps.store,
        metrics_tx: deps.metrics_tx,
        ws_metrics_connections: deps.ws_metrics_connections,
        disk_usage: deps.disk_usage,
        history_repo: deps.history_repo,
        docker_repo: deps.docker_repo,
        router: deps.router,
    };

    let mut router = Router::new()
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/v1/ping", get(http::ping_handler)) // GET /api/v1/ping
        .route("/api/v1/metrics", get(http::metrics_handler)) // GET /api/v1/metrics[?system_id=N]
        .route("/api/v1/disk-usage", get(http::disk_usage_handler)) // GET /api/v1/disk-usage
        .route("/api/v1/disk-history", get(http::disk_history_handler)) // GET /api/v1/disk-history
        .route(
            "/api/v1/containers/{id}/logs",
            get(http::container_logs_handler),
        ) // GET /api/v1/containers/{id}/logs
        .route("/ws/metrics", get(ws::ws_metrics)); // WS /ws/metrics

    if is_hub {
        router = router
            .route("/api/v1/ingest", post(http::ingest_handler)) // POST /api/v1/ingest
            .route(
                "/api/v1/systems",
                get(http::list_systems_handler).post(http::add_system_handler),
            ) // GET/POST /api/v1/systems
            .route("/api/v1/systems/{id}", delete(http::delete_system_handler)); // DELETE /api/v1/systems/{id}
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_headers(Any).allow_methods(Any))
        .with_state(state)
}
