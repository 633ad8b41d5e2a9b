// WebSocket live feed of local snapshots

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use bytes::Bytes;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::broadcast;
use tokio::time::{Duration, timeout};

use super::AppState;
use super::auth::Principal;
use crate::models::SystemMetrics;
use crate::store::LOCAL_KEY;

pub(super) const WS_PING_INTERVAL: Duration = Duration::from_secs(30);
pub(super) const WS_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Decrements ws_metrics connection count on drop (connect = +1, drop = -1).
struct WsMetricsGuard(Arc<AtomicUsize>);

impl Drop for WsMetricsGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

async fn send_text(socket: &mut WebSocket, json: String) -> bool {
    let r = timeout(WS_SEND_TIMEOUT, socket.send(Message::Text(json.into()))).await;
    matches!(r, Ok(Ok(())))
}

pub(super) async fn ws_metrics(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    _principal: Principal,
) -> impl IntoResponse {
    let tx = state.metrics_tx.clone();
    let conn_count = state.ws_metrics_connections.clone();
    let latest = state.store.get(LOCAL_KEY).await;
    ws.on_upgrade(move |socket| async move {
        let mut rx = tx.subscribe();
        if let Err(e) = stream_metrics(socket, &mut rx, conn_count, latest).await {
            tracing::info!("Metrics stream error: {}", e);
        }
    })
}

/// Sends the latest snapshot (if any) on connect, then every new one.
async fn stream_metrics(
    mut socket: WebSocket,
    rx: &mut broadcast::Receiver<Arc<SystemMetrics>>,
    conn_count: Arc<AtomicUsize>,
    latest: Option<Arc<SystemMetrics>>,
) -> anyhow::Result<()> {
    conn_count.fetch_add(1, Ordering::Relaxed);
    let _guard = WsMetricsGuard(conn_count);
    tracing::info!("Client connected to metrics stream");

    if let Some(snapshot) = latest {
        let json = serde_json::to_string(snapshot.as_ref())?;
        if !send_text(&mut socket, json).await {
            return Ok(());
        }
    }

    let mut ping_interval = tokio::time::interval(WS_PING_INTERVAL);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(snapshot) => {
                        let json = serde_json::to_string(snapshot.as_ref())?;
                        if !send_text(&mut socket, json).await {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("WebSocket /ws/metrics client lagged, skipped {} messages", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            _ = ping_interval.tick() => {
                let r = timeout(WS_SEND_TIMEOUT, socket.send(Message::Ping(Bytes::new()))).await;
                if !matches!(r, Ok(Ok(()))) {
                    break;
                }
            }
        }
    }
    Ok(())
}
