// Self-sampling loop: the only writer of the local store entry.
// Also logs app stats and, when enabled, reaps store entries nobody has refreshed.

use crate::models::SystemMetrics;
use crate::sampler::{CounterSource, Sampler};
use crate::store::{LOCAL_KEY, MetricStore};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::sync::{broadcast, oneshot};
use tokio::time::{Duration, Instant, MissedTickBehavior, interval};
use tracing::Instrument;

/// Rate limit for "no receivers" log (avoid logging every tick when no one is on /ws/metrics)
const NO_RECEIVERS_WARN_INTERVAL: Duration = Duration::from_secs(60);

/// Sampler, store, live-feed channel, and shutdown for the worker.
pub struct WorkerDeps<S: CounterSource> {
    pub sampler: Sampler<S>,
    pub store: Arc<MetricStore>,
    pub tx: broadcast::Sender<Arc<SystemMetrics>>,
    pub ws_metrics_connections: Arc<AtomicUsize>,
    pub samples_total: Arc<AtomicU64>,
    pub shutdown_rx: oneshot::Receiver<()>,
}

/// Worker timing. Stats logging and reaping use their own real-time intervals.
pub struct WorkerConfig {
    pub sample_interval_ms: u64,
    /// How often to log app stats (real seconds).
    pub stats_log_interval_secs: u64,
    /// Drop store entries not written for this long; 0 disables reaping.
    pub max_entry_age_secs: u64,
}

impl WorkerConfig {
    /// Reap check period: a tenth of the max age, clamped to [1s, 60s].
    fn reap_interval(&self) -> Duration {
        Duration::from_secs((self.max_entry_age_secs / 10).clamp(1, 60))
    }
}

pub fn spawn<S: CounterSource>(
    deps: WorkerDeps<S>,
    config: WorkerConfig,
) -> tokio::task::JoinHandle<()> {
    let WorkerDeps {
        mut sampler,
        store,
        tx,
        ws_metrics_connections,
        samples_total,
        mut shutdown_rx,
    } = deps;

    let reap_enabled = config.max_entry_age_secs > 0;
    let max_entry_age =
        chrono::Duration::seconds(config.max_entry_age_secs.min(i64::MAX as u64) as i64);

    let worker_span = tracing::span!(
        tracing::Level::DEBUG,
        "worker",
        sample_interval_ms = config.sample_interval_ms
    );

    let task = async move {
        let mut tick = interval(Duration::from_millis(config.sample_interval_ms));
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut stats_log_tick = interval(Duration::from_secs(config.stats_log_interval_secs));
        stats_log_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut reap_tick = interval(config.reap_interval());
        reap_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut entries_reaped_total: u64 = 0;
        let mut last_no_receivers_warn: Option<Instant> = None;

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let snapshot = sampler.sample().await;
                    store.update(LOCAL_KEY, snapshot.clone()).await;
                    samples_total.fetch_add(1, Ordering::Relaxed);

                    if tx.send(Arc::new(snapshot)).is_err() {
                        let should_warn = last_no_receivers_warn
                            .is_none_or(|t| t.elapsed() >= NO_RECEIVERS_WARN_INTERVAL);
                        if should_warn {
                            tracing::debug!(
                                operation = "broadcast_snapshot",
                                "No active WebSocket clients; broadcast channel has no receivers"
                            );
                            last_no_receivers_warn = Some(Instant::now());
                        }
                    }
                }
                _ = &mut shutdown_rx => {
                    tracing::debug!("Worker shutting down");
                    break;
                }
                _ = stats_log_tick.tick() => {
                    let store_entries = store.len().await;
                    tracing::info!(
                        ws_metrics_clients = ws_metrics_connections.load(Ordering::Relaxed),
                        samples_total = samples_total.load(Ordering::Relaxed),
                        store_entries,
                        entries_reaped_total = entries_reaped_total,
                        "app stats"
                    );
                }
                _ = reap_tick.tick(), if reap_enabled => {
                    let cutoff = chrono::Utc::now() - max_entry_age;
                    let removed = store.prune_older_than(cutoff, LOCAL_KEY).await;
                    if removed > 0 {
                        entries_reaped_total += removed as u64;
                        tracing::info!(operation = "reap_store", removed, "Stale store entries dropped");
                    }
                }
            }
        }
    };
    tokio::spawn(task.instrument(worker_span))
}
