// Background worker: persist the root disk's usage on a schedule.
// Runs on a cron expression (local time) or, without one, a fixed interval.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::history_repo::HistoryRepo;
use crate::store::{LOCAL_KEY, MetricStore};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct DiskHistoryConfig {
    /// Optional cron expression (e.g. "0 0 3 * * *" = 03:00 daily). Uses local time.
    pub schedule: Option<String>,
    /// Snapshot every N seconds when `schedule` is not set.
    pub interval_secs: u64,
}

/// Record the root disk of the latest local snapshot. `Ok(None)` when there is nothing to record.
pub async fn snapshot_once(store: &MetricStore, repo: &HistoryRepo) -> anyhow::Result<Option<i64>> {
    let Some(metrics) = store.get(LOCAL_KEY).await else {
        return Ok(None);
    };
    let Some(disk) = metrics.root_disk() else {
        return Ok(None);
    };
    let at = metrics.last_update.unwrap_or_else(chrono::Utc::now);
    let id = repo.add_entry(at, disk).await?;
    Ok(Some(id))
}

pub fn spawn(
    store: Arc<MetricStore>,
    repo: Arc<HistoryRepo>,
    config: DiskHistoryConfig,
    mut shutdown_rx: oneshot::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let (fire_tx, mut fire_rx) = mpsc::channel::<()>(1);
        let scheduler = tokio::spawn(scheduler(config, fire_tx));
        loop {
            tokio::select! {
                fired = fire_rx.recv() => {
                    if fired.is_none() {
                        break;
                    }
                    match snapshot_once(&store, &repo).await {
                        Ok(Some(id)) => info!(entry_id = id, "disk history snapshot saved"),
                        Ok(None) => debug!("No local disk figure yet; snapshot skipped"),
                        Err(e) => warn!(error = %e, "disk history snapshot failed"),
                    }
                }
                _ = &mut shutdown_rx => {
                    debug!("Disk history worker shutting down");
                    break;
                }
            }
        }
        scheduler.abort();
    })
}

/// Sends a message on `tx` at each snapshot time (cron or fixed interval).
async fn scheduler(config: DiskHistoryConfig, tx: mpsc::Sender<()>) {
    if let Some(ref cron_str) = config.schedule {
        let Ok(schedule) = cron::Schedule::from_str(cron_str) else {
            warn!(cron = %cron_str, "invalid disk_usage.snapshot_schedule; disk history disabled");
            return;
        };
        loop {
            let now = chrono::Local::now();
            let next = schedule.after(&now).next();
            if let Some(next) = next {
                let delay = (next - now).to_std().unwrap_or(Duration::from_secs(1));
                tokio::time::sleep(delay).await;
                if tx.send(()).await.is_err() {
                    break;
                }
            } else {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
        }
    } else {
        let interval = Duration::from_secs(config.interval_secs);
        loop {
            tokio::time::sleep(interval).await;
            if tx.send(()).await.is_err() {
                break;
            }
        }
    }
}
