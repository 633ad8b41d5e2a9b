// Top-level folder sizes, scanned in the background and served from a cache

use crate::models::FolderSize;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{info, instrument, warn};
use walkdir::WalkDir;

/// Total size of regular files under `dir`. Unreadable entries are skipped, symlinks not followed.
fn folder_size(dir: &Path) -> u64 {
    WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}

/// Sizes of the immediate subdirectories of `root`, largest first, at most `top_n`.
pub fn scan_top_folders(root: &Path, top_n: usize) -> anyhow::Result<Vec<FolderSize>> {
    let mut folders: Vec<FolderSize> = std::fs::read_dir(root)?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|e| {
            let path = e.path();
            FolderSize {
                size: folder_size(&path),
                path: path.to_string_lossy().into_owned(),
            }
        })
        .collect();
    folders.sort_by(|a, b| b.size.cmp(&a.size).then_with(|| a.path.cmp(&b.path)));
    folders.truncate(top_n);
    Ok(folders)
}

#[derive(Debug, Clone, Default)]
pub struct DiskUsageSnapshot {
    pub folders: Vec<FolderSize>,
    pub scanned_at: Option<DateTime<Utc>>,
}

/// Last completed scan. Request handlers only ever read this; the walk runs in the refresher.
#[derive(Debug)]
pub struct DiskUsageCache {
    root: PathBuf,
    top_n: usize,
    latest: RwLock<DiskUsageSnapshot>,
}

impl DiskUsageCache {
    pub fn new(root: impl Into<PathBuf>, top_n: usize) -> Self {
        Self {
            root: root.into(),
            top_n,
            latest: RwLock::new(DiskUsageSnapshot::default()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn get(&self) -> DiskUsageSnapshot {
        self.latest.read().await.clone()
    }

    /// Run one scan on the blocking pool and publish it. On failure the previous result stays.
    #[instrument(skip(self), fields(operation = "disk_usage_refresh", root = %self.root.display()))]
    pub async fn refresh(&self) -> anyhow::Result<usize> {
        let root = self.root.clone();
        let top_n = self.top_n;
        let folders = tokio::task::spawn_blocking(move || scan_top_folders(&root, top_n))
            .await
            .map_err(|e| anyhow::anyhow!("disk usage scan join: {}", e))??;
        let n = folders.len();
        *self.latest.write().await = DiskUsageSnapshot {
            folders,
            scanned_at: Some(Utc::now()),
        };
        Ok(n)
    }
}

/// Refresh immediately, then every `interval`, until shutdown.
pub async fn run_refresher(
    cache: Arc<DiskUsageCache>,
    interval: Duration,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match cache.refresh().await {
                    Ok(n) => info!(folders = n, "disk usage refreshed"),
                    Err(e) => warn!(error = %e, "disk usage scan failed"),
                }
            }
            _ = &mut shutdown_rx => {
                info!("Disk usage refresher shutting down");
                break;
            }
        }
    }
}
