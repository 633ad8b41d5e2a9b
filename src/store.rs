// In-memory latest-snapshot store keyed by identity key

use crate::models::SystemMetrics;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Key under which a process stores its own samples.
pub const LOCAL_KEY: &str = "local";

#[derive(Debug, Clone)]
pub struct StoreEntry {
    pub metrics: Arc<SystemMetrics>,
    /// When this entry was written, independent of the snapshot's own capture time.
    pub received_at: DateTime<Utc>,
}

/// Exactly one entry per key; a write replaces the previous entry wholesale.
///
/// Snapshots are held behind `Arc` so readers get a cheap, immutable handle and the lock is
/// held only for the map operation itself.
#[derive(Debug, Default)]
pub struct MetricStore {
    entries: RwLock<HashMap<String, StoreEntry>>,
}

impl MetricStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entry for `key`. A snapshot without a capture time is stamped with now.
    pub async fn update(&self, key: impl Into<String>, mut metrics: SystemMetrics) {
        let now = Utc::now();
        if metrics.last_update.is_none() {
            metrics.last_update = Some(now);
        }
        let entry = StoreEntry {
            metrics: Arc::new(metrics),
            received_at: now,
        };
        self.entries.write().await.insert(key.into(), entry);
    }

    pub async fn get(&self, key: &str) -> Option<Arc<SystemMetrics>> {
        self.entries.read().await.get(key).map(|e| e.metrics.clone())
    }

    pub async fn get_entry(&self, key: &str) -> Option<StoreEntry> {
        self.entries.read().await.get(key).cloned()
    }

    /// Point-in-time copy of every entry; later writes never show through.
    pub async fn get_all(&self) -> HashMap<String, Arc<SystemMetrics>> {
        self.entries
            .read()
            .await
            .iter()
            .map(|(k, e)| (k.clone(), e.metrics.clone()))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Drop entries written before `cutoff`, except `keep`. Returns how many were removed.
    pub async fn prune_older_than(&self, cutoff: DateTime<Utc>, keep: &str) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|k, e| k == keep || e.received_at >= cutoff);
        before - entries.len()
    }
}
