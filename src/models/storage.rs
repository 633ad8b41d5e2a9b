// Storage / disk models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskInfo {
    /// Mount point.
    pub path: String,
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub used_percent: f64,
    /// Bytes/sec read from the backing device since the previous sample.
    pub read_rate: f64,
    /// Bytes/sec written to the backing device since the previous sample.
    pub write_rate: f64,
}

/// Size of one top-level folder under the disk-usage scan root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderSize {
    pub path: String,
    pub size: u64,
}

/// One persisted row of the coarse disk-usage history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskHistoryEntry {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub used_percent: f64,
    pub total: u64,
    pub used: u64,
}
