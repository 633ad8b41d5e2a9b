// Snapshot (SystemMetrics) plus CPU load, memory and host identity models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ContainerInfo, DiskInfo, NetworkStats, ProcessInfo};

/// Mount paths preferred when a single "system disk" figure is needed.
const ROOT_DISK_PATHS: [&str; 2] = ["/", "/hostfs"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadAverage {
    pub load1: f64,
    pub load5: f64,
    pub load15: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryStats {
    pub total: u64,
    pub available: u64,
    pub used: u64,
    pub free: u64,
    pub used_percent: f64,
    pub buffers: u64,
    pub cached: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwapStats {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub used_percent: f64,
}

/// Static-ish host identity. `hostname` doubles as half of the push identity key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostInfo {
    pub hostname: String,
    pub os: String,
    pub os_name: String,
    pub platform: String,
    pub platform_version: String,
    pub kernel_version: String,
    pub kernel_arch: String,
    pub uptime: u64,
    pub boot_time: u64,
}

/// One immutable metrics reading for a host. Stored snapshots are replaced wholesale, never mutated.
///
/// Unknown or missing JSON fields fall back to their zero value so that agents running an older
/// build can still push; a payload with wrongly typed fields is rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemMetrics {
    /// Per-core utilization, in core order.
    pub cpu: Vec<f64>,
    pub cpu_total: f64,
    pub load_avg: LoadAverage,
    pub memory: MemoryStats,
    pub swap: SwapStats,
    pub disks: Vec<DiskInfo>,
    pub network: NetworkStats,
    /// Top processes by CPU, descending.
    pub processes: Vec<ProcessInfo>,
    pub containers: Vec<ContainerInfo>,
    pub host_info: HostInfo,
    pub last_update: Option<DateTime<Utc>>,
}

impl SystemMetrics {
    pub fn hostname(&self) -> &str {
        &self.host_info.hostname
    }

    /// How far the capture time lags `now`. `None` when the snapshot was never stamped.
    pub fn staleness(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        self.last_update.map(|t| now.signed_duration_since(t))
    }

    /// The disk entry used for the persisted disk-usage history: `/` or `/hostfs`, else the first one.
    pub fn root_disk(&self) -> Option<&DiskInfo> {
        self.disks
            .iter()
            .find(|d| ROOT_DISK_PATHS.contains(&d.path.as_str()))
            .or_else(|| self.disks.first())
    }
}
