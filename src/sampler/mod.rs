// Stateful sampler: raw cumulative counters in, one snapshot with rates out

mod filters;

pub use filters::{PROCESS_CPU_FLOOR, TOP_PROCESS_LIMIT, is_excluded_mount, top_processes};

use crate::docker_repo::DockerRepo;
use crate::models::*;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Usage of one mounted filesystem as read from the OS.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MountSample {
    /// Backing device, e.g. "/dev/sda1" or "sda1".
    pub device: String,
    pub mount_point: String,
    pub fs_type: String,
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub used_percent: f64,
}

/// Cumulative bytes moved by one block device since boot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskIoCounters {
    pub read_bytes: u64,
    pub write_bytes: u64,
}

/// Cumulative bytes moved by one network interface since boot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterfaceCounters {
    pub name: String,
    pub bytes_recv: u64,
    pub bytes_sent: u64,
}

/// Everything the OS reports in one read. Gauges are final; byte counters are cumulative.
#[derive(Debug, Clone, Default)]
pub struct RawCounters {
    pub host: HostInfo,
    pub cpu_per_core: Vec<f64>,
    pub cpu_total: f64,
    pub load_avg: LoadAverage,
    pub memory: MemoryStats,
    pub swap: SwapStats,
    pub mounts: Vec<MountSample>,
    /// Keyed by device name without the "/dev/" prefix.
    pub disk_io: HashMap<String, DiskIoCounters>,
    pub interfaces: Vec<InterfaceCounters>,
    /// Unfiltered; the sampler applies the noise floor and top-N cut.
    pub processes: Vec<ProcessInfo>,
}

/// Source of raw counters. Reads are blocking and must never fail outright: an unreadable
/// dimension is returned as its zero value.
pub trait CounterSource: Send + Sync + 'static {
    fn read_counters(&self) -> RawCounters;
}

/// Device name used to key disk I/O counters.
pub fn device_key(device: &str) -> &str {
    device.strip_prefix("/dev/").unwrap_or(device)
}

/// Bytes per second between two cumulative readings. A counter that went backwards
/// (reset or wrap) and a zero interval both give 0.
pub fn rate(prev: u64, cur: u64, elapsed_secs: f64) -> f64 {
    if elapsed_secs <= 0.0 {
        return 0.0;
    }
    cur.saturating_sub(prev) as f64 / elapsed_secs
}

/// Previous observations per device and interface, plus when they were taken.
#[derive(Debug, Default)]
pub struct SamplerHistory {
    interfaces: Vec<InterfaceCounters>,
    disk_io: HashMap<String, DiskIoCounters>,
    last_sample: Option<Instant>,
}

impl SamplerHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_sample(&self) -> Option<Instant> {
        self.last_sample
    }

    /// Build a snapshot from one read and advance the history to it.
    pub fn assemble(
        &mut self,
        raw: RawCounters,
        containers: Vec<ContainerInfo>,
        now: Instant,
        wall: DateTime<Utc>,
    ) -> SystemMetrics {
        let elapsed = self
            .last_sample
            .map(|prev| now.saturating_duration_since(prev).as_secs_f64())
            .unwrap_or(0.0);

        let disks = self.disk_entries(&raw.mounts, &raw.disk_io, elapsed);
        self.disk_io = raw.disk_io;

        let network = self.network_stats(&raw.interfaces, elapsed);
        self.interfaces = raw.interfaces;

        self.last_sample = Some(now);

        SystemMetrics {
            cpu: raw.cpu_per_core,
            cpu_total: raw.cpu_total,
            load_avg: raw.load_avg,
            memory: raw.memory,
            swap: raw.swap,
            disks,
            network,
            processes: top_processes(raw.processes, TOP_PROCESS_LIMIT),
            containers,
            host_info: raw.host,
            last_update: Some(wall),
        }
    }

    fn disk_entries(
        &self,
        mounts: &[MountSample],
        current: &HashMap<String, DiskIoCounters>,
        elapsed: f64,
    ) -> Vec<DiskInfo> {
        let rates: HashMap<&str, (f64, f64)> = current
            .iter()
            .map(|(dev, cur)| {
                let r = match self.disk_io.get(dev) {
                    Some(prev) => (
                        rate(prev.read_bytes, cur.read_bytes, elapsed),
                        rate(prev.write_bytes, cur.write_bytes, elapsed),
                    ),
                    None => (0.0, 0.0),
                };
                (dev.as_str(), r)
            })
            .collect();

        mounts
            .iter()
            .filter(|m| !is_excluded_mount(&m.mount_point, &m.fs_type))
            .map(|m| {
                let (read_rate, write_rate) = rates
                    .get(device_key(&m.device))
                    .copied()
                    .unwrap_or((0.0, 0.0));
                DiskInfo {
                    path: m.mount_point.clone(),
                    total: m.total,
                    used: m.used,
                    free: m.free,
                    used_percent: m.used_percent,
                    read_rate,
                    write_rate,
                }
            })
            .collect()
    }

    fn network_stats(&self, current: &[InterfaceCounters], elapsed: f64) -> NetworkStats {
        let interfaces: Vec<NetInterface> = current
            .iter()
            .map(|cur| {
                let (recv_rate, sent_rate) =
                    match self.interfaces.iter().find(|p| p.name == cur.name) {
                        Some(prev) => (
                            rate(prev.bytes_recv, cur.bytes_recv, elapsed),
                            rate(prev.bytes_sent, cur.bytes_sent, elapsed),
                        ),
                        None => (0.0, 0.0),
                    };
                NetInterface {
                    name: cur.name.clone(),
                    recv_rate,
                    sent_rate,
                }
            })
            .collect();
        NetworkStats {
            total_recv: interfaces.iter().map(|i| i.recv_rate).sum(),
            total_sent: interfaces.iter().map(|i| i.sent_rate).sum(),
            interfaces,
        }
    }
}

/// Produces snapshots. Driven by exactly one loop, so the history needs no lock.
pub struct Sampler<S: CounterSource> {
    source: Arc<S>,
    docker: Option<Arc<DockerRepo>>,
    history: SamplerHistory,
}

impl<S: CounterSource> Sampler<S> {
    pub fn new(source: Arc<S>, docker: Option<Arc<DockerRepo>>) -> Self {
        Self {
            source,
            docker,
            history: SamplerHistory::new(),
        }
    }

    pub fn history(&self) -> &SamplerHistory {
        &self.history
    }

    pub async fn sample(&mut self) -> SystemMetrics {
        self.sample_at(Instant::now(), Utc::now()).await
    }

    /// One sampling pass. Never fails; an unreadable source leaves its field at zero.
    pub async fn sample_at(&mut self, now: Instant, wall: DateTime<Utc>) -> SystemMetrics {
        let source = self.source.clone();
        let raw = match tokio::task::spawn_blocking(move || source.read_counters()).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "counter read task failed, using empty counters");
                RawCounters::default()
            }
        };

        let containers = match &self.docker {
            Some(docker) => match docker.list_containers().await {
                Ok(c) => c,
                Err(e) => {
                    debug!(error = %e, "container listing unavailable");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        self.history.assemble(raw, containers, now, wall)
    }
}
