// Host counters via sysinfo

mod linux;

use crate::models::*;
use crate::sampler::{CounterSource, DiskIoCounters, InterfaceCounters, MountSample, RawCounters};
use std::collections::HashMap;
use std::sync::Mutex;
use sysinfo::{Disks, Networks, ProcessesToUpdate, System, Users};
use tracing::{instrument, warn};

fn percent(part: u64, total: u64) -> f64 {
    if total > 0 {
        (part as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}

/// Production counter source. Every reader locks only its own sysinfo handle; a poisoned
/// lock degrades that reader to zero values.
pub struct SysinfoRepo {
    sys: Mutex<System>,
    disks: Mutex<Disks>,
    networks: Mutex<Networks>,
    users: Users,
}

impl Default for SysinfoRepo {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoRepo {
    pub fn new() -> Self {
        let mut sys = System::new_all();
        sys.refresh_all();
        Self {
            sys: Mutex::new(sys),
            disks: Mutex::new(Disks::new_with_refreshed_list()),
            networks: Mutex::new(Networks::new_with_refreshed_list()),
            users: Users::new_with_refreshed_list(),
        }
    }

    fn host_info() -> HostInfo {
        HostInfo {
            hostname: System::host_name().unwrap_or_default(),
            os: std::env::consts::OS.to_string(),
            os_name: linux::read_os_pretty_name_linux()
                .or_else(System::long_os_version)
                .unwrap_or_default(),
            platform: System::distribution_id(),
            platform_version: System::os_version().unwrap_or_default(),
            kernel_version: System::kernel_version().unwrap_or_default(),
            kernel_arch: System::cpu_arch(),
            uptime: System::uptime(),
            boot_time: System::boot_time(),
        }
    }

    #[instrument(skip(self, raw), fields(repo = "sysinfo", operation = "read_cpu_memory_processes"))]
    fn read_system(&self, raw: &mut RawCounters) {
        let mut sys = match self.sys.lock() {
            Ok(sys) => sys,
            Err(e) => {
                warn!(error = %e, "sysinfo lock poisoned");
                return;
            }
        };
        sys.refresh_cpu_usage();
        sys.refresh_memory();
        sys.refresh_processes(ProcessesToUpdate::All, true);

        raw.cpu_per_core = sys.cpus().iter().map(|c| c.cpu_usage() as f64).collect();
        raw.cpu_total = (sys.global_cpu_usage() as f64).clamp(0.0, 100.0);

        let total = sys.total_memory();
        let available = sys.available_memory();
        let used = total.saturating_sub(available);
        let (buffers, cached) = linux::read_buffers_cached_linux().unwrap_or((0, 0));
        raw.memory = MemoryStats {
            total,
            available,
            used,
            free: sys.free_memory(),
            used_percent: percent(used, total),
            buffers,
            cached,
        };

        let swap_total = sys.total_swap();
        let swap_used = sys.used_swap();
        raw.swap = SwapStats {
            total: swap_total,
            used: swap_used,
            free: sys.free_swap(),
            used_percent: percent(swap_used, swap_total),
        };

        raw.processes = sys
            .processes()
            .values()
            .map(|p| ProcessInfo {
                pid: p.pid().as_u32(),
                name: p.name().to_string_lossy().into_owned(),
                cpu: p.cpu_usage() as f64,
                mem: percent(p.memory(), total) as f32,
                username: p
                    .user_id()
                    .and_then(|uid| self.users.get_user_by_id(uid))
                    .map(|u| u.name().to_string())
                    .unwrap_or_default(),
            })
            .collect();
    }

    #[instrument(skip(self, raw), fields(repo = "sysinfo", operation = "read_disks"))]
    fn read_disks(&self, raw: &mut RawCounters) {
        let mut disks = match self.disks.lock() {
            Ok(disks) => disks,
            Err(e) => {
                warn!(error = %e, "sysinfo disks lock poisoned");
                return;
            }
        };
        disks.refresh(true);

        let mut disk_io: HashMap<String, DiskIoCounters> = HashMap::new();
        for d in disks.list() {
            let device = d.name().to_string_lossy().into_owned();
            let total = d.total_space();
            let free = d.available_space();
            let used = total.saturating_sub(free);
            let usage = d.usage();
            disk_io
                .entry(crate::sampler::device_key(&device).to_string())
                .or_insert(DiskIoCounters {
                    read_bytes: usage.total_read_bytes,
                    write_bytes: usage.total_written_bytes,
                });
            raw.mounts.push(MountSample {
                device,
                mount_point: d.mount_point().to_string_lossy().into_owned(),
                fs_type: d.file_system().to_string_lossy().into_owned(),
                total,
                used,
                free,
                used_percent: percent(used, total),
            });
        }
        raw.disk_io = disk_io;
    }

    #[instrument(skip(self, raw), fields(repo = "sysinfo", operation = "read_networks"))]
    fn read_networks(&self, raw: &mut RawCounters) {
        let mut networks = match self.networks.lock() {
            Ok(networks) => networks,
            Err(e) => {
                warn!(error = %e, "sysinfo networks lock poisoned");
                return;
            }
        };
        networks.refresh(true);
        let mut interfaces: Vec<InterfaceCounters> = networks
            .list()
            .iter()
            .map(|(name, data)| InterfaceCounters {
                name: name.clone(),
                bytes_recv: data.total_received(),
                bytes_sent: data.total_transmitted(),
            })
            .collect();
        interfaces.sort_by(|a, b| a.name.cmp(&b.name));
        raw.interfaces = interfaces;
    }
}

impl CounterSource for SysinfoRepo {
    fn read_counters(&self) -> RawCounters {
        let mut raw = RawCounters {
            host: Self::host_info(),
            ..Default::default()
        };
        let load = System::load_average();
        raw.load_avg = LoadAverage {
            load1: load.one,
            load5: load.five,
            load15: load.fifteen,
        };
        self.read_system(&mut raw);
        self.read_disks(&mut raw);
        self.read_networks(&mut raw);
        raw
    }
}
