// Mount exclusion policy and top-N process selection

use crate::models::ProcessInfo;

/// Number of processes kept in a snapshot.
pub const TOP_PROCESS_LIMIT: usize = 20;

/// Processes below this CPU percent are dropped before sorting.
pub const PROCESS_CPU_FLOOR: f64 = 0.1;

const EXCLUDED_FS_TYPES: [&str; 3] = ["tmpfs", "devtmpfs", "squashfs"];

const EXCLUDED_PREFIXES: [&str; 4] = ["/dev", "/sys", "/proc", "/run"];

/// Files Docker bind-mounts into every container.
const EXCLUDED_FILES: [&str; 3] = ["/etc/hostname", "/etc/hosts", "/etc/resolv.conf"];

/// True when `prefix` is `path` itself or one of its ancestors ("/dev" matches "/dev/shm" but not "/devices").
fn under(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Whether a mount should be left out of the snapshot's disk list.
pub fn is_excluded_mount(mount_point: &str, fs_type: &str) -> bool {
    let fs = fs_type.to_ascii_lowercase();
    if EXCLUDED_FS_TYPES.contains(&fs.as_str()) {
        return true;
    }
    if fs == "overlay" && mount_point != "/" {
        return true;
    }
    if EXCLUDED_FILES.contains(&mount_point) {
        return true;
    }
    EXCLUDED_PREFIXES.iter().any(|p| under(mount_point, p))
}

/// Drop idle processes, order by CPU descending (pid ascending on ties) and keep at most `limit`.
pub fn top_processes(mut processes: Vec<ProcessInfo>, limit: usize) -> Vec<ProcessInfo> {
    processes.retain(|p| p.cpu >= PROCESS_CPU_FLOOR);
    processes.sort_by(|a, b| b.cpu.total_cmp(&a.cpu).then(a.pid.cmp(&b.pid)));
    processes.truncate(limit);
    processes
}
