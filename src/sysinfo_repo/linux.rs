// Linux-specific helpers: /proc/meminfo and /etc/os-release.

/// Buffers and page-cache sizes in bytes from /proc/meminfo (Linux). sysinfo folds these into
/// "available" without reporting them separately.
pub(super) fn read_buffers_cached_linux() -> Option<(u64, u64)> {
    #[cfg(target_os = "linux")]
    {
        let content = std::fs::read_to_string("/proc/meminfo").ok()?;
        return Some(parse_meminfo(&content));
    }
    #[cfg(not(target_os = "linux"))]
    None
}

/// Pull "Buffers" and "Cached" (kB) out of meminfo text, returned as bytes.
pub(super) fn parse_meminfo(content: &str) -> (u64, u64) {
    let mut buffers = 0u64;
    let mut cached = 0u64;
    for line in content.lines() {
        let Some((key, rest)) = line.split_once(':') else {
            continue;
        };
        let kb = rest
            .split_whitespace()
            .next()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0);
        match key.trim() {
            "Buffers" => buffers = kb * 1024,
            "Cached" => cached = kb * 1024,
            _ => {}
        }
    }
    (buffers, cached)
}

/// Read distro display name from /etc/os-release (Linux): PRETTY_NAME, else NAME.
pub(super) fn read_os_pretty_name_linux() -> Option<String> {
    #[cfg(target_os = "linux")]
    {
        let content = std::fs::read_to_string("/etc/os-release").ok()?;
        return parse_os_release(&content);
    }
    #[cfg(not(target_os = "linux"))]
    None
}

pub(super) fn parse_os_release(content: &str) -> Option<String> {
    let value = |key: &str| {
        content.lines().find_map(|line| {
            let v = line.strip_prefix(key)?.trim_matches('"');
            (!v.is_empty()).then(|| v.to_string())
        })
    };
    value("PRETTY_NAME=").or_else(|| value("NAME="))
}
