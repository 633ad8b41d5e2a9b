// Map raw Docker API responses into ContainerInfo.

use crate::models::{ContainerInfo, ContainerState};
use bollard::models::{ContainerStatsResponse, ContainerSummary};

/// Build a ContainerInfo from a list entry. Memory fields stay zero until stats are merged in.
pub(crate) fn container_from_summary(c: &ContainerSummary) -> ContainerInfo {
    let id = c.id.clone().unwrap_or_default();
    let name = c
        .names
        .as_ref()
        .and_then(|n| n.first())
        .map(|n| n.trim_start_matches('/').to_string())
        .unwrap_or_else(|| id.clone());
    let state = c
        .state
        .as_ref()
        .map(|s| ContainerState::from_docker(&s.to_string()))
        .unwrap_or_default();
    ContainerInfo {
        id,
        name,
        image: c.image.clone().unwrap_or_default(),
        state,
        status: c.status.clone().unwrap_or_default(),
        created: c.created.unwrap_or(0),
        cpu_percent: None,
        memory_usage: 0,
        memory_limit: 0,
    }
}

/// Memory usage and limit in bytes from a one-shot stats response.
pub(crate) fn memory_from_stats(s: &ContainerStatsResponse) -> (u64, u64) {
    let usage = s.memory_stats.as_ref().and_then(|m| m.usage).unwrap_or(0);
    let limit = s.memory_stats.as_ref().and_then(|m| m.limit).unwrap_or(0);
    (usage, limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bollard::models::ContainerMemoryStats;

    #[test]
    fn summary_strips_leading_slash_and_keeps_identity() {
        let c = ContainerSummary {
            id: Some("abc123".to_string()),
            names: Some(vec!["/web".to_string()]),
            image: Some("nginx:1.27".to_string()),
            status: Some("Up 3 hours".to_string()),
            created: Some(1_700_000_000),
            ..Default::default()
        };
        let info = container_from_summary(&c);
        assert_eq!(info.id, "abc123");
        assert_eq!(info.name, "web");
        assert_eq!(info.image, "nginx:1.27");
        assert_eq!(info.status, "Up 3 hours");
        assert_eq!(info.created, 1_700_000_000);
        assert_eq!(info.cpu_percent, None);
        assert_eq!(info.memory_usage, 0);
    }

    #[test]
    fn summary_without_names_falls_back_to_id() {
        let c = ContainerSummary {
            id: Some("deadbeef".to_string()),
            ..Default::default()
        };
        let info = container_from_summary(&c);
        assert_eq!(info.name, "deadbeef");
        assert_eq!(info.state, ContainerState::Unknown);
    }

    #[test]
    fn memory_from_stats_reads_usage_and_limit() {
        let s = ContainerStatsResponse {
            memory_stats: Some(ContainerMemoryStats {
                usage: Some(256 * 1024 * 1024),
                limit: Some(512 * 1024 * 1024),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(memory_from_stats(&s), (256 * 1024 * 1024, 512 * 1024 * 1024));
    }

    #[test]
    fn memory_from_stats_missing_is_zero() {
        let s = ContainerStatsResponse::default();
        assert_eq!(memory_from_stats(&s), (0, 0));
    }
}
