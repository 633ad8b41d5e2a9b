// Shared test helpers
#![allow(dead_code)]

use hostwatch::db;
use hostwatch::models::*;
use sqlx::sqlite::SqlitePool;
use tempfile::TempDir;

pub fn snapshot(hostname: &str) -> SystemMetrics {
    SystemMetrics {
        cpu: vec![12.0, 8.0],
        cpu_total: 10.0,
        memory: MemoryStats {
            total: 1024,
            used: 512,
            available: 512,
            used_percent: 50.0,
            ..Default::default()
        },
        disks: vec![root_disk(40.0)],
        host_info: HostInfo {
            hostname: hostname.to_string(),
            os: "linux".into(),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn root_disk(used_percent: f64) -> DiskInfo {
    DiskInfo {
        path: "/".into(),
        total: 1_000,
        used: (used_percent * 10.0) as u64,
        free: 1_000 - (used_percent * 10.0) as u64,
        used_percent,
        ..Default::default()
    }
}

/// Fresh SQLite pool in a temp dir. Keep the TempDir alive for the test's duration.
pub async fn temp_pool() -> (TempDir, SqlitePool) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("hostwatch.db");
    let pool = db::connect(path.to_str().unwrap()).await.unwrap();
    (dir, pool)
}
