// SQLite disk-usage history: one coarse row per snapshot tick

use crate::db::from_millis;
use crate::models::{DiskHistoryEntry, DiskInfo};
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::SqlitePool;
use tracing::instrument;

#[derive(Clone)]
pub struct HistoryRepo {
    pool: SqlitePool,
}

impl HistoryRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS disk_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp INTEGER NOT NULL,
                used_percent REAL NOT NULL,
                total INTEGER NOT NULL,
                used INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_disk_history_timestamp ON disk_history(timestamp)",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self, disk), fields(repo = "history", operation = "add_entry", path = %disk.path))]
    pub async fn add_entry(&self, at: DateTime<Utc>, disk: &DiskInfo) -> anyhow::Result<i64> {
        let id = sqlx::query(
            "INSERT INTO disk_history (timestamp, used_percent, total, used) VALUES ($1, $2, $3, $4)",
        )
        .bind(at.timestamp_millis())
        .bind(disk.used_percent)
        .bind(disk.total as i64)
        .bind(disk.used as i64)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    /// Newest first.
    #[instrument(skip(self), fields(repo = "history", operation = "recent"))]
    pub async fn recent(&self, limit: u32) -> anyhow::Result<Vec<DiskHistoryEntry>> {
        let rows = sqlx::query(
            "SELECT id, timestamp, used_percent, total, used FROM disk_history
             ORDER BY timestamp DESC, id DESC LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(DiskHistoryEntry {
                id: row.try_get("id")?,
                timestamp: from_millis(row.try_get("timestamp")?),
                used_percent: row.try_get("used_percent")?,
                total: row.try_get::<i64, _>("total")?.max(0) as u64,
                used: row.try_get::<i64, _>("used")?.max(0) as u64,
            });
        }
        Ok(out)
    }

    pub async fn count(&self) -> anyhow::Result<i64> {
        let n = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM disk_history")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }
}
