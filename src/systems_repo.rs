// SQLite-backed monitored-system records

use crate::db::from_millis;
use crate::models::{DeliveryMode, MonitoredSystem, NewSystem, TenantId};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use tracing::{instrument, warn};

#[derive(Clone)]
pub struct SystemsRepo {
    pool: SqlitePool,
}

impl SystemsRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS systems (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                url TEXT NOT NULL,
                api_key TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_systems_api_key ON systems(api_key)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Rows whose stored address no longer parses are skipped with a warning.
    fn parse_row(row: &SqliteRow) -> anyhow::Result<Option<MonitoredSystem>> {
        let id: i64 = row.try_get("id")?;
        let url: String = row.try_get("url")?;
        let mode = match DeliveryMode::parse(&url) {
            Ok(mode) => mode,
            Err(e) => {
                warn!(system_id = id, error = %e, "skipping system with invalid address");
                return Ok(None);
            }
        };
        Ok(Some(MonitoredSystem {
            id,
            user_id: TenantId(row.try_get("user_id")?),
            name: row.try_get("name")?,
            mode,
            api_key: row.try_get("api_key")?,
            created_at: from_millis(row.try_get("created_at")?),
        }))
    }

    /// Insert a record. `name` and `api_key` are stored trimmed, matching how ingestion trims
    /// the presented credential.
    #[instrument(skip(self, new), fields(repo = "systems", operation = "add"))]
    pub async fn add(&self, owner: TenantId, new: &NewSystem) -> anyhow::Result<MonitoredSystem> {
        let name = new.name.trim();
        let api_key = new.api_key.trim();
        anyhow::ensure!(!api_key.is_empty(), "api_key must be non-empty");
        let created_at = chrono::Utc::now();
        let url: String = new.mode.clone().into();
        let id = sqlx::query(
            "INSERT INTO systems (user_id, name, url, api_key, created_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(owner.0)
        .bind(name)
        .bind(&url)
        .bind(api_key)
        .bind(created_at.timestamp_millis())
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(MonitoredSystem {
            id,
            user_id: owner,
            name: name.to_string(),
            mode: new.mode.clone(),
            api_key: api_key.to_string(),
            created_at: from_millis(created_at.timestamp_millis()),
        })
    }

    #[instrument(skip(self), fields(repo = "systems", operation = "list"))]
    pub async fn list(&self, owner: TenantId) -> anyhow::Result<Vec<MonitoredSystem>> {
        let rows = sqlx::query("SELECT * FROM systems WHERE user_id = $1 ORDER BY id ASC")
            .bind(owner.0)
            .fetch_all(&self.pool)
            .await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            if let Some(system) = Self::parse_row(row)? {
                out.push(system);
            }
        }
        Ok(out)
    }

    pub async fn get(&self, id: i64) -> anyhow::Result<Option<MonitoredSystem>> {
        let row = sqlx::query("SELECT * FROM systems WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Self::parse_row(&row),
            None => Ok(None),
        }
    }

    /// Push-mode systems registered with this secret.
    #[instrument(skip(self, api_key), fields(repo = "systems", operation = "find_push_by_api_key"))]
    pub async fn find_push_by_api_key(&self, api_key: &str) -> anyhow::Result<Vec<MonitoredSystem>> {
        let rows = sqlx::query("SELECT * FROM systems WHERE api_key = $1 ORDER BY id ASC")
            .bind(api_key)
            .fetch_all(&self.pool)
            .await?;
        let mut out = Vec::new();
        for row in &rows {
            if let Some(system) = Self::parse_row(row)?
                && system.mode.is_push()
            {
                out.push(system);
            }
        }
        Ok(out)
    }

    /// Delete a record owned by `owner`. Returns false when no such record exists for that owner.
    #[instrument(skip(self), fields(repo = "systems", operation = "delete"))]
    pub async fn delete(&self, id: i64, owner: TenantId) -> anyhow::Result<bool> {
        let r = sqlx::query("DELETE FROM systems WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner.0)
            .execute(&self.pool)
            .await?;
        Ok(r.rows_affected() > 0)
    }
}
