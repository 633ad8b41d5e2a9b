use serde::Deserialize;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Samples this host and serves/pushes its own snapshot.
    #[default]
    Agent,
    /// Also keeps system records, accepts pushes and proxies pulls.
    Hub,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub role: Role,
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub database: DatabaseConfig,
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub disk_usage: DiskUsageConfig,
    #[serde(default)]
    pub pull: PullConfig,
    #[serde(default)]
    pub store: StoreConfig,
    /// Push target; absent means the agent only serves pulls.
    pub push: Option<PushSection>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Bearer credential required by the protected endpoints of this process.
    pub api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    pub sample_interval_ms: u64,
    /// How often to log app stats (ws clients, samples taken, store size) at INFO level.
    pub stats_log_interval_secs: u64,
    /// Snapshots buffered for /ws/metrics (slow clients may lag).
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
}

fn default_broadcast_capacity() -> usize {
    16
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiskUsageConfig {
    /// Root whose top-level folders are sized.
    #[serde(default = "default_disk_usage_path")]
    pub path: String,
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    /// Optional cron expression for the disk history snapshot (e.g. "0 0 3 * * *"). Uses local time.
    pub snapshot_schedule: Option<String>,
    /// Snapshot every N seconds when snapshot_schedule is not set.
    #[serde(default = "default_snapshot_interval_secs")]
    pub snapshot_interval_secs: u64,
}

impl Default for DiskUsageConfig {
    fn default() -> Self {
        Self {
            path: default_disk_usage_path(),
            refresh_interval_secs: default_refresh_interval_secs(),
            top_n: default_top_n(),
            snapshot_schedule: None,
            snapshot_interval_secs: default_snapshot_interval_secs(),
        }
    }
}

fn default_disk_usage_path() -> String {
    "/".into()
}

fn default_refresh_interval_secs() -> u64 {
    900
}

fn default_top_n() -> usize {
    10
}

fn default_snapshot_interval_secs() -> u64 {
    86_400
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullConfig {
    #[serde(default = "default_pull_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for PullConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_pull_timeout_ms(),
        }
    }
}

/// Exclusive upper bound for `pull.timeout_ms`.
pub const MAX_PULL_TIMEOUT_MS: u64 = 10_000;

fn default_pull_timeout_ms() -> u64 {
    5_000
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
    /// Drop entries not written for this many seconds; 0 keeps them forever.
    #[serde(default)]
    pub max_entry_age_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PushSection {
    pub server_url: String,
    pub api_key: String,
    #[serde(default = "default_push_interval_ms")]
    pub interval_ms: u64,
}

fn default_push_interval_ms() -> u64 {
    2_000
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str_with_env(&s, |k| std::env::var(k).ok())
    }

    /// Parse and validate config from a string (e.g. for tests). No environment overrides.
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        Self::load_from_str_with_env(s, |_| None)
    }

    /// Parse, apply overrides from `env`, then validate.
    pub fn load_from_str_with_env(
        s: &str,
        env: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<Self> {
        let mut config: AppConfig = toml::from_str(s)?;
        config.apply_env(env)?;
        config.validate()?;
        Ok(config)
    }

    /// API_PORT, DISK_USAGE_PATH, API_KEY (own credential and push credential), SERVER_URL.
    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        let env = |k: &str| env(k).filter(|v| !v.trim().is_empty());

        if let Some(port) = env("API_PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("API_PORT must be a port number, got {:?}: {}", port, e))?;
        }
        if let Some(path) = env("DISK_USAGE_PATH") {
            self.disk_usage.path = path;
        }
        let api_key = env("API_KEY");
        if let Some(ref key) = api_key {
            self.auth.api_key = key.clone();
        }
        if let Some(url) = env("SERVER_URL") {
            if let Some(push) = self.push.as_mut() {
                push.server_url = url;
            } else {
                self.push = Some(PushSection {
                    server_url: url,
                    api_key: self.auth.api_key.clone(),
                    interval_ms: default_push_interval_ms(),
                });
            }
        }
        if let (Some(key), Some(push)) = (api_key, self.push.as_mut()) {
            push.api_key = key;
        }
        Ok(())
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            !self.auth.api_key.trim().is_empty(),
            "auth.api_key must be non-empty"
        );
        anyhow::ensure!(
            !self.database.path.is_empty(),
            "database.path must be non-empty"
        );
        anyhow::ensure!(
            self.monitoring.sample_interval_ms > 0,
            "monitoring.sample_interval_ms must be > 0, got {}",
            self.monitoring.sample_interval_ms
        );
        anyhow::ensure!(
            self.monitoring.stats_log_interval_secs > 0,
            "monitoring.stats_log_interval_secs must be > 0, got {}",
            self.monitoring.stats_log_interval_secs
        );
        anyhow::ensure!(
            self.monitoring.broadcast_capacity > 0,
            "monitoring.broadcast_capacity must be > 0, got {}",
            self.monitoring.broadcast_capacity
        );
        anyhow::ensure!(
            !self.disk_usage.path.is_empty(),
            "disk_usage.path must be non-empty"
        );
        anyhow::ensure!(
            self.disk_usage.refresh_interval_secs > 0,
            "disk_usage.refresh_interval_secs must be > 0, got {}",
            self.disk_usage.refresh_interval_secs
        );
        anyhow::ensure!(
            self.disk_usage.top_n > 0,
            "disk_usage.top_n must be > 0, got {}",
            self.disk_usage.top_n
        );
        anyhow::ensure!(
            self.disk_usage.snapshot_interval_secs > 0,
            "disk_usage.snapshot_interval_secs must be > 0, got {}",
            self.disk_usage.snapshot_interval_secs
        );
        if let Some(ref expr) = self.disk_usage.snapshot_schedule {
            cron::Schedule::from_str(expr).map_err(|e| {
                anyhow::anyhow!("disk_usage.snapshot_schedule is not a valid cron expression: {}", e)
            })?;
        }
        anyhow::ensure!(
            self.pull.timeout_ms > 0,
            "pull.timeout_ms must be > 0, got {}",
            self.pull.timeout_ms
        );
        anyhow::ensure!(
            self.pull.timeout_ms < MAX_PULL_TIMEOUT_MS,
            "pull.timeout_ms must be below {} so a dead agent cannot stall a dashboard, got {}",
            MAX_PULL_TIMEOUT_MS,
            self.pull.timeout_ms
        );
        if let Some(ref push) = self.push {
            let url = url::Url::parse(&push.server_url)
                .map_err(|e| anyhow::anyhow!("push.server_url is not a valid URL: {}", e))?;
            anyhow::ensure!(
                matches!(url.scheme(), "http" | "https"),
                "push.server_url must be http or https, got {}",
                url.scheme()
            );
            anyhow::ensure!(
                !push.api_key.trim().is_empty(),
                "push.api_key must be non-empty"
            );
            anyhow::ensure!(
                push.interval_ms > 0,
                "push.interval_ms must be > 0, got {}",
                push.interval_ms
            );
        }
        Ok(())
    }
}
