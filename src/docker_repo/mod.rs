// Docker container listing, memory stats and logs via bollard

mod stats;

use crate::models::ContainerInfo;
use bollard::Docker;
use bollard::query_parameters::{ListContainersOptions, LogsOptions, StatsOptions};
use futures_util::StreamExt;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Upper bound on a whole listing, stats included. Must stay below the sampling interval.
pub const LIST_TIMEOUT: Duration = Duration::from_millis(1_500);

/// Upper bound on a single container's one-shot stats call.
const STATS_TIMEOUT: Duration = Duration::from_secs(1);

/// One-shot stats calls in flight at once.
const STATS_CONCURRENCY: usize = 8;

pub struct DockerRepo {
    docker: Docker,
}

impl DockerRepo {
    pub fn connect() -> anyhow::Result<Self> {
        let docker = Docker::connect_with_unix_defaults()?;
        Ok(Self { docker })
    }

    /// Client for a daemon at an explicit unix socket path.
    pub fn connect_socket(path: &str) -> anyhow::Result<Self> {
        let docker = Docker::connect_with_unix(path, 120, bollard::API_DEFAULT_VERSION)?;
        Ok(Self { docker })
    }

    /// Connect and ping the daemon; `None` when Docker is not installed or not reachable.
    pub async fn connect_available() -> Option<Self> {
        let repo = match Self::connect() {
            Ok(repo) => repo,
            Err(e) => {
                debug!(error = %e, "docker socket unavailable");
                return None;
            }
        };
        match tokio::time::timeout(LIST_TIMEOUT, repo.docker.ping()).await {
            Ok(Ok(_)) => Some(repo),
            Ok(Err(e)) => {
                debug!(error = %e, "docker daemon not responding");
                None
            }
            Err(_) => {
                debug!("docker daemon ping timed out");
                None
            }
        }
    }

    /// All containers (running and stopped). Running ones get memory usage/limit from one-shot
    /// stats calls made concurrently; a failed stats call leaves that container's memory at zero.
    /// The whole listing fails once it exceeds [`LIST_TIMEOUT`].
    #[instrument(skip(self), fields(repo = "docker", operation = "list_containers"))]
    pub async fn list_containers(&self) -> anyhow::Result<Vec<ContainerInfo>> {
        tokio::time::timeout(LIST_TIMEOUT, self.list_with_stats())
            .await
            .map_err(|_| anyhow::anyhow!("container listing timed out after {:?}", LIST_TIMEOUT))?
    }

    async fn list_with_stats(&self) -> anyhow::Result<Vec<ContainerInfo>> {
        let options = ListContainersOptions {
            all: true,
            ..Default::default()
        };
        let summaries = self.docker.list_containers(Some(options)).await?;

        let containers = futures_util::stream::iter(summaries.iter().map(stats::container_from_summary))
            .map(|mut info| async move {
                if info.state.is_running()
                    && let Some((usage, limit)) = self.memory_stats(&info.id).await
                {
                    info.memory_usage = usage;
                    info.memory_limit = limit;
                }
                info
            })
            .buffered(STATS_CONCURRENCY)
            .collect::<Vec<_>>()
            .await;
        Ok(containers)
    }

    async fn memory_stats(&self, id: &str) -> Option<(u64, u64)> {
        let options = StatsOptions {
            stream: false,
            one_shot: true,
            ..Default::default()
        };
        let mut stream = self.docker.stats(id, Some(options));
        match tokio::time::timeout(STATS_TIMEOUT, stream.next()).await {
            Ok(Some(Ok(s))) => Some(stats::memory_from_stats(&s)),
            Ok(Some(Err(e))) => {
                warn!(container = %id, error = %e, "container stats failed");
                None
            }
            Ok(None) => None,
            Err(_) => {
                warn!(container = %id, "container stats timed out");
                None
            }
        }
    }

    /// Last `tail` lines of a container's combined stdout/stderr.
    #[instrument(skip(self), fields(repo = "docker", operation = "container_logs"))]
    pub async fn container_logs(&self, id: &str, tail: u32) -> anyhow::Result<String> {
        let options = LogsOptions {
            stdout: true,
            stderr: true,
            tail: tail.to_string(),
            ..Default::default()
        };
        let mut stream = self.docker.logs(id, Some(options));
        let mut text = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            text.push_str(&String::from_utf8_lossy(&chunk.into_bytes()));
        }
        Ok(text)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::time::Instant;
    use tokio::net::UnixListener;

    /// A socket that accepts connections and never answers.
    pub(crate) fn silent_daemon(dir: &tempfile::TempDir) -> (String, tokio::task::JoinHandle<()>) {
        let path = dir.path().join("docker.sock");
        let listener = UnixListener::bind(&path).unwrap();
        let hold = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((sock, _)) = listener.accept().await {
                held.push(sock);
            }
        });
        (path.to_string_lossy().into_owned(), hold)
    }

    #[tokio::test]
    async fn list_containers_gives_up_on_silent_daemon() {
        let dir = tempfile::TempDir::new().unwrap();
        let (path, hold) = silent_daemon(&dir);
        let repo = DockerRepo::connect_socket(&path).unwrap();

        let started = Instant::now();
        let result = tokio::time::timeout(Duration::from_secs(10), repo.list_containers())
            .await
            .expect("listing must not hang");
        hold.abort();

        assert!(result.is_err());
        assert!(started.elapsed() < LIST_TIMEOUT + Duration::from_secs(1));
    }
}
