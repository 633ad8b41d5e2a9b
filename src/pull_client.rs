// Outbound fetch of a pull-mode agent's latest snapshot

use crate::identity::QueryError;
use crate::models::SystemMetrics;
use anyhow::Context;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// Path of the agent query endpoint, relative to the agent's base URL.
pub const METRICS_PATH: &str = "api/v1/metrics";

/// Largest agent response body accepted; a snapshot is a few KiB.
pub const MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

/// Bearer-authenticated GET against remote agents. The client timeout bounds the whole request,
/// so an agent that accepts the connection and never answers still fails in time.
#[derive(Debug, Clone)]
pub struct PullClient {
    client: Client,
    timeout: Duration,
}

impl PullClient {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(crate::version::USER_AGENT)
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// `{base}/api/v1/metrics`, tolerating a base with or without a trailing slash or path.
    pub fn metrics_url(base: &Url) -> Result<Url, QueryError> {
        let mut base = base.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.join(METRICS_PATH)
            .map_err(|e| QueryError::Unreachable(format!("invalid agent url: {e}")))
    }

    #[instrument(skip(self, credential), fields(operation = "pull_fetch", url = %base))]
    pub async fn fetch(&self, base: &Url, credential: &str) -> Result<SystemMetrics, QueryError> {
        let url = Self::metrics_url(base)?;
        let mut response = self
            .client
            .get(url)
            .bearer_auth(credential)
            .send()
            .await
            .map_err(|e| {
                debug!(error = %e, "pull request failed");
                QueryError::Unreachable(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(QueryError::Upstream {
                status: status.as_u16(),
            });
        }

        if let Some(len) = response.content_length()
            && len > MAX_BODY_BYTES as u64
        {
            return Err(too_large());
        }
        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| QueryError::Unreachable(e.to_string()))?
        {
            if body.len() + chunk.len() > MAX_BODY_BYTES {
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }
        serde_json::from_slice(&body).map_err(|e| QueryError::InvalidPayload(e.to_string()))
    }
}

fn too_large() -> QueryError {
    debug!(limit = MAX_BODY_BYTES, "pull response body over limit");
    QueryError::InvalidPayload(format!("response body exceeds {MAX_BODY_BYTES} bytes"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_url_appends_to_base_path() {
        let u = PullClient::metrics_url(&Url::parse("http://10.0.0.2:8080").unwrap()).unwrap();
        assert_eq!(u.as_str(), "http://10.0.0.2:8080/api/v1/metrics");
        let u = PullClient::metrics_url(&Url::parse("https://h.example/agent/").unwrap()).unwrap();
        assert_eq!(u.as_str(), "https://h.example/agent/api/v1/metrics");
        let u = PullClient::metrics_url(&Url::parse("https://h.example/agent").unwrap()).unwrap();
        assert_eq!(u.as_str(), "https://h.example/agent/api/v1/metrics");
    }

    #[tokio::test]
    async fn silent_upstream_fails_within_timeout() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hold = tokio::spawn(async move {
            let mut held = Vec::new();
            loop {
                if let Ok((sock, _)) = listener.accept().await {
                    held.push(sock);
                }
            }
        });

        let client = PullClient::new(Duration::from_millis(300)).unwrap();
        let base = Url::parse(&format!("http://{addr}")).unwrap();
        let started = std::time::Instant::now();
        let result = tokio::time::timeout(Duration::from_secs(5), client.fetch(&base, "k")).await;
        hold.abort();

        let err = result.expect("fetch must not hang").unwrap_err();
        assert!(matches!(err, QueryError::Unreachable(_)), "got {err:?}");
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    async fn serve_metrics(body: fn() -> axum::body::Body) -> Url {
        let app = axum::Router::new().route(
            "/api/v1/metrics",
            axum::routing::get(move || async move { body() }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Url::parse(&format!("http://{addr}")).unwrap()
    }

    #[tokio::test]
    async fn oversized_declared_body_is_rejected() {
        let base = serve_metrics(|| axum::body::Body::from(vec![b' '; MAX_BODY_BYTES + 1])).await;
        let client = PullClient::new(Duration::from_secs(5)).unwrap();
        match client.fetch(&base, "k").await {
            Err(QueryError::InvalidPayload(m)) => assert!(m.contains("exceeds"), "got {m}"),
            other => panic!("expected size rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn oversized_streamed_body_is_cut_off() {
        // Chunked, so no Content-Length to check up front.
        let base = serve_metrics(|| {
            let chunks = (0..5).map(|_| Ok::<_, std::io::Error>(bytes::Bytes::from(vec![b' '; 1 << 20])));
            axum::body::Body::from_stream(futures_util::stream::iter(chunks))
        })
        .await;
        let client = PullClient::new(Duration::from_secs(5)).unwrap();
        match client.fetch(&base, "k").await {
            Err(QueryError::InvalidPayload(m)) => assert!(m.contains("exceeds"), "got {m}"),
            other => panic!("expected size rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn refused_connection_is_unreachable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let client = PullClient::new(Duration::from_secs(1)).unwrap();
        let base = Url::parse(&format!("http://{addr}")).unwrap();
        let err = client.fetch(&base, "k").await.unwrap_err();
        assert!(err.is_upstream());
    }
}
