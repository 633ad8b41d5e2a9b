// Agent push loop: send the latest local snapshot to a hub's ingestion endpoint

use crate::store::{LOCAL_KEY, MetricStore};
use anyhow::Context;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};
use url::Url;

pub const INGEST_PATH: &str = "api/v1/ingest";

/// Request timeout for a single push.
pub const PUSH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct PushConfig {
    pub server_url: Url,
    pub api_key: String,
    pub interval_ms: u64,
}

pub struct Pusher {
    client: Client,
    ingest_url: Url,
    api_key: String,
    store: Arc<MetricStore>,
}

impl Pusher {
    pub fn new(config: &PushConfig, store: Arc<MetricStore>) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(crate::version::USER_AGENT)
            .timeout(PUSH_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;
        let mut base = config.server_url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let ingest_url = base.join(INGEST_PATH).context("Invalid server_url")?;
        Ok(Self {
            client,
            ingest_url,
            api_key: config.api_key.clone(),
            store,
        })
    }

    pub fn ingest_url(&self) -> &Url {
        &self.ingest_url
    }

    /// Push the current local snapshot once. `Ok(false)` when nothing has been sampled yet.
    #[instrument(skip(self), fields(operation = "push", url = %self.ingest_url))]
    pub async fn push_once(&self) -> anyhow::Result<bool> {
        let Some(snapshot) = self.store.get(LOCAL_KEY).await else {
            return Ok(false);
        };
        let response = self
            .client
            .post(self.ingest_url.clone())
            .bearer_auth(&self.api_key)
            .json(snapshot.as_ref())
            .send()
            .await
            .context("Failed to send push")?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("hub rejected push ({})", status);
        }
        Ok(true)
    }
}

pub fn spawn(
    pusher: Pusher,
    interval_ms: u64,
    mut shutdown_rx: oneshot::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        info!(url = %pusher.ingest_url(), interval_ms, "Pushing metrics to hub");
        let mut tick = tokio::time::interval(Duration::from_millis(interval_ms));
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    match pusher.push_once().await {
                        Ok(true) => {}
                        Ok(false) => debug!("No local snapshot yet; skipping push"),
                        Err(e) => warn!(error = %e, "push failed"),
                    }
                }
                _ = &mut shutdown_rx => {
                    debug!("Pusher shutting down");
                    break;
                }
            }
        }
    })
}
