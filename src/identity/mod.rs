// Store-key derivation and pull/push routing for monitored systems

mod error;

pub use error::{IngestError, QueryError};

use crate::models::{DeliveryMode, MonitoredSystem, SystemMetrics, TenantId};
use crate::pull_client::PullClient;
use crate::store::MetricStore;
use crate::systems_repo::SystemsRepo;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument};
use url::Url;

/// Store key for pushed snapshots. Derived the same way at ingestion and at query time.
///
/// The secret is hashed so raw credentials never sit in the store's key space.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey(String);

fn digest(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

impl IdentityKey {
    /// `sha256(secret):hostname`, or the legacy secret-only key when the hostname is empty.
    pub fn for_push(secret: &str, hostname: &str) -> Self {
        let hostname = hostname.trim();
        if hostname.is_empty() {
            return Self::legacy(secret);
        }
        IdentityKey(format!("{}:{}", digest(secret), hostname))
    }

    /// Secret-only key, looked up as a fallback after the hostname-qualified key.
    pub fn legacy(secret: &str) -> Self {
        IdentityKey(digest(secret))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a system's current snapshot is found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Look these keys up in the store, in order.
    Push { candidates: Vec<IdentityKey> },
    /// Fetch from the agent at `url` presenting `credential`.
    Pull { url: Url, credential: String },
}

impl Route {
    pub fn for_system(system: &MonitoredSystem) -> Self {
        match &system.mode {
            DeliveryMode::Push => Route::Push {
                candidates: vec![
                    IdentityKey::for_push(&system.api_key, &system.name),
                    IdentityKey::legacy(&system.api_key),
                ],
            },
            DeliveryMode::Pull(url) => Route::Pull {
                url: url.clone(),
                credential: system.api_key.clone(),
            },
        }
    }
}

/// Resolves ingestion keys and query sources. Tenancy is checked here; the store has none.
#[derive(Clone)]
pub struct ModeRouter {
    store: Arc<MetricStore>,
    systems: SystemsRepo,
    pull: PullClient,
    /// The hub's own credential, also accepted for ingestion.
    hub_api_key: Option<String>,
}

impl ModeRouter {
    pub fn new(
        store: Arc<MetricStore>,
        systems: SystemsRepo,
        pull: PullClient,
        hub_api_key: Option<String>,
    ) -> Self {
        Self {
            store,
            systems,
            pull,
            hub_api_key: hub_api_key.filter(|k| !k.is_empty()),
        }
    }

    pub fn store(&self) -> &Arc<MetricStore> {
        &self.store
    }

    pub fn systems(&self) -> &SystemsRepo {
        &self.systems
    }

    async fn authorize_push(&self, credential: &str) -> Result<(), IngestError> {
        if self.hub_api_key.as_deref() == Some(credential) {
            return Ok(());
        }
        if self.systems.find_push_by_api_key(credential).await?.is_empty() {
            return Err(IngestError::UnknownCredential);
        }
        Ok(())
    }

    /// Authenticate a push, parse its body and store it. The credential is checked before the
    /// body is parsed, so an unauthenticated sender learns nothing about payload validity.
    #[instrument(skip(self, credential, body), fields(operation = "ingest", body_len = body.len()))]
    pub async fn ingest(&self, credential: &str, body: &[u8]) -> Result<IdentityKey, IngestError> {
        let credential = credential.trim();
        if credential.is_empty() {
            return Err(IngestError::EmptyCredential);
        }
        self.authorize_push(credential).await?;

        let metrics: SystemMetrics = serde_json::from_slice(body)?;
        let key = IdentityKey::for_push(credential, metrics.hostname());
        debug!(key = %key, hostname = metrics.hostname(), "snapshot ingested");
        self.store.update(key.as_str(), metrics).await;
        Ok(key)
    }

    /// Current snapshot of `system_id` on behalf of `tenant`. A system owned by another tenant
    /// is reported exactly like a missing one.
    #[instrument(skip(self), fields(operation = "query"))]
    pub async fn query(
        &self,
        tenant: TenantId,
        system_id: i64,
    ) -> Result<Arc<SystemMetrics>, QueryError> {
        let system = self
            .systems
            .get(system_id)
            .await?
            .filter(|s| s.is_owned_by(tenant))
            .ok_or(QueryError::NotFound)?;
        self.resolve(&system).await
    }

    pub async fn resolve(&self, system: &MonitoredSystem) -> Result<Arc<SystemMetrics>, QueryError> {
        match Route::for_system(system) {
            Route::Push { candidates } => {
                for key in &candidates {
                    if let Some(metrics) = self.store.get(key.as_str()).await {
                        return Ok(metrics);
                    }
                }
                Err(QueryError::NoDataYet)
            }
            Route::Pull { url, credential } => {
                self.pull.fetch(&url, &credential).await.map(Arc::new)
            }
        }
    }
}
