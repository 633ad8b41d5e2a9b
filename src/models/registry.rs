// Monitored-system records and their delivery mode

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// Owner of monitored-system records. The self-hosted dashboard principal is tenant 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub i64);

#[derive(Debug, thiserror::Error)]
#[error("invalid agent address {0:?}: expected \"push\", \"dynamic\" or an http(s) URL")]
pub struct InvalidAddress(pub String);

/// Where a monitored system's snapshot comes from.
///
/// Stored and serialized as the address string: `"push"` for push agents (`"dynamic"` is
/// accepted as an alias on input) or the agent's base URL for pull agents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum DeliveryMode {
    /// The agent sends its snapshots to the hub's ingestion endpoint.
    Push,
    /// The hub fetches snapshots from the agent's query endpoint at this base URL.
    Pull(Url),
}

impl DeliveryMode {
    pub fn parse(address: &str) -> Result<Self, InvalidAddress> {
        let trimmed = address.trim();
        if trimmed.eq_ignore_ascii_case("push") || trimmed.eq_ignore_ascii_case("dynamic") {
            return Ok(DeliveryMode::Push);
        }
        match Url::parse(trimmed) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {
                Ok(DeliveryMode::Pull(url))
            }
            _ => Err(InvalidAddress(address.to_string())),
        }
    }

    pub fn is_push(&self) -> bool {
        matches!(self, DeliveryMode::Push)
    }
}

impl From<DeliveryMode> for String {
    fn from(mode: DeliveryMode) -> Self {
        match mode {
            DeliveryMode::Push => "push".to_string(),
            DeliveryMode::Pull(url) => url.to_string(),
        }
    }
}

impl TryFrom<String> for DeliveryMode {
    type Error = InvalidAddress;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        DeliveryMode::parse(&value)
    }
}

/// A system record as owned by the registry. `api_key` authenticates inbound pushes
/// (push mode) or is presented as the bearer credential on outbound pulls (pull mode).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoredSystem {
    pub id: i64,
    pub user_id: TenantId,
    pub name: String,
    #[serde(rename = "url")]
    pub mode: DeliveryMode,
    pub api_key: String,
    pub created_at: DateTime<Utc>,
}

impl MonitoredSystem {
    pub fn is_owned_by(&self, tenant: TenantId) -> bool {
        self.user_id == tenant
    }
}

/// Body of `POST /api/v1/systems`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewSystem {
    pub name: String,
    #[serde(rename = "url")]
    pub mode: DeliveryMode,
    pub api_key: String,
}
