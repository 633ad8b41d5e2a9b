// Typed request-level failures handed to the HTTP layer

use thiserror::Error;

/// Why an inbound push was refused. Nothing is written to the store in any of these cases.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("missing bearer credential")]
    EmptyCredential,
    #[error("credential does not match any push-mode system")]
    UnknownCredential,
    #[error("malformed snapshot: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Why a snapshot query produced no snapshot.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The system does not exist or belongs to another tenant; the two are indistinguishable.
    #[error("system not found")]
    NotFound,
    /// Push-mode system that has not delivered a snapshot yet.
    #[error("no data received yet")]
    NoDataYet,
    /// Pull-mode agent could not be reached within the timeout.
    #[error("agent unreachable: {0}")]
    Unreachable(String),
    /// Pull-mode agent answered with a non-success status.
    #[error("agent returned status {status}")]
    Upstream { status: u16 },
    /// Pull-mode agent answered 2xx with a body that is not a snapshot.
    #[error("agent returned an invalid snapshot: {0}")]
    InvalidPayload(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl QueryError {
    /// Failures caused by the remote agent rather than by the request or by missing data.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            QueryError::Unreachable(_) | QueryError::Upstream { .. } | QueryError::InvalidPayload(_)
        )
    }
}
