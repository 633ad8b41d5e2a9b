// JSON error responses for the HTTP layer

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::identity::{IngestError, QueryError};

#[derive(Debug)]
pub(crate) enum ApiError {
    /// The caller's own credential is missing or wrong.
    Unauthorized(&'static str),
    BadRequest(String),
    NotFound(&'static str),
    /// Expected transient state, e.g. nothing sampled or pushed yet.
    Unavailable(&'static str),
    /// A remote agent failed; never carries the agent's own status code.
    BadGateway(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m.to_string()),
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.to_string()),
            ApiError::Unavailable(m) => (StatusCode::SERVICE_UNAVAILABLE, m.to_string()),
            ApiError::BadGateway(m) => (StatusCode::BAD_GATEWAY, m),
            ApiError::Internal(e) => {
                tracing::error!(error = %e, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_string(),
                )
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::Internal(e)
    }
}

impl From<QueryError> for ApiError {
    fn from(e: QueryError) -> Self {
        match e {
            QueryError::NotFound => ApiError::NotFound("System not found"),
            QueryError::NoDataYet => ApiError::Unavailable("No data received yet"),
            QueryError::Unreachable(m) => {
                ApiError::BadGateway(format!("Failed to connect to agent: {m}"))
            }
            QueryError::Upstream { status } => {
                ApiError::BadGateway(format!("Agent returned error ({status})"))
            }
            QueryError::InvalidPayload(m) => {
                ApiError::BadGateway(format!("Failed to decode agent response: {m}"))
            }
            QueryError::Internal(e) => ApiError::Internal(e),
        }
    }
}

impl From<IngestError> for ApiError {
    fn from(e: IngestError) -> Self {
        match e {
            IngestError::EmptyCredential => ApiError::Unauthorized("Authorization header required"),
            IngestError::UnknownCredential => ApiError::Unauthorized("Invalid Agent Token"),
            IngestError::Malformed(e) => ApiError::BadRequest(format!("Invalid snapshot: {e}")),
            IngestError::Internal(e) => ApiError::Internal(e),
        }
    }
}
