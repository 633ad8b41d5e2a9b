// Bearer credential parsing and the dashboard principal extractor

use axum::{
    extract::{FromRequestParts, Query},
    http::{HeaderMap, header, request::Parts},
};
use serde::Deserialize;

use super::{AppState, error::ApiError};
use crate::models::TenantId;

/// Tenant of the self-hosted dashboard principal.
pub(crate) const SELF_HOSTED_TENANT: TenantId = TenantId(0);

/// Token from `Authorization: Bearer <token>`. `None` when absent or not a bearer header.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[derive(Debug, Deserialize)]
struct TokenParam {
    token: Option<String>,
}

/// Authenticated caller of the protected endpoints.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Principal {
    pub(crate) tenant: TenantId,
}

impl FromRequestParts<AppState> for Principal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        // Browsers cannot set headers on a WebSocket upgrade, so `?token=` is accepted as well.
        let presented = match bearer_token(&parts.headers) {
            Some(t) => Some(t.to_string()),
            None => Query::<TokenParam>::try_from_uri(&parts.uri)
                .ok()
                .and_then(|q| q.0.token),
        };
        let Some(presented) = presented else {
            return Err(ApiError::Unauthorized("Authorization header required"));
        };
        if presented != state.api_key.as_ref() {
            return Err(ApiError::Unauthorized("Invalid API Key"));
        }
        Ok(Principal {
            tenant: SELF_HOSTED_TENANT,
        })
    }
}
