//! Authentication module
//!
//! The upstream gateway authenticates end users and forwards their id in
//! `X-User-Id`. Deployments that expose the API beyond the gateway can also
//! require a shared service token, checked against configured SHA-256 digests.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use outreach_common::types::UserId;
use outreach_core::{BatchOrchestrator, CampaignDriver};
use outreach_storage::DatabasePool;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::ApiError;

/// Header carrying the authenticated user id
pub const USER_ID_HEADER: &str = "x-user-id";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: BatchOrchestrator,
    pub driver: CampaignDriver,
    /// Checked by the readiness endpoint when present
    pub db_pool: Option<DatabasePool>,
    /// Hex SHA-256 digests of accepted bearer tokens
    pub service_token_hashes: Vec<String>,
}

/// Authenticated caller
#[derive(Debug, Clone, Copy)]
pub struct AuthContext {
    pub user_id: UserId,
}

/// Extract the bearer token from the Authorization header
pub fn extract_bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get("authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Extract and parse the user id header
pub fn extract_user_id(req: &Request) -> Option<UserId> {
    req.headers()
        .get(USER_ID_HEADER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Hex SHA-256 of a service token
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

fn verify_service_token(token: &str, accepted: &[String]) -> bool {
    let digest = hash_token(token);
    accepted.iter().any(|h| h.trim().eq_ignore_ascii_case(&digest))
}

/// Authentication middleware
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // Skip auth for health check endpoints
    if request.uri().path().starts_with("/health") {
        return Ok(next.run(request).await);
    }

    if !state.service_token_hashes.is_empty() {
        let token = extract_bearer_token(&request).ok_or_else(|| {
            warn!("Missing service token in request to {}", request.uri().path());
            ApiError::unauthorized("Missing service token")
        })?;
        if !verify_service_token(token, &state.service_token_hashes) {
            warn!("Rejected service token in request to {}", request.uri().path());
            return Err(ApiError::unauthorized("Invalid service token"));
        }
    }

    let user_id = extract_user_id(&request).ok_or_else(|| {
        warn!("Missing or malformed user id in request to {}", request.uri().path());
        ApiError::unauthorized("Missing or malformed X-User-Id header")
    })?;

    debug!(user_id = %user_id, "Request authenticated");
    request.extensions_mut().insert(AuthContext { user_id });

    Ok(next.run(request).await)
}
